#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::{Duration, Instant},
    };

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    use crate::{
        api::{IdentityLookup, MappingJob, OpenFigiApi},
        config::Config,
        errors::ResolveError,
    };

    const SANTANDER: &str = r#"[{"data":[{"figi":"BBG000K3TMN9","ticker":"SAN","exchCode":"SM","micCode":"XMAD","name":"BANCO SANTANDER SA","securityType":"Common Stock"}]}]"#;

    fn reply(status: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\n{}Content-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            extra_headers,
            body.len(),
            body
        )
    }

    fn too_many_requests(retry_after: &str) -> String {
        reply(
            "429 Too Many Requests",
            &format!("Retry-After: {}\r\n", retry_after),
            "",
        )
    }

    /// Local endpoint answering one request per connection with the given
    /// responses in order. The last response repeats.
    async fn serve(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v3/mapping", listener.local_addr().unwrap());
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                read_request(&mut socket).await;
                let index = counter.fetch_add(1, Ordering::SeqCst);
                let response = &responses[index.min(responses.len() - 1)];
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (url, requests)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];

        loop {
            let Ok(read) = socket.read(&mut chunk).await else {
                return;
            };
            if read == 0 {
                return;
            }
            request.extend_from_slice(&chunk[..read]);

            let text = String::from_utf8_lossy(&request);
            let Some(end) = text.find("\r\n\r\n") else {
                continue;
            };
            let body_length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= end + 4 + body_length {
                return;
            }
        }
    }

    fn client(url: String, retry_wait: Duration) -> OpenFigiApi {
        let config = Config {
            openfigi_url: url,
            rate_limit_delay: Duration::ZERO,
            request_timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_wait,
            ..Config::default()
        };
        OpenFigiApi::new(&config).unwrap()
    }

    #[tokio::test]
    async fn rate_limited_request_is_retried() {
        let (url, requests) = serve(vec![
            too_many_requests("0"),
            reply("200 OK", "", SANTANDER),
        ])
        .await;
        let api = client(url, Duration::from_millis(50));

        let candidates = api
            .lookup(&MappingJob::isin("ES0113900J37", Some("EUR")))
            .await
            .unwrap();

        assert_eq!(requests.load(Ordering::SeqCst), 2);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].ticker().as_deref(), Some("SAN"));
        assert_eq!(candidates[0].mic_code().as_deref(), Some("XMAD"));
    }

    #[tokio::test]
    async fn retries_stop_at_the_configured_limit() {
        let (url, requests) = serve(vec![too_many_requests("0")]).await;
        let api = client(url, Duration::from_millis(10));

        let error = api
            .lookup(&MappingJob::isin("ES0113900J37", None))
            .await
            .unwrap_err();

        assert!(matches!(error, ResolveError::RateLimited(2)));
        assert_eq!(requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn long_retry_after_is_capped() {
        let (url, requests) = serve(vec![
            too_many_requests("86400"),
            reply("200 OK", "", SANTANDER),
        ])
        .await;
        let api = client(url, Duration::from_millis(100));

        let started = Instant::now();
        let candidates = api
            .lookup(&MappingJob::isin("ES0113900J37", None))
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(requests.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn other_statuses_are_not_retried() {
        let (url, requests) = serve(vec![reply("503 Service Unavailable", "", "")]).await;
        let api = client(url, Duration::from_millis(10));

        let error = api
            .lookup(&MappingJob::isin("ES0113900J37", None))
            .await
            .unwrap_err();

        assert!(matches!(error, ResolveError::Http(503)));
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }
}
