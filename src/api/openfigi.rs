use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use super::{
    IdentityLookup,
    openfigi_dto::{FigiCandidate, MappingJob, MappingResult},
    utils::{parse_response_array, post_json},
};
use crate::{config::Config, errors::ResolveError};

/// OpenFIGI v3 mapping client. Calls are serialized and spaced by
/// `min_interval`; HTTP 429 is retried up to `max_retries` times, waiting
/// at most `retry_wait` between attempts.
#[derive(Debug)]
pub struct OpenFigiApi {
    client: Client,
    url: String,
    api_key: Option<String>,
    min_interval: Duration,
    max_retries: u32,
    retry_wait: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl OpenFigiApi {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            url: config.openfigi_url.clone(),
            api_key: config.openfigi_api_key.clone(),
            min_interval: config.rate_limit_delay,
            max_retries: config.max_retries,
            retry_wait: config.retry_wait,
            last_call: Mutex::new(None),
        })
    }

    async fn make_request(&self, job: &MappingJob) -> Result<Vec<FigiCandidate>, ResolveError> {
        let mut last_call = self.last_call.lock().await;
        let mut attempt = 0u32;

        loop {
            if let Some(previous) = *last_call {
                let elapsed = previous.elapsed();
                if elapsed < self.min_interval {
                    tokio::time::sleep(self.min_interval - elapsed).await;
                }
            }

            let response = post_json(
                &self.client,
                &self.url,
                self.api_key.as_deref(),
                std::slice::from_ref(job),
            )
            .await;
            *last_call = Some(Instant::now());
            let response = response?;

            match response.status {
                StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= self.max_retries {
                        return Err(ResolveError::RateLimited(attempt));
                    }
                    attempt += 1;
                    // Retry-After is honoured up to the configured wait
                    let wait = response
                        .retry_after
                        .map_or(self.retry_wait, |asked| asked.min(self.retry_wait));
                    warn!(
                        isin = %job.id_value(),
                        attempt,
                        "OpenFIGI rate limit hit, waiting {}s",
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                }
                status if status.is_success() => return parse_mapping(&response.body),
                status => return Err(ResolveError::Http(status.as_u16())),
            }
        }
    }
}

#[async_trait]
impl IdentityLookup for OpenFigiApi {
    async fn lookup(&self, job: &MappingJob) -> Result<Vec<FigiCandidate>, ResolveError> {
        debug!(isin = %job.id_value(), currency = ?job.currency(), "OpenFIGI lookup");
        self.make_request(job).await
    }
}

/// The endpoint answers a batch with one result per job; only single-job
/// batches are sent.
pub fn parse_mapping(body: &str) -> Result<Vec<FigiCandidate>, ResolveError> {
    let data = serde_json::from_str::<Value>(body)
        .map_err(|e| ResolveError::Protocol(format!("invalid JSON: {}", e)))?;
    let results: Vec<MappingResult> = parse_response_array(data)?;

    let Some(result) = results.into_iter().next() else {
        return Ok(Vec::new());
    };

    if let Some(error) = result.error() {
        if error.to_lowercase().contains("no identifier found") {
            return Ok(Vec::new());
        }
        return Err(ResolveError::Protocol(error.clone()));
    }
    if let Some(warning) = result.warning() {
        debug!("OpenFIGI: {}", warning);
    }

    Ok(result
        .data()
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(FigiCandidate::has_ticker)
        .collect())
}
