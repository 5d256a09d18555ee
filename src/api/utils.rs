use std::time::Duration;

use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::errors::ResolveError;

pub const API_KEY_HEADER: &str = "X-OPENFIGI-APIKEY";

pub struct RawResponse {
    pub status: StatusCode,
    pub retry_after: Option<Duration>,
    pub body: String,
}

pub async fn post_json<B>(
    client: &Client,
    url: &str,
    api_key: Option<&str>,
    body: &B,
) -> Result<RawResponse, ResolveError>
where
    B: Serialize + ?Sized,
{
    let mut request = client.post(url).json(body);
    if let Some(key) = api_key {
        request = request.header(API_KEY_HEADER, key);
    }

    let res = request
        .send()
        .await
        .map_err(|e| ResolveError::Transport(e.to_string()))?;

    let status = res.status();
    let retry_after = res
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = res
        .text()
        .await
        .map_err(|e| ResolveError::Transport(e.to_string()))?;

    Ok(RawResponse {
        status,
        retry_after,
        body,
    })
}

/// Items of a JSON array that deserialize as `T`; anything else is dropped.
pub fn parse_response_array<T>(data: Value) -> Result<Vec<T>, ResolveError>
where
    T: DeserializeOwned,
{
    match data {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect()),
        _ => Err(ResolveError::Protocol(String::from(
            "unexpected response format: not an array",
        ))),
    }
}
