use std::{env, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OversellPolicy {
    /// Consume what is available, flag the holding and keep going.
    #[default]
    Cap,
    /// Abort the rebuild and leave the previous holdings in place.
    Reject,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub openfigi_url: String,
    pub openfigi_api_key: Option<String>,
    pub rate_limit_delay: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_wait: Duration,
    pub negative_ttl: Duration,
    pub enable_enrichment: bool,
    pub oversell_policy: OversellPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::from("~/portfolio.db"),
            openfigi_url: String::from("https://api.openfigi.com/v3/mapping"),
            openfigi_api_key: None,
            rate_limit_delay: Duration::from_millis(2500),
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_wait: Duration::from_secs(60),
            negative_ttl: Duration::from_secs(86400),
            enable_enrichment: true,
            oversell_policy: OversellPolicy::Cap,
        }
    }
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);

        Ok(Self {
            database_url: shellexpand::tilde(&database_url).into_owned(),
            openfigi_url: lookup("OPENFIGI_URL").unwrap_or(defaults.openfigi_url),
            openfigi_api_key: lookup("OPENFIGI_API_KEY").filter(|key| !key.trim().is_empty()),
            rate_limit_delay: parse_var(&lookup, "OPENFIGI_RATE_LIMIT_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.rate_limit_delay),
            request_timeout: parse_var(&lookup, "OPENFIGI_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_retries: parse_var(&lookup, "OPENFIGI_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            retry_wait: parse_var(&lookup, "OPENFIGI_RETRY_WAIT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_wait),
            negative_ttl: parse_var(&lookup, "RESOLVER_NEGATIVE_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.negative_ttl),
            enable_enrichment: match lookup("ENABLE_ENRICHMENT") {
                Some(flag) => parse_flag(&flag)
                    .with_context(|| format!("Invalid ENABLE_ENRICHMENT '{}'", flag))?,
                None => defaults.enable_enrichment,
            },
            oversell_policy: parse_var(&lookup, "OVERSELL_POLICY")?
                .unwrap_or(defaults.oversell_policy),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("Invalid {} '{}'", key, value))
        })
        .transpose()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
