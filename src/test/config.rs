#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use crate::config::{Config, OversellPolicy};

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = config_from(&[]).unwrap();
        let defaults = Config::default();

        assert_eq!(config.openfigi_url, defaults.openfigi_url);
        assert_eq!(config.openfigi_api_key, None);
        assert_eq!(config.rate_limit_delay, Duration::from_millis(2500));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_wait, Duration::from_secs(60));
        assert_eq!(config.negative_ttl, Duration::from_secs(86400));
        assert!(config.enable_enrichment);
        assert_eq!(config.oversell_policy, OversellPolicy::Cap);
        assert!(config.database_url.ends_with("portfolio.db"));
        assert!(!config.database_url.starts_with('~'));
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("DATABASE_URL", "~/ledgers/main.db"),
            ("OPENFIGI_URL", "http://localhost:8080/v3/mapping"),
            ("OPENFIGI_API_KEY", "secret"),
            ("OPENFIGI_RATE_LIMIT_DELAY_MS", "250"),
            ("OPENFIGI_TIMEOUT_SECS", "3"),
            ("OPENFIGI_MAX_RETRIES", " 5 "),
            ("OPENFIGI_RETRY_WAIT_SECS", "7"),
            ("RESOLVER_NEGATIVE_TTL_SECS", "60"),
            ("ENABLE_ENRICHMENT", "off"),
            ("OVERSELL_POLICY", "REJECT"),
        ])
        .unwrap();

        assert!(config.database_url.ends_with("/ledgers/main.db"));
        assert!(!config.database_url.starts_with('~'));
        assert_eq!(config.openfigi_url, "http://localhost:8080/v3/mapping");
        assert_eq!(config.openfigi_api_key.as_deref(), Some("secret"));
        assert_eq!(config.rate_limit_delay, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_wait, Duration::from_secs(7));
        assert_eq!(config.negative_ttl, Duration::from_secs(60));
        assert!(!config.enable_enrichment);
        assert_eq!(config.oversell_policy, OversellPolicy::Reject);
    }

    #[test]
    fn blank_api_key_means_anonymous() {
        let config = config_from(&[("OPENFIGI_API_KEY", "   ")]).unwrap();
        assert_eq!(config.openfigi_api_key, None);
    }

    #[test]
    fn enrichment_flag_spellings() {
        let spellings = [
            ("1", true),
            ("Yes", true),
            ("on", true),
            ("0", false),
            ("FALSE", false),
        ];
        for (value, expected) in spellings {
            let config = config_from(&[("ENABLE_ENRICHMENT", value)]).unwrap();
            assert_eq!(config.enable_enrichment, expected, "{}", value);
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        let error = config_from(&[("ENABLE_ENRICHMENT", "maybe")]).unwrap_err();
        assert!(error.to_string().contains("ENABLE_ENRICHMENT"));

        let error = config_from(&[("OVERSELL_POLICY", "bogus")]).unwrap_err();
        assert!(error.to_string().contains("OVERSELL_POLICY"));

        let error = config_from(&[("OPENFIGI_MAX_RETRIES", "-1")]).unwrap_err();
        assert!(error.to_string().contains("OPENFIGI_MAX_RETRIES"));
    }
}
