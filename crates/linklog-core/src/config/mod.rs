//! Runtime configuration for the sync engine.
//!
//! Configuration is always an explicit value handed to each entry point.
//! Long-running components receive updates through a `tokio::sync::watch`
//! channel and read the current value when a drain pass starts.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_ENDPOINT_URL: &str = "LINKLOG_ENDPOINT_URL";
pub const ENV_TOKEN: &str = "LINKLOG_TOKEN";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "LINKLOG_REQUEST_TIMEOUT_SECS";
pub const ENV_DRAIN_INTERVAL_SECS: &str = "LINKLOG_DRAIN_INTERVAL_SECS";

/// Where and how to reach the remote sheet endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct SinkConfig {
    endpoint_url: String,
    token: String,
    request_timeout: Duration,
}

impl fmt::Debug for SinkConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SinkConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("token", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl SinkConfig {
    /// Validate and build a sink configuration.
    pub fn new(endpoint_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let endpoint_url = non_blank(Some(endpoint_url.into())).ok_or_else(|| {
            Error::Config("endpoint URL must not be empty".to_string())
        })?;
        if !is_http_url(&endpoint_url) {
            return Err(Error::Config(
                "endpoint URL must include http:// or https://".to_string(),
            ));
        }
        let token = non_blank(Some(token.into()))
            .ok_or_else(|| Error::Config("token must not be empty".to_string()))?;

        Ok(Self {
            endpoint_url: endpoint_url.trim_end_matches('/').to_string(),
            token,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Set the per-request timeout
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let endpoint_url = lookup(ENV_ENDPOINT_URL)
            .ok_or_else(|| Error::Config(format!("missing {ENV_ENDPOINT_URL}")))?;
        let token =
            lookup(ENV_TOKEN).ok_or_else(|| Error::Config(format!("missing {ENV_TOKEN}")))?;
        let config = Self::new(endpoint_url, token)?;

        match parse_secs(&lookup, ENV_REQUEST_TIMEOUT_SECS)? {
            Some(timeout) => Ok(config.with_request_timeout(timeout)),
            None => Ok(config),
        }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Timing of the reconciliation scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Interval between periodic drain passes
    pub drain_interval: Duration,
    /// Upper bound on a single remote attempt inside a drain pass
    pub attempt_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            drain_interval: DEFAULT_DRAIN_INTERVAL,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl SchedulerConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(interval) = parse_secs(&lookup, ENV_DRAIN_INTERVAL_SECS)? {
            config.drain_interval = interval;
        }
        Ok(config)
    }
}

/// Bounded retry policy for queued writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Highest retry counter an item may carry; one more failure drops it
    pub max_retries: u32,
    /// Backoff unit, doubled per retry
    pub base_delay: Duration,
    /// Backoff cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying an item whose retry counter is `retry_count`.
    ///
    /// `min(base * 2^n, max)`; zero for items that have never failed in a drain.
    #[must_use]
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Whether an item that just failed with `retry_count` is out of budget.
    #[must_use]
    pub const fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<Duration>> {
    let Some(raw) = non_blank(lookup(name)) else {
        return Ok(None);
    };
    let secs = raw
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{name} must be a whole number of seconds")))?;
    if secs == 0 {
        return Err(Error::Config(format!("{name} must be greater than zero")));
    }
    Ok(Some(Duration::from_secs(secs)))
}

/// Trim `value`, treating blank text as unset.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Whether `value` parses as an `http` or `https` URL.
pub fn is_http_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn sink_config_trims_trailing_slash() {
        let config = SinkConfig::new(" https://script.example.com/exec/ ", "secret").unwrap();
        assert_eq!(config.endpoint_url(), "https://script.example.com/exec");
        assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn sink_config_rejects_invalid_values() {
        assert!(SinkConfig::new("", "secret").is_err());
        assert!(SinkConfig::new("script.example.com", "secret").is_err());
        assert!(SinkConfig::new("https://script.example.com", "  ").is_err());
    }

    #[test]
    fn sink_config_debug_redacts_token() {
        let config = SinkConfig::new("https://script.example.com", "secret").unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn sink_config_from_lookup_reads_timeout() {
        let config = SinkConfig::from_lookup(lookup_from(&[
            (ENV_ENDPOINT_URL, "https://script.example.com"),
            (ENV_TOKEN, "secret"),
            (ENV_REQUEST_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn sink_config_from_lookup_requires_token() {
        let error = SinkConfig::from_lookup(lookup_from(&[(
            ENV_ENDPOINT_URL,
            "https://script.example.com",
        )]))
        .unwrap_err();
        assert!(error.to_string().contains(ENV_TOKEN));
    }

    #[test]
    fn scheduler_config_rejects_zero_interval() {
        assert!(SchedulerConfig::from_lookup(lookup_from(&[(ENV_DRAIN_INTERVAL_SECS, "0")])).is_err());
        let config =
            SchedulerConfig::from_lookup(lookup_from(&[(ENV_DRAIN_INTERVAL_SECS, "15")])).unwrap();
        assert_eq!(config.drain_interval, Duration::from_secs(15));
    }

    #[test]
    fn backoff_doubles_and_caps_at_thirty_seconds() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=6)
            .map(|n| policy.backoff_delay(n).as_secs())
            .collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 30, 30]);
        assert_eq!(policy.backoff_delay(0), Duration::ZERO);
        assert_eq!(policy.backoff_delay(64), Duration::from_secs(30));
    }

    #[test]
    fn retry_budget_is_exhausted_at_ceiling() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_exhausted(4));
        assert!(policy.is_exhausted(5));
    }

    #[test]
    fn non_blank_drops_whitespace_only_text() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" \t ".to_string())), None);
        assert_eq!(
            non_blank(Some("  LINKLOG  ".to_string())).as_deref(),
            Some("LINKLOG")
        );
    }

    #[test]
    fn only_http_schemes_count_as_endpoints() {
        assert!(is_http_url("http://127.0.0.1:8080/exec"));
        assert!(is_http_url("https://script.example.com/macros/s/abc/exec"));
        assert!(!is_http_url("ftp://example.com/exec"));
        assert!(!is_http_url("sheet.example.com/exec"));
    }
}
