use std::env;
use std::time::Duration;

use crate::retry::RetryPolicy;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_PAGE_SIZE: i64 = 10_000;

// ── Env helpers ──────────────────────────────────────────────────

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.trim().parse().ok())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env_opt(key) {
        Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        None => default,
    }
}

// ── DumpConfig ───────────────────────────────────────────────────

/// Runtime configuration for the endpoint client and the aggregator.
///
/// Every field can be set from the environment (or a `.env` file loaded by
/// the binary); invalid values fall back to the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpConfig {
    /// SPARQL endpoint URL. `SPARQL_ENDPOINT`, falling back to `SEMANTIC_INDEX_SPARQL_ENDPOINT`.
    pub endpoint: Option<String>,
    /// Sent verbatim as the `Authorization` header. `SPARQL_AUTH_HEADER`.
    pub auth_header: Option<String>,
    /// Per-page request timeout. `SPARQL_TIMEOUT_SECONDS`.
    pub timeout: Duration,
    /// `SPARQL_MAX_ATTEMPTS`, `SPARQL_ENDPOINT_ERROR_ATTEMPTS`,
    /// `SPARQL_BACKOFF_INITIAL_MS`, `SPARQL_BACKOFF_MAX_MS`.
    pub retry: RetryPolicy,
    /// Keep paging past the declared total while pages come back full. `SPARQL_OPEN_ENDED`.
    pub open_ended: bool,
    /// Hard cap on pages per run. `SPARQL_MAX_PAGES`.
    pub max_pages: Option<u64>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            auth_header: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            retry: RetryPolicy::default(),
            open_ended: true,
            max_pages: None,
        }
    }
}

impl DumpConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retry = RetryPolicy {
            max_attempts: env_parsed("SPARQL_MAX_ATTEMPTS").unwrap_or(defaults.retry.max_attempts),
            endpoint_error_attempts: env_parsed("SPARQL_ENDPOINT_ERROR_ATTEMPTS")
                .unwrap_or(defaults.retry.endpoint_error_attempts),
            initial_backoff: env_parsed("SPARQL_BACKOFF_INITIAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.initial_backoff),
            max_backoff: env_parsed("SPARQL_BACKOFF_MAX_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.max_backoff),
            ..defaults.retry
        };

        Self {
            endpoint: env_opt("SPARQL_ENDPOINT").or_else(|| env_opt("SEMANTIC_INDEX_SPARQL_ENDPOINT")),
            auth_header: env_opt("SPARQL_AUTH_HEADER"),
            timeout: env_parsed("SPARQL_TIMEOUT_SECONDS")
                .filter(|s: &u64| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            retry,
            open_ended: env_bool("SPARQL_OPEN_ENDED", defaults.open_ended),
            max_pages: env_parsed("SPARQL_MAX_PAGES").filter(|n: &u64| *n > 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-based tests must run serially to avoid interfering with each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_sparql_env() {
        let keys = [
            "SPARQL_ENDPOINT",
            "SEMANTIC_INDEX_SPARQL_ENDPOINT",
            "SPARQL_AUTH_HEADER",
            "SPARQL_TIMEOUT_SECONDS",
            "SPARQL_MAX_ATTEMPTS",
            "SPARQL_ENDPOINT_ERROR_ATTEMPTS",
            "SPARQL_BACKOFF_INITIAL_MS",
            "SPARQL_BACKOFF_MAX_MS",
            "SPARQL_OPEN_ENDED",
            "SPARQL_MAX_PAGES",
        ];
        for k in keys {
            env::remove_var(k);
        }
    }

    #[test]
    fn defaults_when_no_env_vars() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_sparql_env();

        let cfg = DumpConfig::from_env();
        assert_eq!(cfg, DumpConfig::default());
        assert_eq!(cfg.timeout, Duration::from_secs(60));
        assert!(cfg.open_ended);
        assert_eq!(cfg.max_pages, None);
    }

    #[test]
    fn from_env_reads_vars() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_sparql_env();

        env::set_var("SPARQL_ENDPOINT", "http://localhost:8890/sparql");
        env::set_var("SPARQL_TIMEOUT_SECONDS", "15");
        env::set_var("SPARQL_MAX_ATTEMPTS", "5");
        env::set_var("SPARQL_BACKOFF_INITIAL_MS", "50");
        env::set_var("SPARQL_OPEN_ENDED", "false");
        env::set_var("SPARQL_MAX_PAGES", "12");

        let cfg = DumpConfig::from_env();
        assert_eq!(cfg.endpoint.as_deref(), Some("http://localhost:8890/sparql"));
        assert_eq!(cfg.timeout, Duration::from_secs(15));
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.endpoint_error_attempts, 2);
        assert_eq!(cfg.retry.initial_backoff, Duration::from_millis(50));
        assert!(!cfg.open_ended);
        assert_eq!(cfg.max_pages, Some(12));

        clear_sparql_env();
    }

    #[test]
    fn endpoint_falls_back_to_semantic_index_var() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_sparql_env();

        env::set_var("SEMANTIC_INDEX_SPARQL_ENDPOINT", "http://example.org/sparql");
        assert_eq!(
            DumpConfig::from_env().endpoint.as_deref(),
            Some("http://example.org/sparql")
        );

        env::set_var("SPARQL_ENDPOINT", "http://localhost/sparql");
        assert_eq!(DumpConfig::from_env().endpoint.as_deref(), Some("http://localhost/sparql"));

        clear_sparql_env();
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_sparql_env();

        env::set_var("SPARQL_TIMEOUT_SECONDS", "0");
        env::set_var("SPARQL_MAX_ATTEMPTS", "lots");
        env::set_var("SPARQL_MAX_PAGES", "-1");

        let cfg = DumpConfig::from_env();
        assert_eq!(cfg.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECONDS));
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.max_pages, None);

        clear_sparql_env();
    }
}
