use std::time::Duration;
use tracing::warn;

/// Runtime configuration, read from `FANOUT_*` environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to
    pub bind_addr: String,
    /// Delay before a best-effort close, so a final error frame can flush
    pub close_grace: Duration,
    /// Optional upper bound on a single subscriber's dispatch branch
    pub branch_timeout: Option<Duration>,
    /// Tenant prefix applied to every event name in the subscription index
    pub tenant: Option<String>,
    /// How long a connection may stay uninitialized before the sweeper prunes it
    pub handshake_timeout: Duration,
    /// How often the sweeper runs
    pub cleanup_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            close_grace: Duration::from_millis(100),
            branch_timeout: None,
            tenant: None,
            handshake_timeout: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup; unset or invalid values keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let millis = |key: &str| parse_u64(key, lookup(key)).map(Duration::from_millis);
        let secs = |key: &str| parse_u64(key, lookup(key)).map(Duration::from_secs);

        Self {
            bind_addr: lookup("FANOUT_BIND_ADDR").unwrap_or(defaults.bind_addr),
            close_grace: millis("FANOUT_CLOSE_GRACE_MS").unwrap_or(defaults.close_grace),
            branch_timeout: non_zero(
                "FANOUT_BRANCH_TIMEOUT_MS",
                millis("FANOUT_BRANCH_TIMEOUT_MS"),
            ),
            tenant: lookup("FANOUT_TENANT").filter(|t| !t.is_empty()),
            handshake_timeout: secs("FANOUT_HANDSHAKE_TIMEOUT_SECS")
                .unwrap_or(defaults.handshake_timeout),
            cleanup_interval: non_zero(
                "FANOUT_CLEANUP_INTERVAL_SECS",
                secs("FANOUT_CLEANUP_INTERVAL_SECS"),
            )
            .unwrap_or(defaults.cleanup_interval),
        }
    }
}

fn parse_u64(key: &str, raw: Option<String>) -> Option<u64> {
    let raw = raw?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key = %key, value = %raw, error = %e, "Ignoring invalid config value");
            None
        }
    }
}

/// Periods and limits of zero would spin or expire instantly
fn non_zero(key: &str, value: Option<Duration>) -> Option<Duration> {
    match value {
        Some(duration) if duration.is_zero() => {
            warn!(key = %key, "Ignoring zero duration config value");
            None
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.close_grace, Duration::from_millis(100));
        assert!(config.branch_timeout.is_none());
        assert!(config.tenant.is_none());
    }

    #[test]
    fn test_reads_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("FANOUT_BIND_ADDR", "127.0.0.1:8080"),
            ("FANOUT_CLOSE_GRACE_MS", "250"),
            ("FANOUT_BRANCH_TIMEOUT_MS", "5000"),
            ("FANOUT_TENANT", "acme"),
            ("FANOUT_HANDSHAKE_TIMEOUT_SECS", "5"),
        ]));
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.close_grace, Duration::from_millis(250));
        assert_eq!(config.branch_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.tenant.as_deref(), Some("acme"));
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("FANOUT_CLOSE_GRACE_MS", "soon"),
            ("FANOUT_BRANCH_TIMEOUT_MS", "-1"),
            ("FANOUT_TENANT", ""),
        ]));
        assert_eq!(config.close_grace, Duration::from_millis(100));
        assert!(config.branch_timeout.is_none());
        assert!(config.tenant.is_none());
    }

    #[test]
    fn test_zero_periods_fall_back() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("FANOUT_CLEANUP_INTERVAL_SECS", "0"),
            ("FANOUT_BRANCH_TIMEOUT_MS", "0"),
            ("FANOUT_CLOSE_GRACE_MS", "0"),
        ]));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert!(config.branch_timeout.is_none());
        // no grace is a valid choice
        assert_eq!(config.close_grace, Duration::ZERO);
    }
}
