//! Client configuration from environment and controller thresholds.
//!
//! Environment: `DATABASE_URL` (default `postgres://localhost/postgres`), `PGSQL_MAX_CONNECTIONS`
//! (default 5), `PGSQL_ACQUIRE_TIMEOUT_MS` (default 5000).

use crate::error::SqlError;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/postgres";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5000;

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_acquire_timeout_ms() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_MS
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl ClientConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        ClientConfig {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
        }
    }

    pub fn from_env() -> Result<Self, SqlError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SqlError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
        let max_connections = match lookup("PGSQL_MAX_CONNECTIONS") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|e| SqlError::Config(format!("PGSQL_MAX_CONNECTIONS '{}': {}", v, e)))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let acquire_timeout_ms = match lookup("PGSQL_ACQUIRE_TIMEOUT_MS") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|e| SqlError::Config(format!("PGSQL_ACQUIRE_TIMEOUT_MS '{}': {}", v, e)))?,
            None => DEFAULT_ACQUIRE_TIMEOUT_MS,
        };
        if max_connections == 0 {
            return Err(SqlError::Config("PGSQL_MAX_CONNECTIONS must be at least 1".into()));
        }
        Ok(ClientConfig {
            database_url,
            max_connections,
            acquire_timeout_ms,
        })
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Database url with any password replaced, for logging.
    pub fn redacted_url(&self) -> String {
        let url = &self.database_url;
        let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
            return url.clone();
        };
        let rest = &url[scheme_end..];
        let Some(at) = rest.find('@') else {
            return url.clone();
        };
        let userinfo = &rest[..at];
        match userinfo.find(':') {
            Some(colon) => format!(
                "{}{}:***{}",
                &url[..scheme_end],
                &userinfo[..colon],
                &rest[at..]
            ),
            None => url.clone(),
        }
    }
}

/// Admission policy for a controller: requests per second, burst allowance, and per-call timeout.
/// `limit` of `f64::INFINITY` disables rate limiting; a zero `timeout` disables the timeout.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Threshold {
    #[serde(default = "unlimited_rate")]
    pub limit: f64,
    #[serde(default)]
    pub burst: u32,
    #[serde(default, rename = "timeout_ms", deserialize_with = "millis")]
    pub timeout: Duration,
}

fn unlimited_rate() -> f64 {
    f64::INFINITY
}

fn millis<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    u64::deserialize(d).map(Duration::from_millis)
}

impl Threshold {
    pub fn new(limit: f64, burst: u32, timeout: Duration) -> Self {
        Threshold {
            limit,
            burst,
            timeout,
        }
    }

    pub fn unlimited() -> Self {
        Threshold {
            limit: f64::INFINITY,
            burst: 0,
            timeout: Duration::ZERO,
        }
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let c = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(c.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(c.max_connections, 5);
        assert_eq!(c.acquire_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn reads_overrides() {
        let c = ClientConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://u:secret@db:5432/app"),
            ("PGSQL_MAX_CONNECTIONS", "12"),
            ("PGSQL_ACQUIRE_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(c.max_connections, 12);
        assert_eq!(c.acquire_timeout_ms, 250);
        assert_eq!(c.redacted_url(), "postgres://u:***@db:5432/app");
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[("PGSQL_MAX_CONNECTIONS", "many")])),
            Err(SqlError::Config(_))
        ));
        assert!(ClientConfig::from_lookup(lookup(&[("PGSQL_MAX_CONNECTIONS", "0")])).is_err());
    }

    #[test]
    fn redaction_leaves_passwordless_urls() {
        assert_eq!(ClientConfig::new("postgres://localhost/app").redacted_url(), "postgres://localhost/app");
        assert_eq!(ClientConfig::new("postgres://u@h/app").redacted_url(), "postgres://u@h/app");
    }

    #[test]
    fn threshold_deserializes_millis() {
        let t: Threshold = serde_json::from_str(r#"{"limit": 100.0, "burst": 10, "timeout_ms": 250}"#).unwrap();
        assert_eq!(t, Threshold::new(100.0, 10, Duration::from_millis(250)));
        let t: Threshold = serde_json::from_str("{}").unwrap();
        assert_eq!(t, Threshold::unlimited());
    }
}
