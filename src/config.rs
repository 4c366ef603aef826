//! Runtime configuration for the node connection and background sync.
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public Ethereum JSON-RPC gateway used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "https://cloudflare-eth.com";

/// Sync configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// JSON-RPC endpoint of the ledger node.
    pub endpoint: String,
    /// Interval between background batch advances.
    #[serde(with = "secs")]
    pub poll_interval: Duration,
    /// Upper bound on a single node request.
    #[serde(with = "secs")]
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            poll_interval: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `TXWATCH_ENDPOINT`, `TXWATCH_POLL_INTERVAL_SECS`
    /// and `TXWATCH_REQUEST_TIMEOUT_SECS` when set.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Some(endpoint) = get("TXWATCH_ENDPOINT") {
            cfg.endpoint = endpoint;
        }
        if let Some(v) = get("TXWATCH_POLL_INTERVAL_SECS") {
            cfg.poll_interval = parse_secs("TXWATCH_POLL_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("TXWATCH_REQUEST_TIMEOUT_SECS") {
            cfg.request_timeout = parse_secs("TXWATCH_REQUEST_TIMEOUT_SECS", &v)?;
        }
        Ok(cfg)
    }
}

fn parse_secs(key: &str, v: &str) -> anyhow::Result<Duration> {
    let secs: u64 = v.trim().parse().with_context(|| format!("{key}={v:?}"))?;
    anyhow::ensure!(secs > 0, "{key} must be positive");
    Ok(Duration::from_secs(secs))
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
