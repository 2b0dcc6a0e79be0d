//! Tracker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings shared by every connection the registry opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Delay between status polls once the stream has failed. Defaults to
    /// roughly one block interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up polling after this many consecutive failed polls. `None`
    /// polls until the gateway reports a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_poll_errors: Option<u32>,
    /// Block explorer prefix for transaction links, e.g.
    /// `"https://preprod.cardanoscan.io/transaction"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_base_url: Option<String>,
}

fn default_poll_interval_ms() -> u64 { 15_000 }

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_consecutive_poll_errors: None,
            explorer_base_url: None,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Explorer link for `tx_hash`, if an explorer is configured.
    pub fn explorer_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer_base_url
            .as_deref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), tx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_one_block() {
        let cfg: WatchConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.poll_interval(), Duration::from_secs(15));
        assert_eq!(cfg.max_consecutive_poll_errors, None);
    }

    #[test]
    fn explorer_link() {
        let cfg = WatchConfig {
            explorer_base_url: Some("https://scan.example/tx/".into()),
            ..Default::default()
        };
        assert_eq!(cfg.explorer_url("abc").as_deref(), Some("https://scan.example/tx/abc"));
        assert_eq!(WatchConfig::default().explorer_url("abc"), None);
    }
}
