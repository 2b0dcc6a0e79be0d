//! CLI settings: JSON config file, then environment, then flags.

use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

use txwatch_http::GatewayConfig;
use txwatch_tracker::WatchConfig;

use crate::logging::LogConfig;

/// Fallback for the gateway base URL when neither a flag nor the config file
/// names one.
pub const BASE_URL_ENV: &str = "TXWATCH_BASE_URL";

/// Layout of the `--config` file.
///
/// ```json
/// {
///   "gateway": { "base_url": "https://api.example.org/v1", "auth_token": "…" },
///   "watch":   { "poll_interval_ms": 15000, "explorer_base_url": "https://…/transaction" },
///   "log":     { "level": "info", "components": { "txwatch-tracker": "debug" } }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub auth_token: Option<String>,
    pub verbose: bool,
    pub json_logs: bool,
}

/// Fully resolved settings for one command.
#[derive(Debug, Clone)]
pub struct Settings {
    pub gateway: GatewayConfig,
    pub watch: WatchConfig,
    pub log: LogConfig,
}

impl Settings {
    /// Merge the sources. Precedence for the base URL: flag, config file,
    /// `TXWATCH_BASE_URL`.
    pub fn resolve(
        file: FileConfig,
        overrides: Overrides,
        env_base_url: Option<String>,
    ) -> anyhow::Result<Self> {
        let mut gateway = match (overrides.base_url, file.gateway, env_base_url) {
            (Some(base), Some(file_gw), _) => GatewayConfig {
                base_url: base,
                ..file_gw
            },
            (Some(base), None, _) => GatewayConfig::new(base),
            (None, Some(file_gw), _) => file_gw,
            (None, None, Some(base)) => GatewayConfig::new(base),
            (None, None, None) => {
                bail!("no gateway configured: pass --base, set {BASE_URL_ENV} or use --config")
            }
        };
        if gateway.base_url.trim().is_empty() {
            bail!("gateway base URL is empty");
        }
        if let Some(token) = overrides.auth_token {
            gateway.auth_token = Some(token);
        }

        let mut watch = file.watch;
        if let Some(ms) = overrides.poll_interval_ms {
            if ms == 0 {
                bail!("--poll-ms must be greater than zero");
            }
            watch.poll_interval_ms = ms;
        }

        let mut log = file.log;
        if overrides.verbose {
            log.level = "debug".into();
        }
        log.json |= overrides.json_logs;

        Ok(Self { gateway, watch, log })
    }
}
