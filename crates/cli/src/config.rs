//! Runtime configuration for `obra`.
//!
//! Read from a TOML file, then overridden by environment variables. Every
//! field has a default, so a missing file is not an error unless the path was
//! given explicitly.
//!
//! # Example
//!
//! ```toml
//! [ledger]
//! rpc_url = "http://localhost:4545"
//! deployment = "scripts/deployment.json"
//! gas_limit = 5000000
//! gas_price = 0
//! receipt_timeout_secs = 60
//! receipt_poll_millis = 500
//!
//! [server]
//! port = 3000
//! cors_origin = "*"
//! request_timeout_secs = 120
//!
//! [logging]
//! format = "auto"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use obra_ledger::JsonRpcConfig;
use obra_registry::WritePolicy;
use serde::{Deserialize, Serialize};

/// File read when neither `--config` nor `OBRA_CONFIG` names one.
const DEFAULT_CONFIG_FILE: &str = "obra.toml";

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

/// `[ledger]` section: node connection and write policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub rpc_url: String,
    /// Deployment descriptor holding the contract address and ABI.
    pub deployment: PathBuf,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub receipt_timeout_secs: u64,
    pub receipt_poll_millis: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        let policy = WritePolicy::default();
        LedgerSettings {
            rpc_url: "http://localhost:4545".to_string(),
            deployment: PathBuf::from("scripts/deployment.json"),
            gas_limit: policy.gas_limit,
            gas_price: policy.gas_price,
            receipt_timeout_secs: 60,
            receipt_poll_millis: 500,
        }
    }
}

/// `[server]` section for `obra serve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// Allowed CORS origin, or `*` for any.
    pub cors_origin: String,
    /// Upper bound on a single request's ledger work.
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            port: 3000,
            cors_origin: "*".to_string(),
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
    /// JSON when stderr is not a terminal.
    #[default]
    Auto,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "auto" => Ok(LogFormat::Auto),
            other => Err(format!(
                "unknown log format '{}' (expected text, json, or auto)",
                other
            )),
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl Config {
    /// Load configuration from `path` (or `OBRA_CONFIG`, or `./obra.toml`)
    /// and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Config, String> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("OBRA_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => read_config(&path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                read_config(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides, reading variables through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("BLOCKCHAIN_RPC_URL") {
            self.ledger.rpc_url = url;
        }
        if let Some(path) = var("OBRA_DEPLOYMENT") {
            self.ledger.deployment = PathBuf::from(path);
        }
        if let Some(port) = var("PORT") {
            self.server.port = parse_env("PORT", &port)?;
        }
        if let Some(origin) = var("CORS_ORIGIN") {
            self.server.cors_origin = origin;
        }
        if let Some(secs) = var("OBRA_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs = parse_env("OBRA_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(format) = var("OBRA_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    pub fn write_policy(&self) -> WritePolicy {
        WritePolicy {
            gas_limit: self.ledger.gas_limit,
            gas_price: self.ledger.gas_price,
        }
    }

    pub fn json_rpc(&self) -> JsonRpcConfig {
        JsonRpcConfig {
            rpc_url: self.ledger.rpc_url.clone(),
            receipt_timeout: Duration::from_secs(self.ledger.receipt_timeout_secs),
            receipt_poll_interval: Duration::from_millis(self.ledger.receipt_poll_millis),
            ..JsonRpcConfig::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

/// Read and parse a config TOML file from `path`.
pub fn read_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid value for {}: '{}'", key, value))
}
