use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::BlockHash;

pub const DEFAULT_RPC_PORT: u16 = 7771;
pub const DEFAULT_TESTNET_RPC_PORT: u16 = 17771;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node RPC client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Node JSON-RPC endpoint URL
    pub endpoint: String,
    /// RPC user, overrides credentials embedded in the endpoint
    pub username: Option<String>,
    pub password: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Attempts per RPC call before the pass fails
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    /// Optional komodo.conf to read rpcuser/rpcpassword/rpcconnect/rpcport from
    pub node_conf_path: Option<String>,
    pub testnet: bool,
}

/// Payment monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Time between two reconciliation passes
    pub poll_interval_ms: u64,
    /// Ancestor hops from the watermark to the query anchor
    pub monitor_depth: u32,
    /// Shortest sleep between scheduler wake-ups
    pub min_sleep_ms: u64,
    /// Initial watermark; unset means "start from the node's current view"
    pub start_block: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: format!("http://127.0.0.1:{}/", DEFAULT_RPC_PORT),
            username: None,
            password: None,
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_ms: 500,
            max_retry_delay_ms: 5_000,
            node_conf_path: None,
            testnet: false,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            monitor_depth: 6,
            min_sleep_ms: 100,
            start_block: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn min_sleep(&self) -> Duration {
        Duration::from_millis(self.min_sleep_ms)
    }

    pub fn start_block(&self) -> Option<BlockHash> {
        self.start_block
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(BlockHash::from)
    }
}

/// Values read from a `komodo.conf`-style file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConf {
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
    pub rpc_connect: Option<String>,
    pub rpc_port: Option<u16>,
}

impl NodeConf {
    /// Parse `key=value` lines; `#` comments and unknown keys are ignored
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let entries: HashMap<&str, &str> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim(), value.trim()))
            .collect();

        let rpc_port = match entries.get("rpcport") {
            Some(port) => Some(port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "rpcport".to_string(),
                value: port.to_string(),
            })?),
            None => None,
        };

        Ok(Self {
            rpc_user: entries.get("rpcuser").map(|s| s.to_string()),
            rpc_password: entries.get("rpcpassword").map(|s| s.to_string()),
            rpc_connect: entries.get("rpcconnect").map(|s| s.to_string()),
            rpc_port,
        })
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        Self::parse(&content)
    }

    /// Endpoint URL derived from the node settings
    pub fn endpoint(&self, testnet: bool) -> String {
        let host = self.rpc_connect.as_deref().unwrap_or("127.0.0.1");
        let default_port = if testnet { DEFAULT_TESTNET_RPC_PORT } else { DEFAULT_RPC_PORT };
        format!("http://{}:{}/", host, self.rpc_port.unwrap_or(default_port))
    }
}

impl RpcConfig {
    /// Take endpoint and credentials from a node configuration file
    pub fn apply_node_conf(&mut self, node_conf: &NodeConf) {
        self.endpoint = node_conf.endpoint(self.testnet);
        if let Some(user) = &node_conf.rpc_user {
            self.username = Some(user.clone());
        }
        if let Some(password) = &node_conf.rpc_password {
            self.password = Some(password.clone());
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value }),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from file, node conf and environment variables.
    /// Environment variables take precedence over file and node conf values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_node_conf(None, false)
    }

    /// Like [`AppConfig::load`], with a node conf path and network chosen by the caller.
    /// The node conf is layered under the environment, so `KOMODO_RPC_URL` and the
    /// credential variables still override it.
    pub fn load_with_node_conf(node_conf_path: Option<&str>, testnet: bool) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file()?;
        if testnet {
            config.rpc.testnet = true;
        }

        let node_conf_path = node_conf_path
            .map(str::to_string)
            .or_else(|| env::var("KOMODO_CONF").ok())
            .or_else(|| config.rpc.node_conf_path.clone());
        if let Some(path) = node_conf_path {
            let node_conf = NodeConf::load(&path)?;
            config.rpc.apply_node_conf(&node_conf);
            config.rpc.node_conf_path = Some(path);
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "monitor.toml".to_string());

        if !Path::new(&config_path).exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ConfigError::FileNotFound(config_path.clone()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(endpoint) = env::var("KOMODO_RPC_URL") {
            self.rpc.endpoint = endpoint;
        }
        if let Ok(user) = env::var("KOMODO_RPC_USER") {
            self.rpc.username = Some(user);
        }
        if let Ok(password) = env::var("KOMODO_RPC_PASSWORD") {
            self.rpc.password = Some(password);
        }
        if let Some(timeout) = parse_env("RPC_TIMEOUT_SECONDS")? {
            self.rpc.timeout_seconds = timeout;
        }
        if let Some(retries) = parse_env("RPC_MAX_RETRIES")? {
            self.rpc.max_retries = retries;
        }

        if let Some(interval) = parse_env("MONITOR_POLL_INTERVAL_MS")? {
            self.monitor.poll_interval_ms = interval;
        }
        if let Some(depth) = parse_env("MONITOR_DEPTH")? {
            self.monitor.monitor_depth = depth;
        }
        if let Ok(block) = env::var("MONITOR_START_BLOCK") {
            self.monitor.start_block = Some(block);
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.rpc.endpoint.starts_with("http://") && !self.rpc.endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(self.rpc.endpoint.clone()));
        }

        if self.rpc.timeout_seconds == 0 || self.rpc.timeout_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "rpc.timeout_seconds".to_string(),
                value: self.rpc.timeout_seconds.to_string(),
            });
        }

        if self.rpc.max_retries == 0 || self.rpc.max_retries > 20 {
            return Err(ConfigError::InvalidValue {
                key: "rpc.max_retries".to_string(),
                value: self.rpc.max_retries.to_string(),
            });
        }

        if self.rpc.retry_delay_ms > self.rpc.max_retry_delay_ms {
            return Err(ConfigError::InvalidValue {
                key: "rpc.retry_delay_ms".to_string(),
                value: self.rpc.retry_delay_ms.to_string(),
            });
        }

        if self.monitor.poll_interval_ms == 0 || self.monitor.poll_interval_ms > 3_600_000 {
            return Err(ConfigError::InvalidValue {
                key: "monitor.poll_interval_ms".to_string(),
                value: self.monitor.poll_interval_ms.to_string(),
            });
        }

        if self.monitor.monitor_depth > 1_000 {
            return Err(ConfigError::InvalidValue {
                key: "monitor.monitor_depth".to_string(),
                value: self.monitor.monitor_depth.to_string(),
            });
        }

        if self.monitor.min_sleep_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "monitor.min_sleep_ms".to_string(),
                value: self.monitor.min_sleep_ms.to_string(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default())
            .map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}
