use crate::error::{GatewayError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file, read from the working directory when present.
pub const DEFAULT_CONFIG_PATH: &str = "collect_gateway.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub broker: BrokerConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            base_path: "/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    Kafka,
    Memory,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    pub backend: BrokerBackend,
    pub bootstrap_servers: Vec<String>,
    pub topic: String,
    pub partition: i32,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub publish_timeout_secs: u64,
    /// Bound on establishing the broker connection at startup.
    pub connect_timeout_secs: u64,
    /// Deadline for the client's own reconnect/retry loop within one send.
    pub request_deadline_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::Kafka,
            bootstrap_servers: vec!["localhost:29092".to_string()],
            topic: "webfront-kafka".to_string(),
            partition: 0,
            max_attempts: 5,
            retry_backoff_ms: 100,
            max_backoff_ms: 2_000,
            publish_timeout_secs: 10,
            connect_timeout_secs: 10,
            request_deadline_ms: 3_000,
        }
    }
}

impl BrokerConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Libsql,
    Memory,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub sqlite_path: PathBuf,
    pub libsql_url: Option<String>,
    pub libsql_auth_token: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            sqlite_path: PathBuf::from("data/build_events.db"),
            libsql_url: None,
            libsql_auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            file_name: "collect_gateway.log".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration: file (if any), then environment overrides, then
    /// validation. An explicitly named file must exist; the default one is
    /// optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from a variable source (the process environment in
    /// production).
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = var("COLLECT_PORT") {
            self.server.port = parse_env("COLLECT_PORT", &port)?;
        }
        if let Some(base) = var("COLLECT_BASE_PATH") {
            self.server.base_path = base;
        }
        if let Some(backend) = var("BROKER_BACKEND") {
            self.broker.backend = match backend.trim().to_ascii_lowercase().as_str() {
                "kafka" => BrokerBackend::Kafka,
                "memory" => BrokerBackend::Memory,
                other => {
                    return Err(GatewayError::Config(format!(
                        "BROKER_BACKEND must be 'kafka' or 'memory', got '{other}'"
                    )))
                }
            };
        }
        if let Some(brokers) = var("KAFKA_BROKERS") {
            self.broker.bootstrap_servers = brokers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(topic) = var("KAFKA_TOPIC") {
            self.broker.topic = topic;
        }
        if let Some(partition) = var("KAFKA_PARTITION") {
            self.broker.partition = parse_env("KAFKA_PARTITION", &partition)?;
        }
        if let Some(backend) = var("STATUS_STORE_BACKEND") {
            self.store.backend = match backend.trim().to_ascii_lowercase().as_str() {
                "sqlite" => StoreBackend::Sqlite,
                "libsql" => StoreBackend::Libsql,
                "memory" => StoreBackend::Memory,
                other => {
                    return Err(GatewayError::Config(format!(
                        "STATUS_STORE_BACKEND must be 'sqlite', 'libsql' or 'memory', got '{other}'"
                    )))
                }
            };
        }
        if let Some(path) = var("STATUS_DB_PATH") {
            self.store.sqlite_path = PathBuf::from(path);
        }
        if let Some(url) = var("LIBSQL_URL") {
            self.store.libsql_url = Some(url);
        }
        if let Some(token) = var("LIBSQL_AUTH_TOKEN") {
            self.store.libsql_auth_token = Some(token);
        }
        if let Some(dir) = var("LOG_DIR") {
            self.logging.dir = PathBuf::from(dir);
        }
        if let Some(enabled) = var("METRICS_ENABLED") {
            self.metrics.enabled = parse_env("METRICS_ENABLED", &enabled)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.server.base_path.starts_with('/') {
            return Err(GatewayError::Config(format!(
                "server.base_path must start with '/', got '{}'",
                self.server.base_path
            )));
        }
        if self.broker.topic.trim().is_empty() {
            return Err(GatewayError::Config("broker.topic must not be empty".to_string()));
        }
        if self.broker.backend == BrokerBackend::Kafka && self.broker.bootstrap_servers.is_empty() {
            return Err(GatewayError::Config(
                "broker.bootstrap_servers must list at least one broker".to_string(),
            ));
        }
        if self.broker.max_attempts == 0 {
            return Err(GatewayError::Config("broker.max_attempts must be at least 1".to_string()));
        }
        if self.broker.publish_timeout_secs == 0 {
            return Err(GatewayError::Config(
                "broker.publish_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.broker.connect_timeout_secs == 0 || self.broker.request_deadline_ms == 0 {
            return Err(GatewayError::Config(
                "broker.connect_timeout_secs and broker.request_deadline_ms must be non-zero".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Libsql && self.store.libsql_url.is_none() {
            return Err(GatewayError::Config(
                "store.libsql_url (or LIBSQL_URL) is required for the libsql backend".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| GatewayError::Config(format!("{key} has an invalid value: '{raw}'")))
}
