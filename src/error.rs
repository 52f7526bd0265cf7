use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Startup and configuration failures. These are the only errors allowed to
/// stop the process.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Broker connection failed: {0}")]
    Broker(String),

    #[error("Status store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub reason: &'static str,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.reason)
    }
}

/// Caller input was malformed. Carries every violated field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("validation failed: {}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|v| v.field).collect()
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure reported by a `MessageChannel` implementation for one send.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ChannelError {
    pub retryable: bool,
    pub message: String,
}

impl ChannelError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            retryable: true,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            retryable: false,
            message: message.into(),
        }
    }
}

/// Terminal outcome of a failed publish, after the retry budget is spent.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to encode dispatch envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("broker rejected build request after {attempts} attempt(s): {cause}")]
    Rejected { attempts: u32, cause: ChannelError },

    #[error("broker did not acknowledge build request within {after:?}")]
    TimedOut { after: Duration },

    #[error("dispatch task aborted before completion")]
    Aborted,
}

/// Failure of the backing status store itself.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "db")]
    #[error("libSQL error: {0}")]
    Libsql(#[from] libsql::Error),

    #[error("store task failed: {0}")]
    Task(String),

    #[error("unsupported payload type in column `{column}`")]
    PayloadType { column: &'static str },
}

/// Outcome of a status lookup that produced no payload.
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("No build found with id {0}")]
    NotFound(String),

    #[error("Failed to fetch build details")]
    Store(#[source] StoreError),
}
