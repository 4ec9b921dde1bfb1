//! Error types for logroll

use std::path::PathBuf;

/// logroll error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid base path: {0}")]
    InvalidPath(PathBuf),

    #[error("Invalid time format '{0}'")]
    InvalidTimeFormat(String),

    #[error("Write queue is full")]
    QueueFull,

    #[error("Writer is closed")]
    Closed,

    #[error("{}", join_errors(.0))]
    Aggregate(Vec<Error>),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for logroll
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    /// Collapse a list of errors: none is success, one is returned as-is,
    /// several become an `Aggregate`.
    pub fn aggregate(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Aggregate(errors)),
        }
    }

    /// Whether this error (or any error it aggregates) is a dropped write
    pub fn is_queue_full(&self) -> bool {
        match self {
            Error::QueueFull => true,
            Error::Aggregate(errors) => errors.iter().any(Error::is_queue_full),
            _ => false,
        }
    }
}

fn join_errors(errors: &[Error]) -> String {
    let parts: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    format!("{} errors: {}", errors.len(), parts.join("; "))
}
