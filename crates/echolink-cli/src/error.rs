//! Error handling for the echolink CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Echo protocol error: {0}")]
    Echo(#[from] echolink_core::EchoError),

    #[error("BLE link error: {0}")]
    Ble(#[from] echolink_ble::BleLinkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No peripheral named {name} found")]
    PeripheralNotFound { name: String },

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<tokio::task::JoinError> for CliError {
    fn from(err: tokio::task::JoinError) -> Self {
        CliError::Task(err.to_string())
    }
}
