//! Error types for the BLE link

use echolink_core::{ConnectionHandle, EchoError};
use thiserror::Error;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the btleplug radio link
#[derive(Error, Debug)]
pub enum BleLinkError {
    #[error("Bluetooth error: {0}")]
    Btleplug(#[from] btleplug::Error),

    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("Adapter index {index} out of range ({count} adapters found)")]
    AdapterIndexOutOfRange { index: usize, count: usize },

    #[error("Peripheral not found: {address}")]
    PeripheralNotFound { address: String },

    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound { uuid: Uuid },

    #[error("No open connection for {handle}")]
    NotConnected { handle: ConnectionHandle },

    #[error("Connection timeout")]
    ConnectionTimeout,
}

impl From<BleLinkError> for EchoError {
    fn from(err: BleLinkError) -> Self {
        EchoError::link(err)
    }
}

/// Result type for BLE link operations
pub type Result<T> = std::result::Result<T, BleLinkError>;
