//! Error types for the echolink protocol core
//!
//! Every failure that can happen inside the session boundary is expressed as an
//! [`EchoError`]. Asynchronous failures reported by the radio arrive as
//! [`PeripheralEvent`](crate::channel::PeripheralEvent)s instead and are mapped
//! onto these kinds when they need to be surfaced.

use thiserror::Error;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors produced by the echolink core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EchoError {
    #[error("No target device resolved for connection")]
    NoTargetDevice,

    #[error("Failed to connect to peripheral: {reason}")]
    ConnectFailed { reason: String },

    #[error("Service resolution failed: {reason}")]
    ResolutionFailed { reason: String },

    #[error("Endpoint {uuid} is not writable")]
    EndpointNotWritable { uuid: Uuid },

    #[error("Endpoint {uuid} is not readable")]
    EndpointNotReadable { uuid: Uuid },

    #[error("Platform does not support endpoint cache refresh")]
    CacheRefreshUnsupported,

    #[error("Text encoding error: {reason}")]
    Encoding { reason: String },

    #[error("Session already torn down")]
    DuplicateTeardown,

    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("Refusing to send an empty message")]
    EmptyMessage,

    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },

    #[error("No active connection (state: {state})")]
    NotConnected { state: String },

    #[error("Channel closed: {channel}")]
    ChannelClosed { channel: String },

    #[error("Radio link error: {reason}")]
    Link { reason: String },
}

impl EchoError {
    /// Build a link error from anything displayable
    pub fn link(reason: impl ToString) -> Self {
        EchoError::Link {
            reason: reason.to_string(),
        }
    }

    /// Whether the error leaves the session usable
    ///
    /// Degraded-mode and guard errors are reported but never abort a lifecycle
    /// transition.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            EchoError::CacheRefreshUnsupported | EchoError::DuplicateTeardown
        )
    }
}

/// Result type for echolink core operations
pub type Result<T> = std::result::Result<T, EchoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benign_errors() {
        assert!(EchoError::CacheRefreshUnsupported.is_benign());
        assert!(EchoError::DuplicateTeardown.is_benign());
        assert!(!EchoError::NoTargetDevice.is_benign());
        assert!(!EchoError::link("adapter gone").is_benign());
    }

    #[test]
    fn test_error_messages_name_the_endpoint() {
        let uuid = crate::protocol::ECHO_WRITE_CHARACTERISTIC_UUID;
        let message = EchoError::EndpointNotWritable { uuid }.to_string();
        assert!(message.contains("00002a56"));
    }
}
