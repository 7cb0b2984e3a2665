//! Protocol configuration

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{EchoError, Result};
use crate::protocol::{
    ECHO_CHUNK_SIZE, ECHO_DEVICE_NAME, ECHO_READ_CHARACTERISTIC_UUID, ECHO_SERVICE_UUID,
    ECHO_WRITE_CHARACTERISTIC_UUID,
};

// ----------------------------------------------------------------------------
// Chunk Addressing
// ----------------------------------------------------------------------------

/// How the byte offset of each chunk is computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkAddressing {
    /// Offset is always `index * chunk_size`; every chunk is padded to `chunk_size`
    #[default]
    Fixed,
    /// Reproduces the reference client: a short final chunk is addressed at
    /// `index * remainder` and sent unpadded at `remainder` bytes
    Legacy,
}

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for an echolink session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// Advertised name that selects the peripheral during scanning
    pub target_name: String,
    /// Service that must be present for the session to become ready
    pub service_uuid: Uuid,
    /// Endpoint notifications and echoed text are read from
    pub read_endpoint_uuid: Uuid,
    /// Endpoint outbound chunks are written to
    pub write_endpoint_uuid: Uuid,
    /// Payload bytes per write
    pub chunk_size: usize,
    /// Offset arithmetic for chunk construction
    pub chunk_addressing: ChunkAddressing,
    /// Restart scanning when the radio powers back on
    pub auto_resume: bool,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            target_name: ECHO_DEVICE_NAME.to_string(),
            service_uuid: ECHO_SERVICE_UUID,
            read_endpoint_uuid: ECHO_READ_CHARACTERISTIC_UUID,
            write_endpoint_uuid: ECHO_WRITE_CHARACTERISTIC_UUID,
            chunk_size: ECHO_CHUNK_SIZE,
            chunk_addressing: ChunkAddressing::Fixed,
            auto_resume: true,
        }
    }
}

impl EchoConfig {
    /// Create a configuration with the echo protocol defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the peripheral name to match during scanning
    pub fn with_target_name(mut self, name: impl Into<String>) -> Self {
        self.target_name = name.into();
        self
    }

    /// Set the required service UUID
    pub fn with_service_uuid(mut self, uuid: Uuid) -> Self {
        self.service_uuid = uuid;
        self
    }

    /// Set the read and write endpoint UUIDs
    pub fn with_endpoints(mut self, read: Uuid, write: Uuid) -> Self {
        self.read_endpoint_uuid = read;
        self.write_endpoint_uuid = write;
        self
    }

    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the chunk addressing mode
    pub fn with_chunk_addressing(mut self, addressing: ChunkAddressing) -> Self {
        self.chunk_addressing = addressing;
        self
    }

    /// Enable or disable scan resumption after the radio powers on
    pub fn with_auto_resume(mut self, enabled: bool) -> Self {
        self.auto_resume = enabled;
        self
    }

    /// Reject configurations the transmitter cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(EchoError::InvalidChunkSize);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol() {
        let config = EchoConfig::default();
        assert_eq!(config.target_name, "EchoServer");
        assert_eq!(config.chunk_size, 20);
        assert_eq!(config.read_endpoint_uuid, config.write_endpoint_uuid);
        assert_eq!(config.chunk_addressing, ChunkAddressing::Fixed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_chunk_size_is_invalid() {
        let config = EchoConfig::new().with_chunk_size(0);
        assert_eq!(config.validate(), Err(EchoError::InvalidChunkSize));
    }

    #[test]
    fn test_builder_overrides() {
        let config = EchoConfig::new()
            .with_target_name("Bench")
            .with_chunk_size(8)
            .with_chunk_addressing(ChunkAddressing::Legacy)
            .with_auto_resume(false);
        assert_eq!(config.target_name, "Bench");
        assert_eq!(config.chunk_size, 8);
        assert_eq!(config.chunk_addressing, ChunkAddressing::Legacy);
        assert!(!config.auto_resume);
    }
}
