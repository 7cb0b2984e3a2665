//! BLE link configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the btleplug radio link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleLinkConfig {
    /// Milliseconds a scan runs before reporting that nothing was found
    pub scan_timeout_ms: u64,
    /// Milliseconds to wait for a connection before giving up
    pub connection_timeout_ms: u64,
    /// Which adapter to use when the host has several
    pub adapter_index: usize,
}

impl Default for BleLinkConfig {
    fn default() -> Self {
        Self {
            scan_timeout_ms: 10_000,
            connection_timeout_ms: 5_000,
            adapter_index: 0,
        }
    }
}

impl BleLinkConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set scan timeout
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout_ms = millis(timeout);
        self
    }

    /// Set connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_ms = millis(timeout);
        self
    }

    /// Select the adapter by position in the platform's adapter list
    pub fn with_adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Check that both timeouts leave the radio time to act
    pub fn validate(&self) -> Result<(), String> {
        if self.scan_timeout_ms == 0 {
            return Err("Scan timeout must be greater than 0".to_string());
        }
        if self.connection_timeout_ms == 0 {
            return Err("Connection timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BleLinkConfig::default();
        assert_eq!(config.scan_timeout(), Duration::from_secs(10));
        assert_eq!(config.connection_timeout(), Duration::from_secs(5));
        assert_eq!(config.adapter_index, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = BleLinkConfig::new()
            .with_scan_timeout(Duration::from_secs(30))
            .with_connection_timeout(Duration::from_millis(2500))
            .with_adapter_index(1);
        assert_eq!(config.scan_timeout_ms, 30_000);
        assert_eq!(config.connection_timeout(), Duration::from_millis(2500));
        assert_eq!(config.adapter_index, 1);
    }

    #[test]
    fn test_sub_second_timeout_is_kept() {
        let config = BleLinkConfig::new().with_connection_timeout(Duration::from_millis(400));
        assert_eq!(config.connection_timeout_ms, 400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeouts_are_rejected() {
        let config = BleLinkConfig::new().with_connection_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = BleLinkConfig::new().with_scan_timeout(Duration::from_micros(10));
        assert!(config.validate().is_err());
    }
}
