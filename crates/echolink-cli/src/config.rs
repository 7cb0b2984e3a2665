//! Echolink CLI configuration
//!
//! Configuration comes from, in increasing priority:
//! - Built-in defaults (the echo protocol constants)
//! - A TOML file passed with `--config`
//! - Command line overrides

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use echolink_ble::BleLinkConfig;
use echolink_core::{ChunkAddressing, EchoConfig};

use crate::cli::Cli;
use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the echolink CLI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Protocol configuration
    pub echo: EchoConfig,

    /// BLE link configuration
    pub ble: BleLinkConfig,

    /// CLI-specific configuration
    pub cli: CliConfig,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Enable verbose logging output
    pub verbose: bool,

    /// Terminate every outgoing message with a newline
    pub append_newline: bool,

    /// Prompt shown in chat mode
    pub prompt: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            append_newline: true,
            prompt: "echo> ".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&contents)?;
        Ok(config)
    }

    /// Parse and validate TOML configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(target) = &cli.target {
            self.echo.target_name = target.clone();
        }
        if let Some(chunk_size) = cli.chunk_size {
            self.echo.chunk_size = chunk_size;
        }
        if cli.legacy_addressing {
            self.echo.chunk_addressing = ChunkAddressing::Legacy;
        }
        if let Some(secs) = cli.scan_timeout {
            self.ble = self.ble.clone().with_scan_timeout(Duration::from_secs(secs));
        }
        if let Some(index) = cli.adapter {
            self.ble.adapter_index = index;
        }
        if cli.verbose {
            self.cli.verbose = true;
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.echo
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;

        if self.echo.target_name.is_empty() {
            return Err(CliError::Config("Target name must not be empty".to_string()));
        }
        self.ble.validate().map_err(CliError::Config)?;
        Ok(())
    }

    /// Example configuration file content
    pub fn example_config() -> Result<String> {
        Ok(toml::to_string_pretty(&AppConfig::default())?)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.echo.target_name, "EchoServer");
        assert_eq!(config.echo.chunk_size, 20);
        assert!(config.cli.append_newline);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [echo]
            target_name = "BenchEcho"
            chunk_addressing = "legacy"

            [ble]
            scan_timeout_ms = 30000
            "#,
        )
        .unwrap();

        assert_eq!(config.echo.target_name, "BenchEcho");
        assert_eq!(config.echo.chunk_addressing, ChunkAddressing::Legacy);
        assert_eq!(config.echo.chunk_size, 20);
        assert_eq!(config.ble.scan_timeout(), Duration::from_secs(30));
        assert_eq!(config.ble.adapter_index, 0);
        assert_eq!(config.cli, CliConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            AppConfig::from_toml_str("[echo]\nchunk_size = 0\n"),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[ble]\nscan_timeout_ms = 0\n"),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[ble]\nconnection_timeout_ms = 0\n"),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            AppConfig::from_toml_str("[echo]\nchunk_size = \"many\"\n"),
            Err(CliError::TomlParsing(_))
        ));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "echolink",
            "--target",
            "Other",
            "--chunk-size",
            "16",
            "--scan-timeout",
            "3",
            "chat",
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(&cli);

        assert_eq!(config.echo.target_name, "Other");
        assert_eq!(config.echo.chunk_size, 16);
        assert_eq!(config.echo.chunk_addressing, ChunkAddressing::Fixed);
        assert_eq!(config.ble.scan_timeout_ms, 3000);
    }

    #[test]
    fn test_example_config_parses_back() {
        let example = AppConfig::example_config().unwrap();
        assert!(example.contains("[echo]"));
        assert!(example.contains("[ble]"));
        assert!(example.contains("[cli]"));
        assert_eq!(AppConfig::from_toml_str(&example).unwrap(), AppConfig::default());
    }
}
