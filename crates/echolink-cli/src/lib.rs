//! Echolink CLI library
//!
//! Components of the `echolink` command-line client: argument parsing,
//! configuration loading, and the application that wires the BLE link to the
//! echo client.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use app::{EchoApp, ReadyProgress};
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
