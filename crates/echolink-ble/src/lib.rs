//! btleplug radio link for echolink
//!
//! This crate implements the `RadioLink` trait from `echolink-core` on top of
//! btleplug's central API, so the echo client can talk to a real peripheral.
//!
//! ## Architecture
//!
//! - [`config`] - Link configuration (scan window, connection timeout, adapter)
//! - [`error`] - Error types specific to the BLE link
//! - [`discovery`] - Adapter setup and the central event pump
//! - [`connection`] - One open connection and its GATT operations
//! - [`link`] - The non-blocking `RadioLink` handed to the client
//! - [`worker`] - Sequential executor for queued link requests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use echolink_ble::{BleLinkConfig, BleLinkWorker};
//! use echolink_core::{app_event_channel, command_channel, event_channel, EchoClient, EchoConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (_commands, command_rx) = command_channel();
//! let (event_tx, event_rx) = event_channel();
//! let (app_tx, _app_rx) = app_event_channel();
//!
//! let (link, worker) = BleLinkWorker::start(BleLinkConfig::default(), event_tx).await?;
//! tokio::spawn(worker.run());
//!
//! let client = EchoClient::new(EchoConfig::default(), link, app_tx)?;
//! client.run(command_rx, event_rx).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod discovery;
pub mod error;
pub mod link;
pub mod worker;

// Public API exports
pub use config::BleLinkConfig;
pub use connection::{describe_characteristic, describe_services, BleConnection};
pub use discovery::{initialize_adapter, peripheral_address, power_event};
pub use error::BleLinkError;
pub use link::BleLink;
pub use worker::BleLinkWorker;
