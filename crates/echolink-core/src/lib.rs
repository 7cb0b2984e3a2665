//! Echolink Core
//!
//! Platform-free client side of the echo peripheral protocol: a chunked
//! stop-and-wait text transfer over one GATT characteristic, gated by a
//! connection lifecycle state machine.
//!
//! The radio itself is abstracted behind [`RadioLink`]; everything above it is
//! driven by [`EchoClient`], which consumes [`Command`]s and
//! [`PeripheralEvent`]s one at a time and reports [`AppEvent`]s.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod bridge;
pub mod capabilities;
pub mod channel;
pub mod client;
pub mod config;
pub mod errors;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transmitter;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use bridge::AcknowledgmentBridge;
pub use capabilities::{property, Capabilities};
pub use channel::{
    app_event_channel, command_channel, event_channel, AppEvent, AppEventReceiver,
    AppEventSender, Command, CommandReceiver, CommandSender, EventReceiver, EventSender,
    PeripheralEvent, StatusReport,
};
pub use client::EchoClient;
pub use config::{ChunkAddressing, EchoConfig};
pub use errors::{EchoError, Result};
pub use protocol::{
    decode_ascii, encode_ascii, CLIENT_CONFIG_DESCRIPTOR_UUID, ECHO_CHUNK_SIZE, ECHO_DEVICE_NAME,
    ECHO_READ_CHARACTERISTIC_UUID, ECHO_SERVICE_UUID, ECHO_WRITE_CHARACTERISTIC_UUID,
};
pub use session::{LinkRequest, PeripheralSession, RadioLink};
pub use state::{ConnectionState, LifecycleAction, LifecycleInput, StateTransition};
pub use transmitter::{build_chunk, chunk_count, Advance, FragmentTransmitter, OutboundMessage};
pub use types::{
    ConnectionHandle, EndpointDescriptor, PeripheralIdentity, ResolvedEndpoints,
    ServiceDescriptor,
};
