//! Typed channel messages
//!
//! All traffic in and out of the session flows through these types:
//! - [`Command`]: UI → client
//! - [`PeripheralEvent`]: radio link → client
//! - [`AppEvent`]: client → UI
//!
//! Each direction is a tokio unbounded mpsc channel with a single consumer, so
//! messages are processed one at a time in arrival order.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::ConnectionState;
use crate::types::{ConnectionHandle, EndpointDescriptor, PeripheralIdentity, ServiceDescriptor};

// ----------------------------------------------------------------------------
// Command: UI → Client
// ----------------------------------------------------------------------------

/// Requests from the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Begin scanning for the target peripheral
    StartScan,
    /// Send a text message through the fragment transmitter
    SendMessage { text: String },
    /// Tear down the current connection
    Disconnect,
    /// Report a status snapshot as [`AppEvent::Status`]
    Status,
    /// Disconnect and stop the client task
    Shutdown,
}

// ----------------------------------------------------------------------------
// PeripheralEvent: Radio Link → Client
// ----------------------------------------------------------------------------

/// Completion and notification events delivered by the radio link
///
/// Events that belong to a connection carry its handle so late completions
/// from a replaced connection can be recognised and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeripheralEvent {
    /// Scanner saw a peripheral
    PeripheralDiscovered {
        identity: PeripheralIdentity,
        rssi: Option<i16>,
    },
    /// Scan window elapsed without being stopped
    ScanCompleted,
    /// Link established
    Connected { handle: ConnectionHandle },
    /// Link could not be established
    ConnectFailed {
        handle: ConnectionHandle,
        reason: String,
    },
    /// Link closed, either on request or because it was lost
    Disconnected { handle: ConnectionHandle },
    /// Service discovery finished
    ServicesResolved {
        handle: ConnectionHandle,
        services: Vec<ServiceDescriptor>,
    },
    /// Service discovery failed
    ResolutionFailed {
        handle: ConnectionHandle,
        reason: String,
    },
    /// The peripheral signalled that an endpoint's value changed
    NotificationReceived {
        handle: ConnectionHandle,
        endpoint: Uuid,
    },
    ReadCompleted {
        handle: ConnectionHandle,
        endpoint: Uuid,
        value: Vec<u8>,
    },
    ReadFailed {
        handle: ConnectionHandle,
        endpoint: Uuid,
        reason: String,
    },
    WriteCompleted {
        handle: ConnectionHandle,
        endpoint: Uuid,
    },
    WriteFailed {
        handle: ConnectionHandle,
        endpoint: Uuid,
        reason: String,
    },
    /// Adapter power toggled
    RadioPowerChanged { powered: bool },
}

impl PeripheralEvent {
    /// Connection the event belongs to, if any
    pub fn handle(&self) -> Option<ConnectionHandle> {
        match self {
            PeripheralEvent::Connected { handle }
            | PeripheralEvent::ConnectFailed { handle, .. }
            | PeripheralEvent::Disconnected { handle }
            | PeripheralEvent::ServicesResolved { handle, .. }
            | PeripheralEvent::ResolutionFailed { handle, .. }
            | PeripheralEvent::NotificationReceived { handle, .. }
            | PeripheralEvent::ReadCompleted { handle, .. }
            | PeripheralEvent::ReadFailed { handle, .. }
            | PeripheralEvent::WriteCompleted { handle, .. }
            | PeripheralEvent::WriteFailed { handle, .. } => Some(*handle),
            PeripheralEvent::PeripheralDiscovered { .. }
            | PeripheralEvent::ScanCompleted
            | PeripheralEvent::RadioPowerChanged { .. } => None,
        }
    }

    /// Short event name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            PeripheralEvent::PeripheralDiscovered { .. } => "PeripheralDiscovered",
            PeripheralEvent::ScanCompleted => "ScanCompleted",
            PeripheralEvent::Connected { .. } => "Connected",
            PeripheralEvent::ConnectFailed { .. } => "ConnectFailed",
            PeripheralEvent::Disconnected { .. } => "Disconnected",
            PeripheralEvent::ServicesResolved { .. } => "ServicesResolved",
            PeripheralEvent::ResolutionFailed { .. } => "ResolutionFailed",
            PeripheralEvent::NotificationReceived { .. } => "NotificationReceived",
            PeripheralEvent::ReadCompleted { .. } => "ReadCompleted",
            PeripheralEvent::ReadFailed { .. } => "ReadFailed",
            PeripheralEvent::WriteCompleted { .. } => "WriteCompleted",
            PeripheralEvent::WriteFailed { .. } => "WriteFailed",
            PeripheralEvent::RadioPowerChanged { .. } => "RadioPowerChanged",
        }
    }
}

impl fmt::Display for PeripheralEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.handle() {
            Some(handle) => write!(f, "{}[{}]", self.kind(), handle),
            None => write!(f, "{}", self.kind()),
        }
    }
}

// ----------------------------------------------------------------------------
// AppEvent: Client → UI
// ----------------------------------------------------------------------------

/// Snapshot of the session, answered to [`Command::Status`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: ConnectionState,
    pub powered: bool,
    pub target: Option<PeripheralIdentity>,
    pub handle: Option<ConnectionHandle>,
    pub subscribed: bool,
    /// `(sent, total)` chunks of the in-flight message
    pub transfer: Option<(usize, usize)>,
}

/// State changes the presentation layer renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppEvent {
    /// Connected peripheral is ready for transfers
    PeripheralReady(PeripheralIdentity),
    /// Connection ended
    PeripheralLost,
    /// Service discovery finished and endpoints were classified
    ServicesReady,
    EndpointReadable(EndpointDescriptor),
    EndpointWritable(EndpointDescriptor),
    /// Text read back from the peripheral
    MessageReceived(String),
    /// Every chunk of the outbound message was acknowledged
    TransferComplete,
    /// A chunk write was confirmed by the radio
    ChunkWritten { sent: usize, total: usize },
    /// Scanning stopped, either on a match or because the window elapsed
    ScanStopped,
    /// A connection attempt was abandoned
    NotConnected { reason: String },
    /// Scanning needs the radio to be switched on
    RadioPowerRequested,
    Status(StatusReport),
}

// ----------------------------------------------------------------------------
// Channel Types
// ----------------------------------------------------------------------------

pub type CommandSender = mpsc::UnboundedSender<Command>;
pub type CommandReceiver = mpsc::UnboundedReceiver<Command>;
pub type EventSender = mpsc::UnboundedSender<PeripheralEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PeripheralEvent>;
pub type AppEventSender = mpsc::UnboundedSender<AppEvent>;
pub type AppEventReceiver = mpsc::UnboundedReceiver<AppEvent>;

/// Create the UI → client command channel
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    mpsc::unbounded_channel()
}

/// Create the radio link → client event channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Create the client → UI app event channel
pub fn app_event_channel() -> (AppEventSender, AppEventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_handle_tagging() {
        let handle = ConnectionHandle::new(3);
        let event = PeripheralEvent::NotificationReceived {
            handle,
            endpoint: crate::protocol::ECHO_READ_CHARACTERISTIC_UUID,
        };
        assert_eq!(event.handle(), Some(handle));
        assert_eq!(event.to_string(), "NotificationReceived[conn#3]");

        let power = PeripheralEvent::RadioPowerChanged { powered: false };
        assert_eq!(power.handle(), None);
        assert_eq!(power.to_string(), "RadioPowerChanged");
    }
}
