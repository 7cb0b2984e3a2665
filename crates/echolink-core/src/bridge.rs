//! Acknowledgment bridge
//!
//! Turns change-notifications on the read endpoint into explicit reads, and
//! read completions into delivered text plus a transmitter advance. Any
//! successful read counts as the acknowledgment for the last chunk written;
//! its content is not compared with what was sent, which keeps the client
//! compatible with the companion echo peripheral.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{EchoError, Result};
use crate::protocol::decode_ascii;
use crate::session::{PeripheralSession, RadioLink};
use crate::transmitter::{Advance, FragmentTransmitter};

/// Routes notifications and reads between the session and the transmitter
#[derive(Debug, Clone)]
pub struct AcknowledgmentBridge {
    read_endpoint: Uuid,
}

impl AcknowledgmentBridge {
    pub fn new(read_endpoint: Uuid) -> Self {
        Self { read_endpoint }
    }

    /// Whether `endpoint` is the one this bridge listens on
    pub fn watches(&self, endpoint: &Uuid) -> bool {
        &self.read_endpoint == endpoint
    }

    /// React to a change-notification by re-reading the endpoint
    ///
    /// The notification payload is never consumed. Returns whether a read was
    /// issued.
    pub fn on_notification<L: RadioLink>(
        &self,
        session: &mut PeripheralSession<L>,
        endpoint: &Uuid,
    ) -> Result<bool> {
        if !self.watches(endpoint) {
            debug!(%endpoint, "Ignoring notification from unwatched endpoint");
            return Ok(false);
        }
        let descriptor = session.endpoints().read.clone().ok_or(
            EchoError::EndpointNotReadable {
                uuid: self.read_endpoint,
            },
        )?;
        session.read(&descriptor)?;
        Ok(true)
    }

    /// Decode a completed read for the message listener
    ///
    /// Undecodable values are dropped and logged; transfer state is untouched.
    pub fn deliver(&self, value: &[u8]) -> Option<String> {
        match decode_ascii(value) {
            Ok(text) => {
                debug!(bytes = value.len(), "Received echo");
                Some(text)
            }
            Err(e) => {
                warn!("Dropping inbound message: {}", e);
                None
            }
        }
    }

    /// Treat a completed read as the acknowledgment for the last chunk
    pub fn acknowledge<L: RadioLink>(
        &self,
        transmitter: &mut FragmentTransmitter,
        session: &mut PeripheralSession<L>,
    ) -> Result<Advance> {
        if !transmitter.is_active() {
            return Ok(Advance::Idle);
        }
        transmitter.advance(session)
    }
}
