//! Fragment transmitter
//!
//! Splits an outbound message into fixed-size chunks and sends them one at a
//! time. Chunk 0 goes out on [`FragmentTransmitter::send`]; every later chunk
//! goes out from [`FragmentTransmitter::advance`], which the acknowledgment
//! bridge calls after each successful read (stop-and-wait). There is no
//! pipelining, retry or deadline: a missing acknowledgment stalls the transfer
//! until the next send or a reconnect.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ChunkAddressing;
use crate::errors::{EchoError, Result};
use crate::session::{PeripheralSession, RadioLink};
use crate::types::EndpointDescriptor;

// ----------------------------------------------------------------------------
// Chunk Arithmetic
// ----------------------------------------------------------------------------

/// Number of chunks needed for `len` bytes: `ceil(len / chunk_size)`
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    len.div_ceil(chunk_size)
}

/// Build chunk `index` of `payload`
///
/// With [`ChunkAddressing::Fixed`] the chunk covers
/// `[index * chunk_size, min((index + 1) * chunk_size, len))` and is zero-padded
/// to `chunk_size`. [`ChunkAddressing::Legacy`] differs only for a short final
/// chunk, which is addressed at `index * remainder` and is `remainder` bytes long.
pub fn build_chunk(
    payload: &[u8],
    index: usize,
    chunk_size: usize,
    addressing: ChunkAddressing,
) -> Vec<u8> {
    let total = chunk_count(payload.len(), chunk_size);
    let remainder = payload.len() % chunk_size.max(1);

    let (start, length) = match addressing {
        ChunkAddressing::Legacy if index + 1 == total && remainder != 0 => {
            (index * remainder, remainder)
        }
        _ => (index * chunk_size, chunk_size),
    };

    let mut chunk = vec![0u8; length];
    if start < payload.len() {
        let end = (start + length).min(payload.len());
        chunk[..end - start].copy_from_slice(&payload[start..end]);
    }
    chunk
}

// ----------------------------------------------------------------------------
// Outbound Message
// ----------------------------------------------------------------------------

/// The single message being transferred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    payload: Vec<u8>,
    chunk_size: usize,
    total: usize,
    sent: usize,
}

impl OutboundMessage {
    /// Prepare a message for transfer; nothing has been sent yet
    pub fn new(payload: Vec<u8>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(EchoError::InvalidChunkSize);
        }
        if payload.is_empty() {
            return Err(EchoError::EmptyMessage);
        }
        let total = chunk_count(payload.len(), chunk_size);
        Ok(Self {
            payload,
            chunk_size,
            total,
            sent: 0,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total chunk count `T`
    pub fn total(&self) -> usize {
        self.total
    }

    /// Chunks written so far `S`
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// More chunks remain to be written
    pub fn is_pending(&self) -> bool {
        self.sent < self.total
    }

    pub fn chunk(&self, index: usize, addressing: ChunkAddressing) -> Vec<u8> {
        build_chunk(&self.payload, index, self.chunk_size, addressing)
    }
}

// ----------------------------------------------------------------------------
// Transmitter
// ----------------------------------------------------------------------------

/// Outcome of an acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Advance {
    /// No message was in flight
    Idle,
    /// Chunk `index` of `total` was written
    Chunk { index: usize, total: usize },
    /// The final chunk was acknowledged and the message cleared
    Complete { total: usize },
}

/// Drives one outbound message through the write endpoint
#[derive(Debug)]
pub struct FragmentTransmitter {
    write_endpoint: Uuid,
    addressing: ChunkAddressing,
    active: Option<OutboundMessage>,
}

impl FragmentTransmitter {
    pub fn new(write_endpoint: Uuid, addressing: ChunkAddressing) -> Self {
        Self {
            write_endpoint,
            addressing,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// `(sent, total)` of the in-flight message
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.active.as_ref().map(|m| (m.sent, m.total))
    }

    /// Start transferring `message`, writing chunk 0 immediately
    ///
    /// A message already in flight is discarded, not queued.
    pub fn send<L: RadioLink>(
        &mut self,
        session: &mut PeripheralSession<L>,
        message: Vec<u8>,
        chunk_size: usize,
    ) -> Result<()> {
        let endpoint = self.writable_endpoint(session)?;
        let mut outbound = OutboundMessage::new(message, chunk_size)?;

        if let Some(previous) = self.active.take() {
            warn!(
                sent = previous.sent,
                total = previous.total,
                "Superseding in-flight message"
            );
        }

        let chunk = outbound.chunk(0, self.addressing);
        debug!(index = 0, total = outbound.total, "Writing chunk");
        session.write(&endpoint, chunk)?;
        outbound.sent = 1;

        info!(
            bytes = outbound.payload.len(),
            chunks = outbound.total,
            "Started transfer"
        );
        self.active = Some(outbound);
        Ok(())
    }

    /// Handle an acknowledgment for the previously written chunk
    ///
    /// Writes the next chunk if one remains; otherwise completes and clears the
    /// message. With nothing in flight this is a no-op.
    pub fn advance<L: RadioLink>(&mut self, session: &mut PeripheralSession<L>) -> Result<Advance> {
        let Some(message) = self.active.as_ref() else {
            return Ok(Advance::Idle);
        };

        if !message.is_pending() {
            let total = message.total;
            self.active = None;
            info!(chunks = total, "Transfer complete");
            return Ok(Advance::Complete { total });
        }

        let endpoint = self.writable_endpoint(session)?;
        let index = message.sent;
        let total = message.total;
        let chunk = message.chunk(index, self.addressing);

        debug!(index, total, "Writing chunk");
        session.write(&endpoint, chunk)?;

        if let Some(message) = self.active.as_mut() {
            message.sent += 1;
        }
        Ok(Advance::Chunk { index, total })
    }

    /// Drop the in-flight message; returns whether one existed
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(message) => {
                info!(
                    sent = message.sent,
                    total = message.total,
                    "Cancelled transfer"
                );
                true
            }
            None => false,
        }
    }

    fn writable_endpoint<L: RadioLink>(
        &self,
        session: &PeripheralSession<L>,
    ) -> Result<EndpointDescriptor> {
        session
            .endpoints()
            .write
            .clone()
            .filter(|e| e.capabilities().writable)
            .ok_or(EchoError::EndpointNotWritable {
                uuid: self.write_endpoint,
            })
    }
}
