//! Recording radio link for tests
//!
//! [`RecordingLink`] accepts every request and keeps it in a shared log that
//! stays readable after the link has been moved into a client. Enabled for
//! other crates by the `test-utils` feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::errors::{EchoError, Result};
use crate::session::{LinkRequest, RadioLink};

/// Shared view of the requests a [`RecordingLink`] received
#[derive(Debug, Clone, Default)]
pub struct LinkLog {
    requests: Arc<Mutex<Vec<LinkRequest>>>,
    closed: Arc<AtomicBool>,
}

impl LinkLog {
    fn lock(&self) -> MutexGuard<'_, Vec<LinkRequest>> {
        // A test that panicked while holding the lock already failed
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every later submission fail, as if the link worker had stopped
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// All requests so far, oldest first
    pub fn requests(&self) -> Vec<LinkRequest> {
        self.lock().clone()
    }

    /// Remove and return all requests so far
    pub fn take(&self) -> Vec<LinkRequest> {
        std::mem::take(&mut *self.lock())
    }

    /// Values written so far, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock()
            .iter()
            .filter_map(|r| match r {
                LinkRequest::Write { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Endpoints read so far, in order
    pub fn reads(&self) -> Vec<Uuid> {
        self.lock()
            .iter()
            .filter_map(|r| match r {
                LinkRequest::Read { endpoint, .. } => Some(*endpoint),
                _ => None,
            })
            .collect()
    }
}

/// Radio link that records requests instead of performing them
#[derive(Debug, Default)]
pub struct RecordingLink {
    log: LinkLog,
    cache_refresh: bool,
}

impl RecordingLink {
    /// Link without cache refresh support
    pub fn new() -> (Self, LinkLog) {
        let link = Self::default();
        let log = link.log.clone();
        (link, log)
    }

    /// Link that advertises cache refresh support
    pub fn with_cache_refresh() -> (Self, LinkLog) {
        let (mut link, log) = Self::new();
        link.cache_refresh = true;
        (link, log)
    }
}

impl RadioLink for RecordingLink {
    fn submit(&mut self, request: LinkRequest) -> Result<()> {
        if self.log.is_closed() {
            return Err(EchoError::ChannelClosed {
                channel: "link requests".to_string(),
            });
        }
        self.log.lock().push(request);
        Ok(())
    }

    fn supports_cache_refresh(&self) -> bool {
        self.cache_refresh
    }
}
