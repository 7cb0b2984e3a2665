//! Peripheral session: the single connection handle and its primitives
//!
//! [`PeripheralSession`] owns the one [`ConnectionHandle`] a client may hold and
//! forwards every radio operation to a platform [`RadioLink`]. Link methods only
//! *submit* requests; their outcomes come back later as
//! [`PeripheralEvent`](crate::channel::PeripheralEvent)s tagged with the handle
//! they were issued under.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{EchoError, Result};
use crate::types::{ConnectionHandle, EndpointDescriptor, PeripheralIdentity, ResolvedEndpoints};

// ----------------------------------------------------------------------------
// Radio Link
// ----------------------------------------------------------------------------

/// A request submitted to the radio link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkRequest {
    StartScan,
    StopScan,
    Connect {
        handle: ConnectionHandle,
        identity: PeripheralIdentity,
    },
    Disconnect {
        handle: ConnectionHandle,
    },
    RefreshCache {
        handle: ConnectionHandle,
    },
    DiscoverServices {
        handle: ConnectionHandle,
    },
    Read {
        handle: ConnectionHandle,
        endpoint: Uuid,
    },
    Write {
        handle: ConnectionHandle,
        endpoint: Uuid,
        value: Vec<u8>,
    },
    /// Toggle notifications by writing the client configuration descriptor
    SetNotify {
        handle: ConnectionHandle,
        endpoint: Uuid,
        enable: bool,
    },
}

/// Platform radio transport
///
/// Implementations must not block: each call queues the operation and reports
/// its completion as a `PeripheralEvent`. An `Err` means the request could not
/// even be submitted.
pub trait RadioLink: Send {
    /// Queue a request for the platform
    fn submit(&mut self, request: LinkRequest) -> Result<()>;

    /// Whether the platform can drop its cached service table for a device
    ///
    /// Fixed per platform when the link is constructed.
    fn supports_cache_refresh(&self) -> bool {
        false
    }
}

// ----------------------------------------------------------------------------
// Peripheral Session
// ----------------------------------------------------------------------------

/// Owner of the connection handle, resolved endpoints and subscriptions
pub struct PeripheralSession<L: RadioLink> {
    link: L,
    target: Option<PeripheralIdentity>,
    current: Option<ConnectionHandle>,
    next_handle: u64,
    endpoints: ResolvedEndpoints,
    subscriptions: BTreeSet<Uuid>,
}

impl<L: RadioLink> PeripheralSession<L> {
    /// Create a session over a radio link
    pub fn new(link: L) -> Self {
        Self {
            link,
            target: None,
            current: None,
            next_handle: 1,
            endpoints: ResolvedEndpoints::default(),
            subscriptions: BTreeSet::new(),
        }
    }

    /// Remember the peripheral the next `connect` goes to
    pub fn set_target(&mut self, identity: PeripheralIdentity) {
        self.target = Some(identity);
    }

    pub fn target(&self) -> Option<&PeripheralIdentity> {
        self.target.as_ref()
    }

    /// Current connection handle, if a connection is open or being opened
    pub fn handle(&self) -> Option<ConnectionHandle> {
        self.current
    }

    /// Whether an event tagged with `handle` belongs to the current connection
    pub fn is_current(&self, handle: ConnectionHandle) -> bool {
        self.current == Some(handle)
    }

    pub fn endpoints(&self) -> &ResolvedEndpoints {
        &self.endpoints
    }

    pub fn set_endpoints(&mut self, endpoints: ResolvedEndpoints) {
        self.endpoints = endpoints;
    }

    pub fn is_subscribed(&self, endpoint: &Uuid) -> bool {
        self.subscriptions.contains(endpoint)
    }

    // ------------------------------------------------------------------------
    // Scanning
    // ------------------------------------------------------------------------

    pub fn start_scan(&mut self) -> Result<()> {
        self.link.submit(LinkRequest::StartScan)
    }

    pub fn stop_scan(&mut self) -> Result<()> {
        self.link.submit(LinkRequest::StopScan)
    }

    // ------------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------------

    /// Open a connection to the target peripheral
    ///
    /// Mints a fresh handle; any previous handle stops being current, so its
    /// late completions are dropped.
    pub fn connect(&mut self) -> Result<ConnectionHandle> {
        let identity = self.target.clone().ok_or(EchoError::NoTargetDevice)?;

        let handle = ConnectionHandle::new(self.next_handle);
        self.next_handle += 1;

        if let Some(previous) = self.current.replace(handle) {
            warn!("Replacing {} with {} before it was released", previous, handle);
            self.endpoints = ResolvedEndpoints::default();
            self.subscriptions.clear();
        }

        info!("Connecting to {} as {}", identity, handle);
        self.link.submit(LinkRequest::Connect { handle, identity })?;
        Ok(handle)
    }

    /// Ask the link to close the current connection
    pub fn disconnect(&mut self) -> Result<()> {
        let handle = self.require_handle()?;
        debug!("Requesting disconnect of {}", handle);
        self.link.submit(LinkRequest::Disconnect { handle })
    }

    /// Drop the handle, endpoints and subscription flags after teardown
    pub fn release(&mut self) -> Result<ConnectionHandle> {
        let handle = self.current.take().ok_or(EchoError::DuplicateTeardown)?;
        self.endpoints = ResolvedEndpoints::default();
        self.subscriptions.clear();
        info!("Released {}", handle);
        Ok(handle)
    }

    /// Invalidate the platform's cached service table for the connected device
    ///
    /// Returns `CacheRefreshUnsupported` on platforms without the capability;
    /// callers continue in degraded mode.
    pub fn refresh_cache(&mut self) -> Result<()> {
        let handle = self.require_handle()?;
        if !self.link.supports_cache_refresh() {
            return Err(EchoError::CacheRefreshUnsupported);
        }
        self.link.submit(LinkRequest::RefreshCache { handle })
    }

    pub fn discover_services(&mut self) -> Result<()> {
        let handle = self.require_handle()?;
        self.link.submit(LinkRequest::DiscoverServices { handle })
    }

    // ------------------------------------------------------------------------
    // Endpoint Operations
    // ------------------------------------------------------------------------

    /// Request a read of `endpoint`
    pub fn read(&mut self, endpoint: &EndpointDescriptor) -> Result<()> {
        if !endpoint.capabilities().readable {
            return Err(EchoError::EndpointNotReadable {
                uuid: endpoint.uuid,
            });
        }
        let handle = self.require_handle()?;
        self.link.submit(LinkRequest::Read {
            handle,
            endpoint: endpoint.uuid,
        })
    }

    /// Request a write of `value` to `endpoint`
    pub fn write(&mut self, endpoint: &EndpointDescriptor, value: Vec<u8>) -> Result<()> {
        if !endpoint.capabilities().writable {
            return Err(EchoError::EndpointNotWritable {
                uuid: endpoint.uuid,
            });
        }
        let handle = self.require_handle()?;
        self.link.submit(LinkRequest::Write {
            handle,
            endpoint: endpoint.uuid,
            value,
        })
    }

    /// Enable or disable notifications on `endpoint`
    pub fn subscribe(&mut self, endpoint: &EndpointDescriptor, enable: bool) -> Result<()> {
        let handle = self.require_handle()?;
        self.link.submit(LinkRequest::SetNotify {
            handle,
            endpoint: endpoint.uuid,
            enable,
        })?;
        if enable {
            self.subscriptions.insert(endpoint.uuid);
        } else {
            self.subscriptions.remove(&endpoint.uuid);
        }
        Ok(())
    }

    fn require_handle(&self) -> Result<ConnectionHandle> {
        self.current.ok_or_else(|| EchoError::NotConnected {
            state: "no connection handle".to_string(),
        })
    }
}
