//! Core data types shared by the session, state machine and radio links

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::capabilities::Capabilities;

// ----------------------------------------------------------------------------
// Peripheral Identity
// ----------------------------------------------------------------------------

/// Name and address of a discovered peripheral
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeripheralIdentity {
    /// Advertised local name
    pub name: String,
    /// Platform address (MAC on Linux/Android, opaque id elsewhere)
    pub address: String,
}

impl PeripheralIdentity {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for PeripheralIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

// ----------------------------------------------------------------------------
// Connection Handle
// ----------------------------------------------------------------------------

/// Opaque reference to one connection attempt
///
/// Minted by the peripheral session on every connect; completions tagged with
/// an older handle are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionHandle(u64);

impl ConnectionHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Service and Endpoint Descriptors
// ----------------------------------------------------------------------------

/// A characteristic on the peripheral, with its raw property bitmask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub uuid: Uuid,
    pub properties: u8,
}

impl EndpointDescriptor {
    pub fn new(uuid: Uuid, properties: u8) -> Self {
        Self { uuid, properties }
    }

    /// Capabilities derived from the property bitmask
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::resolve(self.properties)
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.uuid, self.capabilities())
    }
}

/// A GATT service and the endpoints it groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub uuid: Uuid,
    pub endpoints: Vec<EndpointDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(uuid: Uuid, endpoints: Vec<EndpointDescriptor>) -> Self {
        Self { uuid, endpoints }
    }

    /// Look up an endpoint by UUID
    pub fn endpoint(&self, uuid: &Uuid) -> Option<&EndpointDescriptor> {
        self.endpoints.iter().find(|e| &e.uuid == uuid)
    }
}

/// The read and write roles resolved for the current connection
///
/// Both roles may point at the same characteristic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEndpoints {
    pub read: Option<EndpointDescriptor>,
    pub write: Option<EndpointDescriptor>,
}

impl ResolvedEndpoints {
    pub fn is_empty(&self) -> bool {
        self.read.is_none() && self.write.is_none()
    }
}
