//! Capability resolution for GATT characteristics
//!
//! Classifies an endpoint's supported operations from the raw characteristic
//! property bitmask reported by the platform.

use serde::{Deserialize, Serialize};
use std::fmt;

// ----------------------------------------------------------------------------
// Property Bits
// ----------------------------------------------------------------------------

/// Characteristic property bits as defined by the GATT specification
pub mod property {
    pub const BROADCAST: u8 = 0x01;
    pub const READ: u8 = 0x02;
    pub const WRITE_NO_RESPONSE: u8 = 0x04;
    pub const WRITE: u8 = 0x08;
    pub const NOTIFY: u8 = 0x10;
    pub const INDICATE: u8 = 0x20;
}

// ----------------------------------------------------------------------------
// Capability Set
// ----------------------------------------------------------------------------

/// Operations an endpoint supports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    pub readable: bool,
    pub writable: bool,
    pub notifiable: bool,
}

impl Capabilities {
    /// Derive the capability set from a property bitmask
    pub fn resolve(properties: u8) -> Self {
        Self {
            readable: properties & property::READ != 0,
            writable: properties & (property::WRITE | property::WRITE_NO_RESPONSE) != 0,
            notifiable: properties & property::NOTIFY != 0,
        }
    }

    /// True when the endpoint supports none of the tracked operations
    pub fn is_empty(&self) -> bool {
        !(self.readable || self.writable || self.notifiable)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::with_capacity(3);
        if self.readable {
            names.push("Readable");
        }
        if self.writable {
            names.push("Writable");
        }
        if self.notifiable {
            names.push("Notifiable");
        }
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Resolve a property bitmask into a capability set
pub fn resolve(properties: u8) -> Capabilities {
    Capabilities::resolve(properties)
}
