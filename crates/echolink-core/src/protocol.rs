//! Echo peripheral protocol constants and text codec
//!
//! These values must match the companion `EchoServer` peripheral for the two
//! sides to interoperate.

use uuid::Uuid;

use crate::errors::{EchoError, Result};

// ----------------------------------------------------------------------------
// GATT Service and Characteristic UUIDs
// ----------------------------------------------------------------------------

/// Echo service UUID
pub const ECHO_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180c_0000_1000_8000_00805f9b34fb);

/// Characteristic the client reads echoed text from
pub const ECHO_READ_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x00002a56_0000_1000_8000_00805f9b34fb);

/// Characteristic the client writes chunks to.
///
/// Same value as the read characteristic; the two roles are still configured
/// independently.
pub const ECHO_WRITE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x00002a56_0000_1000_8000_00805f9b34fb);

/// Client characteristic configuration descriptor, written to toggle notifications
pub const CLIENT_CONFIG_DESCRIPTOR_UUID: Uuid =
    Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

// ----------------------------------------------------------------------------
// Transfer Parameters
// ----------------------------------------------------------------------------

/// Advertised name of the peripheral we pair with
pub const ECHO_DEVICE_NAME: &str = "EchoServer";

/// Payload bytes per write on the echo characteristic
pub const ECHO_CHUNK_SIZE: usize = 20;

// ----------------------------------------------------------------------------
// Text Codec
// ----------------------------------------------------------------------------

/// Encode outbound text as ASCII bytes
pub fn encode_ascii(text: &str) -> Result<Vec<u8>> {
    if let Some(position) = text.bytes().position(|b| !b.is_ascii()) {
        return Err(EchoError::Encoding {
            reason: format!("non-ASCII byte at offset {}", position),
        });
    }
    Ok(text.as_bytes().to_vec())
}

/// Decode an inbound characteristic value as ASCII text
///
/// Zero padding is kept; callers that display the text strip it themselves.
pub fn decode_ascii(value: &[u8]) -> Result<String> {
    if let Some(position) = value.iter().position(|b| !b.is_ascii()) {
        return Err(EchoError::Encoding {
            reason: format!("non-ASCII byte 0x{:02x} at offset {}", value[position], position),
        });
    }
    // Every byte is ASCII, so this cannot fail
    String::from_utf8(value.to_vec()).map_err(|e| EchoError::Encoding {
        reason: e.to_string(),
    })
}
