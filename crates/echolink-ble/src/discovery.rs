//! Adapter setup and the central event pump
//!
//! The pump runs as its own task and turns btleplug [`CentralEvent`]s into
//! core [`PeripheralEvent`]s: sightings while a scan is running, loss of the
//! open connection, and adapter power changes.

use std::sync::Arc;

use btleplug::api::{BDAddr, Central, CentralEvent, CentralState, Manager as _, Peripheral as _};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use echolink_core::{ConnectionHandle, EventSender, PeripheralEvent, PeripheralIdentity};
use futures::stream::StreamExt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::config::BleLinkConfig;
use crate::error::{BleLinkError, Result};

// ----------------------------------------------------------------------------
// Shared Link State
// ----------------------------------------------------------------------------

/// What the event pump needs to know about the worker
#[derive(Debug, Default)]
pub(crate) struct LinkState {
    /// Sightings are only reported while a scan is running
    pub scanning: bool,
    /// Open connection the pump watches for loss
    pub connected: Option<(PeripheralId, ConnectionHandle)>,
}

pub(crate) type SharedLinkState = Arc<RwLock<LinkState>>;

// ----------------------------------------------------------------------------
// Adapter
// ----------------------------------------------------------------------------

/// Open the configured BLE adapter
pub async fn initialize_adapter(config: &BleLinkConfig) -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    if adapters.is_empty() {
        return Err(BleLinkError::AdapterNotAvailable);
    }

    let count = adapters.len();
    let adapter = adapters
        .into_iter()
        .nth(config.adapter_index)
        .ok_or(BleLinkError::AdapterIndexOutOfRange {
            index: config.adapter_index,
            count,
        })?;

    match adapter.adapter_info().await {
        Ok(info) => info!("BLE adapter initialized: {}", info),
        Err(e) => debug!("BLE adapter initialized (no info: {})", e),
    }
    Ok(adapter)
}

/// Address reported for a peripheral
///
/// Platforms that hide MAC addresses report all zeroes; the platform id is
/// used there instead.
pub fn peripheral_address(address: BDAddr, platform_id: &str) -> String {
    if address == BDAddr::default() {
        platform_id.to_string()
    } else {
        address.to_string()
    }
}

pub(crate) fn platform_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
}

/// Map an adapter state change onto a radio power event
pub fn power_event(state: CentralState) -> Option<PeripheralEvent> {
    match state {
        CentralState::PoweredOn => Some(PeripheralEvent::RadioPowerChanged { powered: true }),
        CentralState::PoweredOff => Some(PeripheralEvent::RadioPowerChanged { powered: false }),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Event Pump
// ----------------------------------------------------------------------------

/// Spawn the task that forwards adapter events
pub(crate) async fn spawn_event_pump(
    adapter: Adapter,
    state: SharedLinkState,
    events: EventSender,
) -> Result<JoinHandle<()>> {
    let mut stream = adapter.events().await?;

    Ok(tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            let Some(event) = translate(&adapter, &state, event).await else {
                continue;
            };
            if events.send(event).is_err() {
                debug!("Peripheral event receiver dropped");
                break;
            }
        }
        debug!("Adapter event pump ended");
    }))
}

async fn translate(
    adapter: &Adapter,
    state: &SharedLinkState,
    event: CentralEvent,
) -> Option<PeripheralEvent> {
    match event {
        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
            if !state.read().await.scanning {
                return None;
            }
            let peripheral = adapter.peripheral(&id).await.ok()?;
            let properties = peripheral.properties().await.ok()??;
            let name = properties.local_name?;
            let address = peripheral_address(properties.address, &platform_id(&id));
            trace!(%name, %address, rssi = ?properties.rssi, "Sighted peripheral");

            Some(PeripheralEvent::PeripheralDiscovered {
                identity: PeripheralIdentity::new(name, address),
                rssi: properties.rssi,
            })
        }
        CentralEvent::DeviceDisconnected(id) => {
            let mut state = state.write().await;
            match state.connected.as_ref() {
                Some((connected, handle)) if *connected == id => {
                    let handle = *handle;
                    state.connected = None;
                    info!(%handle, "Peripheral disconnected");
                    Some(PeripheralEvent::Disconnected { handle })
                }
                _ => None,
            }
        }
        CentralEvent::StateUpdate(adapter_state) => {
            debug!(?adapter_state, "Adapter state changed");
            power_event(adapter_state)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_address_falls_back_to_platform_id() {
        assert_eq!(
            peripheral_address(BDAddr::default(), "F1A2-uuid"),
            "F1A2-uuid"
        );
    }

    #[test]
    fn test_real_address_is_used() {
        let address = BDAddr::from([0xC4, 0x4F, 0x33, 0x0A, 0x12, 0x9B]);
        assert_eq!(
            peripheral_address(address, "hci0/dev_C4_4F_33_0A_12_9B"),
            "C4:4F:33:0A:12:9B"
        );
    }

    #[test]
    fn test_power_events() {
        assert_eq!(
            power_event(CentralState::PoweredOff),
            Some(PeripheralEvent::RadioPowerChanged { powered: false })
        );
        assert_eq!(
            power_event(CentralState::PoweredOn),
            Some(PeripheralEvent::RadioPowerChanged { powered: true })
        );
        assert_eq!(power_event(CentralState::Unknown), None);
    }
}
