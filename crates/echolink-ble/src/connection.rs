//! One open btleplug connection and its GATT operations

use std::collections::BTreeSet;
use std::time::Duration;

use btleplug::api::{CharPropFlags, Characteristic, Peripheral as _, Service, WriteType};
use btleplug::platform::{Peripheral, PeripheralId};
use echolink_core::{
    ConnectionHandle, EndpointDescriptor, EventSender, PeripheralEvent, ServiceDescriptor,
};
use futures::stream::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{BleLinkError, Result};

// ----------------------------------------------------------------------------
// Descriptor Conversion
// ----------------------------------------------------------------------------

/// Endpoint descriptor carrying the raw GATT property bits
pub fn describe_characteristic(characteristic: &Characteristic) -> EndpointDescriptor {
    EndpointDescriptor::new(characteristic.uuid, characteristic.properties.bits())
}

/// Service descriptors for everything discovery found
pub fn describe_services(services: &BTreeSet<Service>) -> Vec<ServiceDescriptor> {
    services
        .iter()
        .map(|service| {
            ServiceDescriptor::new(
                service.uuid,
                service
                    .characteristics
                    .iter()
                    .map(describe_characteristic)
                    .collect(),
            )
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Connection
// ----------------------------------------------------------------------------

/// An open connection tagged with the core's handle
pub struct BleConnection {
    handle: ConnectionHandle,
    peripheral: Peripheral,
    notifications: JoinHandle<()>,
}

impl BleConnection {
    /// Connect and start forwarding change-notifications
    ///
    /// Notification payloads are not forwarded; the client reads the value back.
    pub async fn open(
        peripheral: Peripheral,
        handle: ConnectionHandle,
        connection_timeout: Duration,
        events: EventSender,
    ) -> Result<Self> {
        match timeout(connection_timeout, peripheral.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(BleLinkError::ConnectionTimeout),
        }
        info!(%handle, "Connected");

        let mut stream = peripheral.notifications().await?;
        let notifications = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                let event = PeripheralEvent::NotificationReceived {
                    handle,
                    endpoint: notification.uuid,
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            debug!(%handle, "Notification stream ended");
        });

        Ok(Self {
            handle,
            peripheral,
            notifications,
        })
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    pub fn peripheral_id(&self) -> PeripheralId {
        self.peripheral.id()
    }

    /// Discover services and describe them for the core
    pub async fn discover(&self) -> Result<Vec<ServiceDescriptor>> {
        self.peripheral.discover_services().await?;
        let services = describe_services(&self.peripheral.services());
        debug!(handle = %self.handle, count = services.len(), "Services discovered");
        Ok(services)
    }

    pub async fn read(&self, endpoint: Uuid) -> Result<Vec<u8>> {
        let characteristic = self.characteristic(endpoint)?;
        Ok(self.peripheral.read(&characteristic).await?)
    }

    /// Write with response when the characteristic allows it
    pub async fn write(&self, endpoint: Uuid, value: &[u8]) -> Result<()> {
        let characteristic = self.characteristic(endpoint)?;
        let write_type = if characteristic.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.peripheral
            .write(&characteristic, value, write_type)
            .await?;
        Ok(())
    }

    /// Toggle notifications (btleplug writes the configuration descriptor)
    pub async fn set_notify(&self, endpoint: Uuid, enable: bool) -> Result<()> {
        let characteristic = self.characteristic(endpoint)?;
        if enable {
            self.peripheral.subscribe(&characteristic).await?;
        } else {
            self.peripheral.unsubscribe(&characteristic).await?;
        }
        Ok(())
    }

    /// Disconnect and stop the notification task
    pub async fn close(self) -> Result<()> {
        self.notifications.abort();
        self.peripheral.disconnect().await?;
        info!(handle = %self.handle, "Disconnected");
        Ok(())
    }

    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(BleLinkError::CharacteristicNotFound { uuid })
    }
}
