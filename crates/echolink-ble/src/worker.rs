//! Link worker: performs queued link requests against btleplug
//!
//! The worker drains the request queue one request at a time, so btleplug
//! operations on the peripheral never overlap. Every outcome is reported as a
//! [`PeripheralEvent`] tagged with the handle the request carried.

use std::sync::Arc;

use btleplug::api::{Central, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Peripheral};
use echolink_core::{
    ConnectionHandle, EventSender, LinkRequest, PeripheralEvent, PeripheralIdentity,
    ServiceDescriptor,
};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::BleLinkConfig;
use crate::connection::BleConnection;
use crate::discovery::{
    initialize_adapter, peripheral_address, platform_id, spawn_event_pump, LinkState,
    SharedLinkState,
};
use crate::error::{BleLinkError, Result};
use crate::link::{BleLink, RequestReceiver};

// ----------------------------------------------------------------------------
// Link Worker
// ----------------------------------------------------------------------------

/// Owns the adapter and the open connection
pub struct BleLinkWorker {
    config: BleLinkConfig,
    adapter: Adapter,
    requests: RequestReceiver,
    events: EventSender,
    state: SharedLinkState,
    connection: Option<BleConnection>,
    scan_timer: Option<JoinHandle<()>>,
    event_pump: JoinHandle<()>,
}

impl BleLinkWorker {
    /// Open the adapter and create the link/worker pair
    ///
    /// Hand the [`BleLink`] to the echo client and spawn [`BleLinkWorker::run`].
    pub async fn start(config: BleLinkConfig, events: EventSender) -> Result<(BleLink, Self)> {
        let adapter = initialize_adapter(&config).await?;
        let state: SharedLinkState = Arc::new(RwLock::new(LinkState::default()));
        let event_pump = spawn_event_pump(adapter.clone(), state.clone(), events.clone()).await?;
        let (request_tx, requests) = mpsc::unbounded_channel();

        let worker = Self {
            config,
            adapter,
            requests,
            events,
            state,
            connection: None,
            scan_timer: None,
            event_pump,
        };
        Ok((BleLink::new(request_tx), worker))
    }

    /// Process requests until every link handle is dropped
    pub async fn run(mut self) -> Result<()> {
        info!("BLE link worker starting");

        while let Some(request) = self.requests.recv().await {
            if !self.process(request).await {
                break;
            }
        }

        self.stop().await;
        info!("BLE link worker stopped");
        Ok(())
    }

    /// Perform one request; returns false once nobody listens for events
    async fn process(&mut self, request: LinkRequest) -> bool {
        match request {
            LinkRequest::StartScan => match self.start_scan().await {
                Ok(()) => true,
                Err(e) => {
                    error!("Failed to start scan: {}", e);
                    self.emit(PeripheralEvent::ScanCompleted)
                }
            },

            LinkRequest::StopScan => {
                if let Err(e) = self.stop_scan().await {
                    warn!("Failed to stop scan: {}", e);
                }
                true
            }

            LinkRequest::Connect { handle, identity } => {
                let event = match self.connect(handle, &identity).await {
                    Ok(()) => PeripheralEvent::Connected { handle },
                    Err(e) => {
                        error!(%handle, "Failed to connect to {}: {}", identity, e);
                        PeripheralEvent::ConnectFailed {
                            handle,
                            reason: e.to_string(),
                        }
                    }
                };
                self.emit(event)
            }

            LinkRequest::Disconnect { handle } => {
                self.disconnect(handle).await;
                self.emit(PeripheralEvent::Disconnected { handle })
            }

            LinkRequest::RefreshCache { handle } => {
                debug!(%handle, "Endpoint cache refresh not available on this platform");
                true
            }

            LinkRequest::DiscoverServices { handle } => {
                let event = match self.discover(handle).await {
                    Ok(services) => PeripheralEvent::ServicesResolved { handle, services },
                    Err(e) => PeripheralEvent::ResolutionFailed {
                        handle,
                        reason: e.to_string(),
                    },
                };
                self.emit(event)
            }

            LinkRequest::Read { handle, endpoint } => {
                let event = match self.read(handle, endpoint).await {
                    Ok(value) => {
                        debug!(%handle, %endpoint, bytes = value.len(), "Read complete");
                        PeripheralEvent::ReadCompleted {
                            handle,
                            endpoint,
                            value,
                        }
                    }
                    Err(e) => PeripheralEvent::ReadFailed {
                        handle,
                        endpoint,
                        reason: e.to_string(),
                    },
                };
                self.emit(event)
            }

            LinkRequest::Write {
                handle,
                endpoint,
                value,
            } => {
                let event = match self.write(handle, endpoint, &value).await {
                    Ok(()) => PeripheralEvent::WriteCompleted { handle, endpoint },
                    Err(e) => PeripheralEvent::WriteFailed {
                        handle,
                        endpoint,
                        reason: e.to_string(),
                    },
                };
                self.emit(event)
            }

            LinkRequest::SetNotify {
                handle,
                endpoint,
                enable,
            } => {
                let result = match self.connection_for(handle) {
                    Ok(connection) => connection.set_notify(endpoint, enable).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(()) => debug!(%handle, %endpoint, enable, "Notifications toggled"),
                    Err(e) => warn!(%handle, %endpoint, "Failed to toggle notifications: {}", e),
                }
                true
            }
        }
    }

    fn emit(&self, event: PeripheralEvent) -> bool {
        if self.events.send(event).is_err() {
            debug!("Peripheral event receiver dropped");
            return false;
        }
        true
    }

    // ------------------------------------------------------------------------
    // Scanning
    // ------------------------------------------------------------------------

    async fn start_scan(&mut self) -> Result<()> {
        if let Some(timer) = self.scan_timer.take() {
            timer.abort();
        }

        self.adapter.start_scan(ScanFilter::default()).await?;
        self.state.write().await.scanning = true;

        let scan_timeout = self.config.scan_timeout();
        info!(timeout_secs = scan_timeout.as_secs(), "Started BLE scan");

        let adapter = self.adapter.clone();
        let state = self.state.clone();
        let events = self.events.clone();
        self.scan_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(scan_timeout).await;
            {
                let mut state = state.write().await;
                if !state.scanning {
                    return;
                }
                state.scanning = false;
            }
            if let Err(e) = adapter.stop_scan().await {
                warn!("Failed to stop scan after timeout: {}", e);
            }
            info!("Scan window elapsed");
            let _ = events.send(PeripheralEvent::ScanCompleted);
        }));
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<()> {
        if let Some(timer) = self.scan_timer.take() {
            timer.abort();
        }

        let was_scanning = std::mem::take(&mut self.state.write().await.scanning);
        if was_scanning {
            self.adapter.stop_scan().await?;
            info!("Stopped BLE scan");
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------------

    async fn connect(&mut self, handle: ConnectionHandle, identity: &PeripheralIdentity) -> Result<()> {
        if let Some(previous) = self.connection.take() {
            warn!(previous = %previous.handle(), "Dropping connection replaced by {}", handle);
            if let Err(e) = previous.close().await {
                debug!("Closing replaced connection failed: {}", e);
            }
        }

        let peripheral = self.find_peripheral(&identity.address).await?;
        let connection = BleConnection::open(
            peripheral,
            handle,
            self.config.connection_timeout(),
            self.events.clone(),
        )
        .await?;

        self.state.write().await.connected = Some((connection.peripheral_id(), handle));
        self.connection = Some(connection);
        Ok(())
    }

    async fn find_peripheral(&self, address: &str) -> Result<Peripheral> {
        for peripheral in self.adapter.peripherals().await? {
            let reported = match peripheral.properties().await {
                Ok(Some(properties)) => {
                    peripheral_address(properties.address, &platform_id(&peripheral.id()))
                }
                _ => platform_id(&peripheral.id()),
            };
            if reported == address {
                return Ok(peripheral);
            }
        }
        Err(BleLinkError::PeripheralNotFound {
            address: address.to_string(),
        })
    }

    async fn disconnect(&mut self, handle: ConnectionHandle) {
        let connection = match self.connection.take() {
            Some(connection) if connection.handle() == handle => connection,
            other => {
                self.connection = other;
                debug!(%handle, "Disconnect for a connection that is already gone");
                return;
            }
        };

        {
            let mut state = self.state.write().await;
            if matches!(state.connected, Some((_, h)) if h == handle) {
                state.connected = None;
            }
        }

        if let Err(e) = connection.close().await {
            warn!(%handle, "Disconnect failed: {}", e);
        }
    }

    fn connection_for(&self, handle: ConnectionHandle) -> Result<&BleConnection> {
        self.connection
            .as_ref()
            .filter(|c| c.handle() == handle)
            .ok_or(BleLinkError::NotConnected { handle })
    }

    // ------------------------------------------------------------------------
    // GATT Operations
    // ------------------------------------------------------------------------

    async fn discover(&self, handle: ConnectionHandle) -> Result<Vec<ServiceDescriptor>> {
        self.connection_for(handle)?.discover().await
    }

    async fn read(&self, handle: ConnectionHandle, endpoint: Uuid) -> Result<Vec<u8>> {
        self.connection_for(handle)?.read(endpoint).await
    }

    async fn write(&self, handle: ConnectionHandle, endpoint: Uuid, value: &[u8]) -> Result<()> {
        debug!(%handle, %endpoint, bytes = value.len(), "Writing chunk");
        self.connection_for(handle)?.write(endpoint, value).await
    }

    // ------------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------------

    async fn stop(&mut self) {
        if let Err(e) = self.stop_scan().await {
            debug!("Failed to stop scan during shutdown: {}", e);
        }
        if let Some(connection) = self.connection.take() {
            let handle = connection.handle();
            if let Err(e) = connection.close().await {
                debug!(%handle, "Failed to disconnect during shutdown: {}", e);
            }
        }
        self.event_pump.abort();
    }
}
