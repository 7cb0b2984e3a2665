//! Echo client: the single consumer of commands and peripheral events
//!
//! [`EchoClient`] owns every piece of session state (lifecycle state, the
//! peripheral session, the transmitter and the bridge) and is the only thing
//! that mutates it. Commands and events are handled one at a time, either by
//! calling [`EchoClient::handle_command`] / [`EchoClient::handle_event`]
//! directly or by running the [`EchoClient::run`] task loop over the channels
//! from [`crate::channel`].

use tracing::{debug, error, info, trace, warn};

use crate::bridge::AcknowledgmentBridge;
use crate::channel::{
    AppEvent, AppEventSender, Command, CommandReceiver, EventReceiver, PeripheralEvent,
    StatusReport,
};
use crate::config::EchoConfig;
use crate::errors::{EchoError, Result};
use crate::protocol::encode_ascii;
use crate::session::{PeripheralSession, RadioLink};
use crate::state::{ConnectionState, LifecycleAction, LifecycleInput};
use crate::transmitter::{Advance, FragmentTransmitter};
use crate::types::{ResolvedEndpoints, ServiceDescriptor};

// ----------------------------------------------------------------------------
// Echo Client
// ----------------------------------------------------------------------------

/// Drives one peripheral connection through its lifecycle and transfers
pub struct EchoClient<L: RadioLink> {
    config: EchoConfig,
    state: ConnectionState,
    /// Last radio power state reported by the link
    powered: bool,
    /// A scan was requested and not cancelled since
    scan_requested: bool,
    session: PeripheralSession<L>,
    transmitter: FragmentTransmitter,
    bridge: AcknowledgmentBridge,
    app_events: AppEventSender,
    /// Reason reported with the next `NotConnected`
    failure: Option<String>,
    running: bool,
}

impl<L: RadioLink> EchoClient<L> {
    /// Create a client over `link`, reporting to `app_events`
    ///
    /// The radio is assumed powered until the link reports otherwise.
    pub fn new(config: EchoConfig, link: L, app_events: AppEventSender) -> Result<Self> {
        config.validate()?;

        if !link.supports_cache_refresh() {
            debug!("Radio link cannot refresh endpoint caches; discovery may see stale tables");
        }

        let transmitter =
            FragmentTransmitter::new(config.write_endpoint_uuid, config.chunk_addressing);
        let bridge = AcknowledgmentBridge::new(config.read_endpoint_uuid);

        Ok(Self {
            config,
            state: ConnectionState::Idle,
            powered: true,
            scan_requested: false,
            session: PeripheralSession::new(link),
            transmitter,
            bridge,
            app_events,
            failure: None,
            running: true,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn session(&self) -> &PeripheralSession<L> {
        &self.session
    }

    pub fn transmitter(&self) -> &FragmentTransmitter {
        &self.transmitter
    }

    /// Snapshot of the session for status reporting
    pub fn status(&self) -> StatusReport {
        let subscribed = self
            .session
            .endpoints()
            .read
            .as_ref()
            .map(|e| self.session.is_subscribed(&e.uuid))
            .unwrap_or(false);

        StatusReport {
            state: self.state,
            powered: self.powered,
            target: self.session.target().cloned(),
            handle: self.session.handle(),
            subscribed,
            transfer: self.transmitter.progress(),
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Handle one command from the presentation layer
    pub fn handle_command(&mut self, command: Command) -> Result<()> {
        debug!(state = %self.state, ?command, "Handling command");

        match command {
            Command::StartScan => {
                self.scan_requested = true;
                self.apply(LifecycleInput::StartScan {
                    powered: self.powered,
                })
            }
            Command::SendMessage { text } => self.send_message(&text),
            Command::Disconnect => {
                self.scan_requested = false;
                if matches!(self.state, ConnectionState::Idle | ConnectionState::Closed) {
                    debug!("Disconnect requested with no connection open");
                    return Ok(());
                }
                self.apply(LifecycleInput::DisconnectRequested)
            }
            Command::Status => {
                let report = self.status();
                info!(
                    state = %report.state,
                    powered = report.powered,
                    subscribed = report.subscribed,
                    transfer = ?report.transfer,
                    "Status"
                );
                self.emit(AppEvent::Status(report));
                Ok(())
            }
            Command::Shutdown => {
                self.shutdown();
                Ok(())
            }
        }
    }

    fn send_message(&mut self, text: &str) -> Result<()> {
        if !self.state.is_ready() {
            return Err(EchoError::NotConnected {
                state: self.state.name().to_string(),
            });
        }
        let payload = encode_ascii(text)?;
        self.transmitter
            .send(&mut self.session, payload, self.config.chunk_size)
    }

    /// Tear down any open connection and stop the run loop
    pub fn shutdown(&mut self) {
        info!(state = %self.state, "Shutting down echo client");
        self.scan_requested = false;

        let teardown = match self.state {
            ConnectionState::Scanning
            | ConnectionState::Connecting
            | ConnectionState::Discovering
            | ConnectionState::Ready => self.apply(LifecycleInput::DisconnectRequested),
            _ => Ok(()),
        };
        if let Err(e) = teardown {
            warn!("Teardown during shutdown failed: {}", e);
        }

        self.transmitter.cancel();
        self.running = false;
    }

    // ------------------------------------------------------------------------
    // Peripheral Events
    // ------------------------------------------------------------------------

    /// Handle one event from the radio link
    ///
    /// Events tagged with a handle other than the current one are dropped.
    pub fn handle_event(&mut self, event: PeripheralEvent) -> Result<()> {
        if let Some(handle) = event.handle() {
            if !self.session.is_current(handle) {
                debug!(%handle, event = event.kind(), "Dropping stale event");
                return Ok(());
            }
        }
        trace!(state = %self.state, %event, "Handling event");

        match event {
            PeripheralEvent::PeripheralDiscovered { identity, rssi } => {
                if self.state != ConnectionState::Scanning {
                    return Ok(());
                }
                if identity.name != self.config.target_name {
                    trace!(peripheral = %identity, ?rssi, "Ignoring non-matching peripheral");
                    return Ok(());
                }
                info!(peripheral = %identity, ?rssi, "Found target peripheral");
                self.session.set_target(identity);
                self.apply(LifecycleInput::TargetDiscovered)
            }

            PeripheralEvent::ScanCompleted => {
                if self.state != ConnectionState::Scanning {
                    return Ok(());
                }
                info!(target = %self.config.target_name, "No peripheral found");
                self.apply(LifecycleInput::ScanCompleted)
            }

            PeripheralEvent::Connected { .. } => self.apply(LifecycleInput::Connected),

            PeripheralEvent::ConnectFailed { reason, .. } => {
                error!("Connection failed: {}", reason);
                self.failure = Some(reason);
                self.apply(LifecycleInput::ConnectFailed)
            }

            PeripheralEvent::Disconnected { .. } => self.apply(LifecycleInput::Disconnected),

            PeripheralEvent::ServicesResolved { services, .. } => {
                let target_present = self.resolve_endpoints(&services);
                if !target_present {
                    self.failure = Some(format!(
                        "service {} not found on peripheral",
                        self.config.service_uuid
                    ));
                }
                self.apply(LifecycleInput::ServicesResolved { target_present })
            }

            PeripheralEvent::ResolutionFailed { reason, .. } => {
                error!("Service discovery failed: {}", reason);
                self.failure = Some(reason);
                self.apply(LifecycleInput::ResolutionFailed)
            }

            PeripheralEvent::NotificationReceived { endpoint, .. } => {
                if !self.state.is_ready() {
                    debug!(%endpoint, state = %self.state, "Ignoring notification");
                    return Ok(());
                }
                self.bridge.on_notification(&mut self.session, &endpoint)?;
                Ok(())
            }

            PeripheralEvent::ReadCompleted {
                endpoint, value, ..
            } => {
                if !self.state.is_ready() || !self.bridge.watches(&endpoint) {
                    debug!(%endpoint, state = %self.state, "Ignoring read completion");
                    return Ok(());
                }
                if let Some(text) = self.bridge.deliver(&value) {
                    self.emit(AppEvent::MessageReceived(text));
                }
                match self
                    .bridge
                    .acknowledge(&mut self.transmitter, &mut self.session)?
                {
                    Advance::Complete { .. } => self.emit(AppEvent::TransferComplete),
                    Advance::Chunk { index, total } => {
                        debug!(index, total, "Acknowledged, next chunk written")
                    }
                    Advance::Idle => {}
                }
                Ok(())
            }

            PeripheralEvent::ReadFailed {
                endpoint, reason, ..
            } => {
                warn!(%endpoint, progress = ?self.transmitter.progress(), "Read failed, transfer stalled: {}", reason);
                Ok(())
            }

            PeripheralEvent::WriteCompleted { endpoint, .. } => {
                match self.transmitter.progress() {
                    Some((sent, total)) => {
                        debug!(%endpoint, sent, total, "Chunk write confirmed");
                        self.emit(AppEvent::ChunkWritten { sent, total });
                    }
                    None => trace!(%endpoint, "Write confirmed with no transfer active"),
                }
                Ok(())
            }

            PeripheralEvent::WriteFailed {
                endpoint, reason, ..
            } => {
                warn!(%endpoint, progress = ?self.transmitter.progress(), "Write failed, transfer stalled: {}", reason);
                Ok(())
            }

            PeripheralEvent::RadioPowerChanged { powered } => {
                info!(powered, "Radio power changed");
                self.powered = powered;
                let input = if powered {
                    LifecycleInput::RadioOn {
                        resume: self.config.auto_resume && self.scan_requested,
                    }
                } else {
                    LifecycleInput::RadioOff
                };
                self.apply(input)
            }
        }
    }

    /// Pick the configured endpoints out of the target service
    ///
    /// Returns whether the target service was present.
    fn resolve_endpoints(&mut self, services: &[ServiceDescriptor]) -> bool {
        let Some(service) = services.iter().find(|s| s.uuid == self.config.service_uuid) else {
            warn!(service = %self.config.service_uuid, found = services.len(), "Target service missing");
            return false;
        };

        let endpoints = ResolvedEndpoints {
            read: service.endpoint(&self.config.read_endpoint_uuid).cloned(),
            write: service.endpoint(&self.config.write_endpoint_uuid).cloned(),
        };
        if endpoints.is_empty() {
            warn!(service = %service.uuid, "Target service exposes none of the configured endpoints");
        }
        self.session.set_endpoints(endpoints);
        true
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Feed an input to the state machine and carry out its actions
    ///
    /// Every action runs even if an earlier one fails; the first non-benign
    /// failure is returned.
    fn apply(&mut self, input: LifecycleInput) -> Result<()> {
        let transition = self.state.transition(input)?;
        if transition.changed() {
            info!(from = %transition.from, to = %transition.to, %input, "Lifecycle transition");
        }
        self.state = transition.to;

        let mut first_error = None;
        for action in transition.actions {
            if let Err(e) = self.perform(action) {
                if e.is_benign() {
                    debug!(?action, "{}", e);
                } else {
                    error!(?action, "Lifecycle action failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn perform(&mut self, action: LifecycleAction) -> Result<()> {
        match action {
            LifecycleAction::RequestRadioPower => {
                warn!("Radio is off, requesting power before scanning");
                self.emit(AppEvent::RadioPowerRequested);
                Ok(())
            }
            LifecycleAction::StartScan => {
                info!(target = %self.config.target_name, "Scanning");
                self.session.start_scan()
            }
            LifecycleAction::StopScan => {
                let result = self.session.stop_scan();
                self.emit(AppEvent::ScanStopped);
                result
            }
            LifecycleAction::Connect => match self.session.connect() {
                Ok(_) => Ok(()),
                Err(e) => {
                    self.failure = Some(e.to_string());
                    self.apply(LifecycleInput::ConnectFailed)
                }
            },
            LifecycleAction::RefreshCache => match self.session.refresh_cache() {
                Err(EchoError::CacheRefreshUnsupported) => {
                    warn!("Endpoint cache refresh unsupported, continuing in degraded mode");
                    Ok(())
                }
                other => other,
            },
            LifecycleAction::DiscoverServices => match self.session.discover_services() {
                Ok(()) => Ok(()),
                Err(e) => {
                    self.failure = Some(e.to_string());
                    self.apply(LifecycleInput::ResolutionFailed)
                }
            },
            LifecycleAction::ActivateEndpoints => self.activate_endpoints(),
            LifecycleAction::CancelTransfer => {
                self.transmitter.cancel();
                Ok(())
            }
            LifecycleAction::Disconnect => self.session.disconnect(),
            LifecycleAction::Release => self.session.release().map(|_| ()),
            LifecycleAction::ReportNotConnected => {
                let reason = self
                    .failure
                    .take()
                    .unwrap_or_else(|| "connection attempt abandoned".to_string());
                self.emit(AppEvent::NotConnected { reason });
                Ok(())
            }
            LifecycleAction::ReportLost => {
                self.failure = None;
                self.emit(AppEvent::PeripheralLost);
                Ok(())
            }
        }
    }

    /// Announce endpoint capabilities, subscribe and report readiness
    fn activate_endpoints(&mut self) -> Result<()> {
        let endpoints = self.session.endpoints().clone();

        if let Some(read) = &endpoints.read {
            if read.capabilities().readable {
                self.emit(AppEvent::EndpointReadable(read.clone()));
            }
        }
        if let Some(write) = &endpoints.write {
            if write.capabilities().writable {
                self.emit(AppEvent::EndpointWritable(write.clone()));
            }
        }

        match &endpoints.read {
            Some(read) if read.capabilities().notifiable => {
                debug!(endpoint = %read.uuid, "Subscribing to notifications");
                self.session.subscribe(read, true)?;
            }
            Some(read) => warn!(endpoint = %read, "Read endpoint is not notifiable; echoes will not arrive"),
            None => warn!(endpoint = %self.config.read_endpoint_uuid, "Read endpoint not found"),
        }

        self.emit(AppEvent::ServicesReady);
        if let Some(identity) = self.session.target().cloned() {
            info!(peripheral = %identity, "Peripheral ready");
            self.emit(AppEvent::PeripheralReady(identity));
        }
        Ok(())
    }

    fn emit(&mut self, event: AppEvent) {
        if self.app_events.send(event).is_err() && self.running {
            warn!("App event receiver dropped, stopping echo client");
            self.running = false;
        }
    }

    // ------------------------------------------------------------------------
    // Task Loop
    // ------------------------------------------------------------------------

    /// Process commands and events until shutdown or a channel closes
    pub async fn run(
        mut self,
        mut commands: CommandReceiver,
        mut events: EventReceiver,
    ) -> Result<()> {
        info!(target = %self.config.target_name, "Echo client starting");

        while self.running {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if let Err(e) = self.handle_command(command) {
                            self.triage(e, "command")?;
                        }
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                },
                event = events.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_event(event) {
                            self.triage(e, "event")?;
                        }
                    }
                    None => {
                        error!("Peripheral event channel closed, shutting down");
                        break;
                    }
                },
            }
        }

        if self.running {
            self.shutdown();
        }
        info!("Echo client stopped");
        Ok(())
    }

    /// Decide whether a handler error stops the loop
    fn triage(&mut self, e: EchoError, source: &str) -> Result<()> {
        match e {
            EchoError::ChannelClosed { .. } => {
                error!("Unrecoverable error processing {}, shutting down: {}", source, e);
                self.running = false;
                Err(e)
            }
            EchoError::InvalidTransition { .. } => {
                debug!("Rejected {} in state {}: {}", source, self.state, e);
                Ok(())
            }
            EchoError::NotConnected { .. } => {
                warn!("Dropping {}: {}", source, e);
                self.emit(AppEvent::NotConnected {
                    reason: e.to_string(),
                });
                Ok(())
            }
            EchoError::EmptyMessage
            | EchoError::Encoding { .. }
            | EchoError::EndpointNotWritable { .. } => {
                warn!("Dropping {}: {}", source, e);
                Ok(())
            }
            _ => {
                error!("Error processing {}: {}", source, e);
                Ok(())
            }
        }
    }
}
