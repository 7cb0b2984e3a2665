//! Echolink application wiring
//!
//! Starts the BLE link worker and the echo client as tokio tasks and talks to
//! the client over its command and app event channels.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use echolink_ble::{BleLinkError, BleLinkWorker};
use echolink_core::{
    app_event_channel, command_channel, event_channel, AppEvent, AppEventReceiver, Command,
    CommandSender, ConnectionState, EchoClient, EchoError, PeripheralIdentity,
};

use crate::config::AppConfig;
use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Rendering
// ----------------------------------------------------------------------------

/// Text shown to the user for an app event, if any
pub fn describe(event: &AppEvent) -> Option<String> {
    match event {
        AppEvent::PeripheralReady(identity) => Some(format!("* connected to {}", identity)),
        AppEvent::PeripheralLost => Some("* disconnected".to_string()),
        AppEvent::MessageReceived(text) => Some(format!("< {}", display_text(text))),
        AppEvent::TransferComplete => Some("* delivered".to_string()),
        AppEvent::NotConnected { reason } => Some(format!("* not connected: {}", reason)),
        AppEvent::RadioPowerRequested => {
            Some("* Bluetooth is off; switch it on to start scanning".to_string())
        }
        AppEvent::Status(report) => {
            let target = report
                .target
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string());
            let transfer = report
                .transfer
                .map(|(sent, total)| format!("{}/{} chunks", sent, total))
                .unwrap_or_else(|| "idle".to_string());
            Some(format!(
                "* {} | radio {} | peer {} | notify {} | transfer {}",
                report.state,
                if report.powered { "on" } else { "off" },
                target,
                if report.subscribed { "on" } else { "off" },
                transfer
            ))
        }
        AppEvent::ServicesReady
        | AppEvent::EndpointReadable(_)
        | AppEvent::EndpointWritable(_)
        | AppEvent::ChunkWritten { .. }
        | AppEvent::ScanStopped => None,
    }
}

/// Inbound text without the zero padding and line terminator
pub fn display_text(text: &str) -> &str {
    text.trim_end_matches('\0').trim_end_matches(['\r', '\n'])
}

/// Outbound text as typed, optionally newline terminated
pub fn outgoing_text(line: &str, append_newline: bool) -> String {
    if append_newline {
        format!("{}\n", line)
    } else {
        line.to_string()
    }
}

// ----------------------------------------------------------------------------
// Readiness
// ----------------------------------------------------------------------------

/// What an app event means while waiting for the peripheral
#[derive(Debug)]
pub enum ReadyProgress {
    /// Transfers can start
    Ready(PeripheralIdentity),
    /// Keep waiting
    Waiting,
    /// The scan stopped; ask for status to learn whether a match was found
    QueryStatus,
    /// No connection will come of this attempt
    Failed(CliError),
}

/// Classify an app event received before the peripheral is ready
pub fn ready_progress(event: &AppEvent, target_name: &str) -> ReadyProgress {
    match event {
        AppEvent::PeripheralReady(identity) => ReadyProgress::Ready(identity.clone()),
        AppEvent::ScanStopped => ReadyProgress::QueryStatus,
        AppEvent::NotConnected { reason } => {
            ReadyProgress::Failed(CliError::NotConnected(reason.clone()))
        }
        AppEvent::PeripheralLost => {
            ReadyProgress::Failed(CliError::NotConnected("peripheral lost".to_string()))
        }
        AppEvent::Status(report) => match report.state {
            ConnectionState::Idle => ReadyProgress::Failed(CliError::PeripheralNotFound {
                name: target_name.to_string(),
            }),
            ConnectionState::Closing | ConnectionState::Closed => ReadyProgress::Failed(
                CliError::NotConnected("connection closed before it was ready".to_string()),
            ),
            ConnectionState::Scanning
            | ConnectionState::Connecting
            | ConnectionState::Discovering
            | ConnectionState::Ready => ReadyProgress::Waiting,
        },
        _ => ReadyProgress::Waiting,
    }
}

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

/// Running client and link tasks
pub struct EchoApp {
    config: AppConfig,
    commands: CommandSender,
    app_events: AppEventReceiver,
    client_task: JoinHandle<std::result::Result<(), EchoError>>,
    worker_task: JoinHandle<std::result::Result<(), BleLinkError>>,
}

impl EchoApp {
    /// Open the adapter, start both tasks and begin scanning
    pub async fn start(config: AppConfig) -> Result<Self> {
        let (commands, command_rx) = command_channel();
        let (event_tx, event_rx) = event_channel();
        let (app_tx, app_events) = app_event_channel();

        let (link, worker) = BleLinkWorker::start(config.ble.clone(), event_tx).await?;
        let worker_task = tokio::spawn(worker.run());

        let client = EchoClient::new(config.echo.clone(), link, app_tx)?;
        let client_task = tokio::spawn(client.run(command_rx, event_rx));

        info!(target = %config.echo.target_name, "Looking for peripheral");
        commands
            .send(Command::StartScan)
            .map_err(|_| CliError::Task("echo client stopped".to_string()))?;

        Ok(Self {
            config,
            commands,
            app_events,
            client_task,
            worker_task,
        })
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| CliError::Task("echo client stopped".to_string()))
    }

    async fn next_event(&mut self) -> Result<AppEvent> {
        self.app_events
            .recv()
            .await
            .ok_or_else(|| CliError::Task("echo client stopped".to_string()))
    }

    /// Wait until the peripheral is ready for transfers
    ///
    /// A scan that ends without a match, or a connection that closes before
    /// it is ready, is an error.
    async fn wait_ready(&mut self) -> Result<()> {
        loop {
            let event = self.next_event().await?;
            match ready_progress(&event, &self.config.echo.target_name) {
                ReadyProgress::Ready(identity) => {
                    println!("* connected to {}", identity);
                    return Ok(());
                }
                ReadyProgress::QueryStatus => self.command(Command::Status)?,
                ReadyProgress::Failed(e) => return Err(e),
                // Status replies here only answer our own queries
                ReadyProgress::Waiting if matches!(event, AppEvent::Status(_)) => {}
                ReadyProgress::Waiting => {
                    if let Some(text) = describe(&event) {
                        println!("{}", text);
                    }
                }
            }
        }
    }

    /// Send one message, print the echo and wait for delivery
    pub async fn send_once(mut self, message: &str) -> Result<()> {
        let result = self.send_and_wait(message).await;
        self.shutdown().await?;
        result
    }

    async fn send_and_wait(&mut self, message: &str) -> Result<()> {
        self.wait_ready().await?;
        self.command(Command::SendMessage {
            text: outgoing_text(message, self.config.cli.append_newline),
        })?;

        loop {
            match self.next_event().await? {
                AppEvent::TransferComplete => {
                    println!("* delivered");
                    return Ok(());
                }
                AppEvent::PeripheralLost => {
                    return Err(CliError::NotConnected("peripheral lost".to_string()))
                }
                AppEvent::NotConnected { reason } => return Err(CliError::NotConnected(reason)),
                event => {
                    if let Some(text) = describe(&event) {
                        println!("{}", text);
                    }
                }
            }
        }
    }

    /// Interactive chat on stdin until `/quit` or end of input
    pub async fn chat(mut self) -> Result<()> {
        self.wait_ready().await?;
        println!("* type a message, or /status, /disconnect, /scan, /quit");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();
        self.prompt(&mut stdout).await?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    match line.trim() {
                        "" => {}
                        "/quit" => break,
                        "/status" => self.command(Command::Status)?,
                        "/disconnect" => self.command(Command::Disconnect)?,
                        "/scan" => self.command(Command::StartScan)?,
                        _ => self.command(Command::SendMessage {
                            text: outgoing_text(&line, self.config.cli.append_newline),
                        })?,
                    }
                    self.prompt(&mut stdout).await?;
                }
                event = self.app_events.recv() => {
                    let Some(event) = event else {
                        warn!("Echo client stopped");
                        break;
                    };
                    debug!(?event, "App event");
                    if let Some(text) = describe(&event) {
                        println!("\r{}", text);
                        self.prompt(&mut stdout).await?;
                    }
                }
            }
        }

        self.shutdown().await
    }

    async fn prompt(&self, stdout: &mut tokio::io::Stdout) -> Result<()> {
        stdout.write_all(self.config.cli.prompt.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }

    /// Disconnect, then wait for both tasks to finish
    pub async fn shutdown(self) -> Result<()> {
        if self.commands.send(Command::Shutdown).is_err() {
            debug!("Echo client already stopped");
        }
        drop(self.commands);

        self.client_task.await??;
        self.worker_task.await??;
        info!("Echo client shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echolink_core::StatusReport;

    fn report(state: ConnectionState) -> AppEvent {
        AppEvent::Status(StatusReport {
            state,
            powered: true,
            target: None,
            handle: None,
            subscribed: false,
            transfer: None,
        })
    }

    #[test]
    fn test_received_text_is_trimmed() {
        let event = AppEvent::MessageReceived("hello\n\0\0\0\0".to_string());
        assert_eq!(describe(&event), Some("< hello".to_string()));
    }

    #[test]
    fn test_outgoing_text_newline() {
        assert_eq!(outgoing_text("hi", true), "hi\n");
        assert_eq!(outgoing_text("hi", false), "hi");
    }

    #[test]
    fn test_quiet_events() {
        assert_eq!(describe(&AppEvent::ServicesReady), None);
        assert_eq!(describe(&AppEvent::ChunkWritten { sent: 1, total: 2 }), None);
    }

    #[test]
    fn test_ready_event_ends_wait() {
        let identity = PeripheralIdentity::new("EchoServer", "C4:4F:33:0A:12:9B");
        let progress = ready_progress(&AppEvent::PeripheralReady(identity.clone()), "EchoServer");
        assert!(matches!(progress, ReadyProgress::Ready(i) if i == identity));
    }

    #[test]
    fn test_connection_lost_before_ready_fails_wait() {
        assert!(matches!(
            ready_progress(&AppEvent::PeripheralLost, "EchoServer"),
            ReadyProgress::Failed(CliError::NotConnected(_))
        ));
        assert!(matches!(
            ready_progress(
                &AppEvent::NotConnected {
                    reason: "service missing".to_string()
                },
                "EchoServer"
            ),
            ReadyProgress::Failed(CliError::NotConnected(reason)) if reason == "service missing"
        ));
        assert!(matches!(
            ready_progress(&report(ConnectionState::Closed), "EchoServer"),
            ReadyProgress::Failed(CliError::NotConnected(_))
        ));
    }

    #[test]
    fn test_scan_without_match_fails_wait() {
        assert!(matches!(
            ready_progress(&AppEvent::ScanStopped, "EchoServer"),
            ReadyProgress::QueryStatus
        ));
        assert!(matches!(
            ready_progress(&report(ConnectionState::Idle), "EchoServer"),
            ReadyProgress::Failed(CliError::PeripheralNotFound { name }) if name == "EchoServer"
        ));
    }

    #[test]
    fn test_connection_in_progress_keeps_waiting() {
        for state in [
            ConnectionState::Scanning,
            ConnectionState::Connecting,
            ConnectionState::Discovering,
        ] {
            assert!(matches!(
                ready_progress(&report(state), "EchoServer"),
                ReadyProgress::Waiting
            ));
        }
        assert!(matches!(
            ready_progress(&AppEvent::ServicesReady, "EchoServer"),
            ReadyProgress::Waiting
        ));
    }

    #[test]
    fn test_status_line() {
        let report = StatusReport {
            state: ConnectionState::Ready,
            powered: true,
            target: Some(PeripheralIdentity::new("EchoServer", "C4:4F:33:0A:12:9B")),
            handle: None,
            subscribed: true,
            transfer: Some((2, 3)),
        };
        let line = describe(&AppEvent::Status(report)).unwrap();
        assert!(line.starts_with("* Ready"));
        assert!(line.contains("2/3 chunks"));
        assert!(line.contains("EchoServer"));
    }
}
