//! Connection lifecycle state machine
//!
//! `Idle → Scanning → Connecting → Discovering → Ready → Closing → Closed`
//!
//! [`ConnectionState::transition`] is pure: it consumes the current state and
//! an input and returns the next state together with the actions the client
//! must carry out. Inputs the current state cannot accept are reported as
//! [`EchoError::InvalidTransition`] and leave the state untouched.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::EchoError;

// ----------------------------------------------------------------------------
// States
// ----------------------------------------------------------------------------

/// Lifecycle state of the single peripheral connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Nothing started yet
    #[default]
    Idle,
    /// Looking for the target peripheral
    Scanning,
    /// Link requested, waiting for the platform
    Connecting,
    /// Connected, resolving services and endpoints
    Discovering,
    /// Endpoints classified, transfers allowed
    Ready,
    /// Disconnect requested, waiting for confirmation
    Closing,
    /// Attempt over; a new scan starts a fresh one
    Closed,
}

impl ConnectionState {
    /// State name for logging and status reports
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Scanning => "Scanning",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Discovering => "Discovering",
            ConnectionState::Ready => "Ready",
            ConnectionState::Closing => "Closing",
            ConnectionState::Closed => "Closed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------
// Inputs and Actions
// ----------------------------------------------------------------------------

/// Inputs that drive the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleInput {
    /// Client asked to scan; `powered` is the current radio state
    StartScan { powered: bool },
    /// Scanner reported the configured target name
    TargetDiscovered,
    /// Scan window elapsed without a match
    ScanCompleted,
    Connected,
    ConnectFailed,
    /// Discovery finished; `target_present` tells whether the service exists
    ServicesResolved { target_present: bool },
    ResolutionFailed,
    /// Client asked to disconnect
    DisconnectRequested,
    /// Link reported closed (confirmation or loss)
    Disconnected,
    RadioOff,
    /// Radio came back; `resume` asks to restart scanning
    RadioOn { resume: bool },
}

impl fmt::Display for LifecycleInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Side effects the client performs after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleAction {
    /// Ask the radio-power collaborator to switch the radio on
    RequestRadioPower,
    StartScan,
    /// Stop scanning and report `ScanStopped`
    StopScan,
    Connect,
    /// Invalidate the platform endpoint cache; degraded mode if unsupported
    RefreshCache,
    DiscoverServices,
    /// Classify endpoints, subscribe to notifications and report readiness
    ActivateEndpoints,
    /// Drop the outbound message and any pending advance
    CancelTransfer,
    Disconnect,
    /// Release the connection handle and descriptors
    Release,
    /// Surface the abandoned attempt as "not connected"
    ReportNotConnected,
    /// Report that the peripheral went away
    ReportLost,
}

/// Result of a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub input: LifecycleInput,
    pub actions: Vec<LifecycleAction>,
}

impl StateTransition {
    /// Whether the state actually changed
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

// ----------------------------------------------------------------------------
// Transition Function
// ----------------------------------------------------------------------------

impl ConnectionState {
    /// Process an input and compute the next state (consumes self)
    pub fn transition(self, input: LifecycleInput) -> Result<StateTransition, EchoError> {
        use ConnectionState::*;
        use LifecycleAction as A;
        use LifecycleInput as I;

        let (to, actions) = match (self, input) {
            // Starting a scan
            (Idle | Closed, I::StartScan { powered: true }) => (Scanning, vec![A::StartScan]),
            (Idle | Closed, I::StartScan { powered: false }) => {
                (self, vec![A::RequestRadioPower])
            }
            (Scanning, I::StartScan { .. }) => (Scanning, Vec::new()),

            // Scanning
            (Scanning, I::TargetDiscovered) => (Connecting, vec![A::StopScan, A::Connect]),
            (Scanning, I::ScanCompleted) => (Idle, vec![A::StopScan]),
            (Scanning, I::DisconnectRequested) => (Closed, vec![A::StopScan]),

            // Connecting
            (Connecting, I::Connected) => {
                (Discovering, vec![A::RefreshCache, A::DiscoverServices])
            }
            (Connecting, I::ConnectFailed) => (Closed, vec![A::Release, A::ReportNotConnected]),

            // Discovering
            (Discovering, I::ServicesResolved { target_present: true }) => {
                (Ready, vec![A::ActivateEndpoints])
            }
            (Discovering, I::ServicesResolved { target_present: false } | I::ResolutionFailed) => (
                Closed,
                vec![A::Disconnect, A::Release, A::ReportNotConnected],
            ),

            // Explicit teardown
            (Connecting | Discovering | Ready, I::DisconnectRequested) => {
                (Closing, vec![A::CancelTransfer, A::Disconnect])
            }
            (Closing, I::DisconnectRequested) => (Closing, Vec::new()),

            // Link closed: confirmation while closing, loss otherwise
            (Closing, I::Disconnected) => (Closed, vec![A::Release, A::ReportLost]),
            (Connecting | Discovering | Ready, I::Disconnected) => (
                Closed,
                vec![A::CancelTransfer, A::Release, A::ReportLost],
            ),
            (Scanning, I::Disconnected) => (Closed, vec![A::StopScan]),
            (Idle, I::Disconnected) => (Closed, Vec::new()),
            (Closed, I::Disconnected) => (Closed, Vec::new()),

            // Radio power
            (Scanning, I::RadioOff) => (Closed, vec![A::StopScan]),
            (Connecting | Discovering | Ready | Closing, I::RadioOff) => (
                Closed,
                vec![A::CancelTransfer, A::Release, A::ReportLost],
            ),
            (Idle | Closed, I::RadioOff) => (Closed, Vec::new()),
            (Idle | Closed, I::RadioOn { resume: true }) => (Scanning, vec![A::StartScan]),
            (_, I::RadioOn { .. }) => (self, Vec::new()),

            (from, input) => {
                return Err(EchoError::InvalidTransition {
                    from: from.name().to_string(),
                    input: input.to_string(),
                })
            }
        };

        Ok(StateTransition {
            from: self,
            to,
            input,
            actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleAction as A;
    use LifecycleInput as I;

    fn drive(inputs: &[LifecycleInput]) -> ConnectionState {
        inputs.iter().fold(ConnectionState::Idle, |state, input| {
            state.transition(*input).unwrap().to
        })
    }

    const TO_READY: [LifecycleInput; 4] = [
        I::StartScan { powered: true },
        I::TargetDiscovered,
        I::Connected,
        I::ServicesResolved {
            target_present: true,
        },
    ];

    #[test]
    fn test_happy_path_reaches_ready() {
        assert_eq!(drive(&TO_READY), ConnectionState::Ready);
    }

    #[test]
    fn test_unpowered_scan_stays_idle_and_requests_power() {
        let transition = ConnectionState::Idle
            .transition(I::StartScan { powered: false })
            .unwrap();
        assert_eq!(transition.to, ConnectionState::Idle);
        assert_eq!(transition.actions, vec![A::RequestRadioPower]);
        assert!(!transition.changed());
    }

    #[test]
    fn test_match_stops_scan_before_connecting() {
        let transition = ConnectionState::Scanning
            .transition(I::TargetDiscovered)
            .unwrap();
        assert_eq!(transition.to, ConnectionState::Connecting);
        assert_eq!(transition.actions, vec![A::StopScan, A::Connect]);
    }

    #[test]
    fn test_connected_refreshes_cache_before_discovery() {
        let transition = ConnectionState::Connecting.transition(I::Connected).unwrap();
        assert_eq!(transition.to, ConnectionState::Discovering);
        assert_eq!(transition.actions, vec![A::RefreshCache, A::DiscoverServices]);
    }

    #[test]
    fn test_missing_service_closes() {
        let transition = ConnectionState::Discovering
            .transition(I::ServicesResolved {
                target_present: false,
            })
            .unwrap();
        assert_eq!(transition.to, ConnectionState::Closed);
        assert!(transition.actions.contains(&A::ReportNotConnected));
    }

    #[test]
    fn test_resolution_failure_closes() {
        let transition = ConnectionState::Discovering
            .transition(I::ResolutionFailed)
            .unwrap();
        assert_eq!(transition.to, ConnectionState::Closed);
    }

    #[test]
    fn test_connect_failure_closes() {
        let transition = ConnectionState::Connecting
            .transition(I::ConnectFailed)
            .unwrap();
        assert_eq!(transition.to, ConnectionState::Closed);
        assert_eq!(transition.actions, vec![A::Release, A::ReportNotConnected]);
    }

    #[test]
    fn test_explicit_disconnect_goes_through_closing() {
        let closing = ConnectionState::Ready
            .transition(I::DisconnectRequested)
            .unwrap();
        assert_eq!(closing.to, ConnectionState::Closing);
        assert_eq!(closing.actions, vec![A::CancelTransfer, A::Disconnect]);

        let closed = closing.to.transition(I::Disconnected).unwrap();
        assert_eq!(closed.to, ConnectionState::Closed);
        assert_eq!(closed.actions, vec![A::Release, A::ReportLost]);
    }

    #[test]
    fn test_disconnect_from_any_open_state_closes() {
        use ConnectionState::*;
        for state in [Idle, Scanning, Connecting, Discovering, Ready, Closing] {
            let transition = state.transition(I::Disconnected).unwrap();
            assert_eq!(transition.to, Closed, "from {}", state);
        }
    }

    #[test]
    fn test_radio_off_forces_closed_everywhere() {
        use ConnectionState::*;
        for state in [Idle, Scanning, Connecting, Discovering, Ready, Closing, Closed] {
            let transition = state.transition(I::RadioOff).unwrap();
            assert_eq!(transition.to, Closed, "from {}", state);
        }
        let lost = Ready.transition(I::RadioOff).unwrap();
        assert!(lost.actions.contains(&A::CancelTransfer));
    }

    #[test]
    fn test_radio_on_resumes_scanning_when_asked() {
        let resumed = ConnectionState::Closed
            .transition(I::RadioOn { resume: true })
            .unwrap();
        assert_eq!(resumed.to, ConnectionState::Scanning);

        let idle = ConnectionState::Closed
            .transition(I::RadioOn { resume: false })
            .unwrap();
        assert_eq!(idle.to, ConnectionState::Closed);
    }

    #[test]
    fn test_ready_unreachable_without_resolution() {
        let err = ConnectionState::Connecting
            .transition(I::ServicesResolved {
                target_present: true,
            })
            .unwrap_err();
        assert!(matches!(err, EchoError::InvalidTransition { .. }));

        let err = ConnectionState::Scanning
            .transition(I::Connected)
            .unwrap_err();
        assert_eq!(
            err,
            EchoError::InvalidTransition {
                from: "Scanning".to_string(),
                input: "Connected".to_string()
            }
        );
    }

    #[test]
    fn test_scan_window_elapsing_returns_to_idle() {
        let transition = ConnectionState::Scanning
            .transition(I::ScanCompleted)
            .unwrap();
        assert_eq!(transition.to, ConnectionState::Idle);
        assert_eq!(transition.actions, vec![A::StopScan]);
    }

    #[test]
    fn test_fresh_attempt_after_closed() {
        let transition = ConnectionState::Closed
            .transition(I::StartScan { powered: true })
            .unwrap();
        assert_eq!(transition.to, ConnectionState::Scanning);
    }
}
