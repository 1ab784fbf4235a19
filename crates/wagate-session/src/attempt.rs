//! The authentication-attempt state machine.
//!
//! Each transition is a pure function of (current state, client event),
//! returning the new state plus side effects for the driver to apply.
//! This keeps the lifecycle testable without a live connection.

use wagate_core::traits::ClientEvent;

/// How an attempt authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptMethod {
    Qr,
    Pairing,
}

impl AttemptMethod {
    /// Attempt-id prefix, mirrored in HTTP logs.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Qr => "web-qr",
            Self::Pairing => "web-pair",
        }
    }

    /// Label used in the owner's online notification.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Qr => "qr-code",
            Self::Pairing => "pairing-code",
        }
    }
}

/// Lifecycle states of one ephemeral authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// Allocated and registered, bootstrap not yet started.
    Created,
    /// Underlying client bootstrap in flight.
    Initializing,
    /// A QR payload was shown or a pairing code issued; waiting for the
    /// user to complete linking.
    AwaitingCredential,
    /// Credential accepted by the remote service.
    Authenticated,
    /// Session fully operable. The hand-off effect fires from here; the
    /// driver records the attempt as handed off once it applies.
    Ready,
    /// Terminal: credentials persisted, primary session took over.
    HandedOff,
    /// Terminal: authentication failed.
    Failed(String),
    /// Terminal: connection dropped before reaching ready.
    Disconnected(String),
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::HandedOff | Self::Failed(_) | Self::Disconnected(_)
        )
    }
}

/// Side effects the driver must apply after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Surface a QR payload (supersedes any previous one).
    EmitQr(String),
    /// Surface the pairing code (once per attempt).
    EmitPairingCode(String),
    /// Initialize the primary session from the persisted credentials,
    /// then dispose of this attempt.
    HandOff,
    /// Tear the attempt down and surface the failure to its initiator.
    Fail(String),
}

/// Apply one client event to an attempt state.
///
/// Terminal states absorb every event. A disconnect before ready is a
/// failure; a ready attempt emits the hand-off effect, and the driver
/// marks it `HandedOff` after applying it.
pub fn transition(state: &AttemptState, event: &ClientEvent) -> (AttemptState, Vec<Effect>) {
    if state.is_terminal() {
        return (state.clone(), Vec::new());
    }

    match event {
        ClientEvent::Qr(code) => (
            AttemptState::AwaitingCredential,
            vec![Effect::EmitQr(code.clone())],
        ),
        ClientEvent::PairingCode(code) => (
            AttemptState::AwaitingCredential,
            vec![Effect::EmitPairingCode(code.clone())],
        ),
        ClientEvent::Authenticated => (AttemptState::Authenticated, Vec::new()),
        ClientEvent::Ready => (AttemptState::Ready, vec![Effect::HandOff]),
        ClientEvent::AuthFailure(reason) => (
            AttemptState::Failed(reason.clone()),
            vec![Effect::Fail(format!("authentication failed: {reason}"))],
        ),
        ClientEvent::Disconnected(reason) => (
            AttemptState::Disconnected(reason.clone()),
            vec![Effect::Fail(format!("disconnected before ready: {reason}"))],
        ),
        // Progress and message events do not advance the machine.
        ClientEvent::LoadingScreen { .. } | ClientEvent::Message(_) => {
            (state.clone(), Vec::new())
        }
    }
}
