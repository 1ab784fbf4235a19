//! The chat-client boundary.
//!
//! Everything that actually speaks the WhatsApp protocol lives behind
//! these traits. The session lifecycle, dispatcher, and HTTP API are
//! written against them, so all gateway logic is testable with a fake
//! client and a scripted event stream.

use crate::error::GatewayError;
use crate::message::{ChatMessage, MediaPayload};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// How a client instance authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Fresh bootstrap via QR scan.
    Qr,
    /// Fresh bootstrap via a pairing code for the given phone number.
    Pairing { phone: String },
    /// Resume from credentials already persisted by a previous bootstrap.
    Resume,
}

/// Events emitted by a chat client over its lifetime.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A QR payload. Emitted repeatedly; each supersedes the last.
    Qr(String),
    /// The pairing code for a `Pairing` client. Emitted once per attempt.
    PairingCode(String),
    /// The remote service accepted the credential.
    Authenticated,
    /// The session is fully operable.
    Ready,
    /// Authentication was rejected.
    AuthFailure(String),
    /// The connection dropped.
    Disconnected(String),
    /// Bootstrap progress (informational only).
    LoadingScreen { percent: u32, message: String },
    /// An inbound chat message (only meaningful after `Ready`).
    Message(ChatMessage),
}

/// A connected (or connecting) chat client.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a text message. Returns the client-assigned message id.
    async fn send_text(&self, chat: &str, text: &str) -> Result<String, GatewayError>;

    /// Send a media attachment with an optional caption.
    async fn send_media(
        &self,
        chat: &str,
        media: MediaPayload,
        caption: Option<&str>,
    ) -> Result<String, GatewayError>;

    /// React to a message with an emoji.
    async fn react(&self, chat: &str, message_id: &str, emoji: &str)
        -> Result<(), GatewayError>;

    /// Tear the client down, releasing its underlying resources.
    async fn destroy(&self) -> Result<(), GatewayError>;
}

/// Creates client instances. Each call owns a fresh underlying session;
/// instances never share state.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Start a client's bootstrap and return it together with its event
    /// stream. The returned client is initializing; progress arrives as
    /// [`ClientEvent`]s on the receiver.
    async fn create(
        &self,
        client_id: &str,
        method: AuthMethod,
    ) -> Result<(Arc<dyn ChatClient>, mpsc::Receiver<ClientEvent>), GatewayError>;
}
