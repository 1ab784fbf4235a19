//! Protocol event translation.
//!
//! Maps `whatsapp-rust` events onto the client-event stream and converts
//! inbound protocol messages into [`ChatMessage`]s.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wacore::types::events::Event;
use wacore::types::message::MessageInfo;
use wacore_binary::jid::Jid;
use wagate_core::message::ChatMessage;
use wagate_core::traits::ClientEvent;

/// Forward one protocol event onto the client-event stream.
pub(super) async fn forward(event: Event, tx: &mpsc::Sender<ClientEvent>) {
    let mapped = match event {
        Event::PairingQrCode { code, .. } => {
            info!("whatsapp QR code generated");
            Some(ClientEvent::Qr(code))
        }
        Event::PairingCode { code, .. } => {
            info!("whatsapp pairing code received");
            Some(ClientEvent::PairingCode(code))
        }
        Event::PairSuccess(_) => {
            info!("whatsapp pairing successful");
            Some(ClientEvent::Authenticated)
        }
        Event::Connected(_) => {
            info!("whatsapp connected");
            Some(ClientEvent::Ready)
        }
        Event::LoggedOut(_) => {
            warn!("whatsapp logged out, session invalidated");
            Some(ClientEvent::AuthFailure("logged out".into()))
        }
        Event::Disconnected(_) => {
            warn!("whatsapp disconnected");
            Some(ClientEvent::Disconnected("connection closed".into()))
        }
        Event::Message(msg, info) => convert_message(&msg, &info).map(ClientEvent::Message),
        _ => None,
    };

    if let Some(event) = mapped {
        if tx.send(event).await.is_err() {
            debug!("whatsapp event receiver dropped");
        }
    }
}

/// Convert an inbound protocol message. Returns `None` for messages with
/// no text content.
fn convert_message(msg: &waproto::whatsapp::Message, info: &MessageInfo) -> Option<ChatMessage> {
    // Unwrap nested wrappers (device_sent, ephemeral, view_once).
    let inner = msg
        .device_sent_message
        .as_ref()
        .and_then(|d| d.message.as_deref())
        .or_else(|| {
            msg.ephemeral_message
                .as_ref()
                .and_then(|e| e.message.as_deref())
        })
        .or_else(|| {
            msg.view_once_message
                .as_ref()
                .and_then(|v| v.message.as_deref())
        })
        .unwrap_or(msg);

    let body = text_of(inner)?.to_string();

    let quoted = inner
        .extended_text_message
        .as_ref()
        .and_then(|e| e.context_info.as_ref())
        .and_then(|c| c.quoted_message.as_deref())
        .and_then(text_of)
        .map(str::to_string);

    let push_name = if info.push_name.is_empty() {
        None
    } else {
        Some(info.push_name.clone())
    };

    Some(ChatMessage {
        id: info.id.clone(),
        sender: jid_to_chat_id(&info.source.sender),
        chat: jid_to_chat_id(&info.source.chat),
        body,
        from_me: info.source.is_from_me,
        quoted,
        push_name,
        timestamp: chrono::Utc::now(),
    })
}

fn text_of(msg: &waproto::whatsapp::Message) -> Option<&str> {
    msg.conversation
        .as_deref()
        .or_else(|| {
            msg.extended_text_message
                .as_ref()
                .and_then(|e| e.text.as_deref())
        })
        .filter(|t| !t.is_empty())
}

/// Render a protocol JID in gateway chat-id form: `@g.us` for groups,
/// `@c.us` for direct chats, everything else verbatim (so broadcast
/// addresses survive for filtering downstream).
fn jid_to_chat_id(jid: &Jid) -> String {
    match jid.server.as_str() {
        "g.us" => format!("{}@g.us", jid.user),
        "s.whatsapp.net" | "c.us" => format!("{}@c.us", jid.user),
        _ => jid.to_string(),
    }
}
