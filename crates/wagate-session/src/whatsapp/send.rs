//! Outbound send utilities: chat-id parsing, chunking, and retry.

use tracing::{error, warn};
use wacore_binary::jid::Jid;
use wagate_core::error::GatewayError;
use whatsapp_rust::client::Client;

/// Retry delays for exponential backoff: 500ms, 1s, 2s.
pub(super) const RETRY_DELAYS_MS: [u64; 3] = [500, 1000, 2000];

/// Parse a gateway chat id into a protocol JID. Direct chats use the
/// `@c.us` suffix externally but `@s.whatsapp.net` on the wire.
pub(super) fn chat_id_to_jid(chat: &str) -> Result<Jid, GatewayError> {
    let wire = match chat.strip_suffix("@c.us") {
        Some(user) => format!("{user}@s.whatsapp.net"),
        None => chat.to_string(),
    };
    wire.parse()
        .map_err(|e| GatewayError::Client(format!("invalid chat id '{chat}': {e}")))
}

/// Send a message with retry and exponential backoff.
pub(super) async fn retry_send(
    client: &Client,
    jid: &Jid,
    msg: waproto::whatsapp::Message,
) -> Result<String, GatewayError> {
    let mut last_err = None;

    for (attempt, delay_ms) in RETRY_DELAYS_MS.iter().enumerate() {
        match client.send_message(jid.clone(), msg.clone()).await {
            Ok(msg_id) => return Ok(msg_id),
            Err(e) => {
                let attempt_num = attempt + 1;
                if attempt_num < RETRY_DELAYS_MS.len() {
                    warn!(
                        "whatsapp send attempt {attempt_num}/{} failed: {e}, retrying in {delay_ms}ms",
                        RETRY_DELAYS_MS.len()
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(*delay_ms)).await;
                } else {
                    error!(
                        "whatsapp send attempt {attempt_num}/{} failed: {e}, giving up",
                        RETRY_DELAYS_MS.len()
                    );
                }
                last_err = Some(e);
            }
        }
    }

    Err(GatewayError::Client(format!(
        "whatsapp send failed after {} attempts: {}",
        RETRY_DELAYS_MS.len(),
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// Split a long message into chunks that respect WhatsApp's 4096-char
/// limit, preferring newline boundaries.
pub(super) fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Back off to a char boundary so slicing can't split a
        // multibyte character.
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }

    chunks
}
