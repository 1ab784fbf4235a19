use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An incoming chat message, as delivered by the client's event stream.
///
/// Read-only view over what the underlying client provides: identifiers,
/// body text, the quoted message (already resolved by the adapter), and
/// the self-sent flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Client-assigned message id (used for reactions).
    pub id: String,
    /// Sender identifier, `@c.us` suffix for direct senders.
    pub sender: String,
    /// Chat identifier; `@g.us` suffix denotes a group chat.
    pub chat: String,
    /// Message body text.
    pub body: String,
    /// Whether the bot itself sent this message.
    pub from_me: bool,
    /// Body of the quoted message, if the message quotes one.
    pub quoted: Option<String>,
    /// Sender display name, if the client exposes one.
    pub push_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Whether this is a broadcast-status message (always ignored).
    pub fn is_status_broadcast(&self) -> bool {
        self.chat == "status@broadcast"
    }
}

/// A media attachment to send: raw bytes plus enough metadata for the
/// client to build the outgoing message.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub bytes: Vec<u8>,
    pub mimetype: String,
    pub filename: String,
}

impl MediaPayload {
    /// Lowercased extension of the filename, with leading dot (e.g. `.jpg`),
    /// or empty if there is none.
    pub fn extension(&self) -> String {
        match self.filename.rfind('.') {
            Some(idx) => self.filename[idx..].to_lowercase(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(chat: &str) -> ChatMessage {
        ChatMessage {
            id: "id-1".into(),
            sender: "254712345678".into(),
            chat: chat.into(),
            body: ".ping".into(),
            from_me: false,
            quoted: None,
            push_name: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_status_broadcast_detection() {
        assert!(msg("status@broadcast").is_status_broadcast());
        assert!(!msg("254712345678@c.us").is_status_broadcast());
    }

    #[test]
    fn test_media_extension() {
        let media = MediaPayload {
            bytes: vec![],
            mimetype: "image/jpeg".into(),
            filename: "Photo.JPG".into(),
        };
        assert_eq!(media.extension(), ".jpg");

        let bare = MediaPayload {
            bytes: vec![],
            mimetype: "application/octet-stream".into(),
            filename: "file_1700000000".into(),
        };
        assert_eq!(bare.extension(), "");
    }
}
