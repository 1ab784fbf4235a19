//! Per-dispatch invocation context handed to command handlers.

use crate::config::RuntimeConfig;
use crate::error::GatewayError;
use crate::registry::CommandRegistry;
use crate::traits::ChatClient;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Everything a command handler gets: the parsed invocation, sender
/// classification, shared runtime state, and reply/react callbacks bound
/// to the originating message. Scoped to one dispatch, never retained.
pub struct InvocationContext {
    /// Prefix in effect when the command was parsed.
    pub prefix: String,
    /// Bare sender number.
    pub sender: String,
    /// Originating chat identifier.
    pub chat: String,
    /// Full message body.
    pub body: String,
    /// Whitespace-split tokens after the command word.
    pub args: Vec<String>,
    /// The remainder after the command word, as a single string.
    pub q: String,
    /// Resolved quoted-message body, if any.
    pub quoted: Option<String>,
    /// Sender display name, if the client exposes one.
    pub push_name: Option<String>,
    pub is_me: bool,
    pub is_owner: bool,
    pub is_allowed_number: bool,
    pub is_group: bool,
    /// Shared runtime policy state; owner commands mutate it.
    pub runtime: Arc<RwLock<RuntimeConfig>>,
    /// The frozen command registry (for menu/help listings).
    pub registry: Arc<CommandRegistry>,
    message_id: String,
    client: Arc<dyn ChatClient>,
}

impl InvocationContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prefix: String,
        sender: String,
        chat: String,
        body: String,
        args: Vec<String>,
        quoted: Option<String>,
        push_name: Option<String>,
        is_me: bool,
        is_owner: bool,
        is_allowed_number: bool,
        is_group: bool,
        runtime: Arc<RwLock<RuntimeConfig>>,
        registry: Arc<CommandRegistry>,
        message_id: String,
        client: Arc<dyn ChatClient>,
    ) -> Self {
        let q = args.join(" ");
        Self {
            prefix,
            sender,
            chat,
            body,
            args,
            q,
            quoted,
            push_name,
            is_me,
            is_owner,
            is_allowed_number,
            is_group,
            runtime,
            registry,
            message_id,
            client,
        }
    }

    /// Reply in the originating chat.
    pub async fn reply(&self, text: &str) -> Result<(), GatewayError> {
        self.client.send_text(&self.chat, text).await.map(|_| ())
    }

    /// React to the originating message.
    pub async fn react(&self, emoji: &str) -> Result<(), GatewayError> {
        self.client.react(&self.chat, &self.message_id, emoji).await
    }
}
