//! Inbound message dispatch: filtering, command parsing, permission
//! enforcement, and handler invocation.

use crate::state::AppState;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use wagate_core::config::{bare_number, direct_chat_id, is_group_chat};
use wagate_core::context::InvocationContext;
use wagate_core::message::ChatMessage;
use wagate_core::policy::{self, DenyReason, SenderInfo, Verdict};

/// Consume the primary session's message stream until it closes.
/// Messages are handled one at a time, in delivery order.
pub async fn run(state: AppState, mut rx: mpsc::Receiver<ChatMessage>) {
    info!("dispatcher started ({} commands loaded)", state.registry.count());

    while let Some(msg) = rx.recv().await {
        dispatch(&state, msg).await;
    }

    info!("dispatcher stopped: message stream closed");
}

/// Handle one inbound message. Every failure path is contained here;
/// nothing propagates to the dispatch loop.
pub(crate) async fn dispatch(state: &AppState, msg: ChatMessage) {
    if msg.is_status_broadcast() {
        return;
    }

    let prefix = state.runtime.read().await.prefix.clone();
    let Some(rest) = msg.body.strip_prefix(&prefix) else {
        return;
    };

    let mut parts = rest.split_whitespace();
    let Some(word) = parts.next() else {
        return;
    };
    let command = word.to_lowercase();
    let args: Vec<String> = parts.map(str::to_string).collect();

    // Unknown commands are ignored silently.
    let Some(entry) = state.registry.lookup(&command) else {
        debug!("ignoring unknown command '{command}'");
        return;
    };
    let entry = entry.clone();

    let client = match state.sessions.primary().client().await {
        Ok(c) => c,
        Err(e) => {
            warn!("dropping command '{command}': {e}");
            return;
        }
    };

    let sender = bare_number(&msg.sender).to_string();
    let is_owner = sender == state.config.owner_number;
    let is_group = is_group_chat(&msg.chat);
    let runtime = state.runtime.read().await.clone();

    let verdict = policy::evaluate(
        SenderInfo {
            sender: &sender,
            is_owner,
            is_bot_self: msg.from_me,
            is_group,
        },
        &entry.spec.pattern,
        &runtime,
    );

    if let Verdict::Deny(reason) = verdict {
        let text = match reason {
            DenyReason::AdminOnly => policy::ADMIN_DENY_MESSAGE,
            DenyReason::Mode(mode) => policy::mode_deny_message(mode),
            // Blocked senders get the generic refusal, not a hint that
            // they are blocked.
            DenyReason::Blocked => "🚫 Command Not Allowed",
        };
        if let Err(e) = client.send_text(&msg.chat, text).await {
            warn!("denial reply failed: {e}");
        }
        return;
    }

    let is_allowed_number = runtime.allowed_numbers.contains(sender.as_str());

    let mut ctx = InvocationContext::new(
        prefix,
        sender,
        msg.chat.clone(),
        msg.body.clone(),
        args,
        msg.quoted.clone(),
        msg.push_name.clone(),
        msg.from_me,
        is_owner,
        is_allowed_number,
        is_group,
        state.runtime.clone(),
        state.registry.clone(),
        msg.id.clone(),
        client.clone(),
    );

    if let Err(e) = entry.handler.execute(&mut ctx).await {
        error!("command '{}' failed: {e}", entry.spec.pattern);
        let report = format!("⚠️ Command '{}' failed: {e}", entry.spec.pattern);
        let owner_chat = direct_chat_id(&state.config.owner_number);
        if let Err(e) = client.send_text(&owner_chat, &report).await {
            warn!("owner failure report undeliverable: {e}");
        }
    }
}
