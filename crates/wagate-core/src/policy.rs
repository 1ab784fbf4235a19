//! Permission policy — a pure decision over sender, chat type, command,
//! and runtime config.
//!
//! The block list is absolute and checked first: a blocked owner number
//! stays blocked. The admin-command set here is the actual privilege
//! gate; `CommandSpec::owner_only` is advisory metadata only.

use crate::config::{BotMode, RuntimeConfig};

/// Commands restricted to the owner regardless of bot mode.
const ADMIN_COMMANDS: [&str; 2] = ["prefix", "mode"];

/// Everything the policy needs to know about the sender of a message.
#[derive(Debug, Clone, Copy)]
pub struct SenderInfo<'a> {
    /// Bare sender number.
    pub sender: &'a str,
    pub is_owner: bool,
    pub is_bot_self: bool,
    pub is_group: bool,
}

/// Why a command was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Sender is on the block list.
    Blocked,
    /// Non-owner invoked an admin-only command.
    AdminOnly,
    /// The current bot mode does not admit this sender/chat.
    Mode(BotMode),
}

/// The policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(DenyReason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Whether a command pattern is in the hardcoded admin set.
pub fn is_admin_command(pattern: &str) -> bool {
    ADMIN_COMMANDS.contains(&pattern)
}

/// Decide whether `sender` may execute the command named `pattern`.
///
/// Decision order, first match wins:
/// 1. block list (absolute, overrides owner and bot-self),
/// 2. owner / bot-self bypass,
/// 3. allowed-number bypass for non-admin commands,
/// 4. mode-based branch.
pub fn evaluate(sender: SenderInfo<'_>, pattern: &str, config: &RuntimeConfig) -> Verdict {
    let admin = is_admin_command(pattern);

    if config.blocked_users.contains(sender.sender) {
        return Verdict::Deny(DenyReason::Blocked);
    }

    if sender.is_owner || sender.is_bot_self {
        return Verdict::Allow;
    }

    if config.allowed_numbers.contains(sender.sender) {
        return if admin {
            Verdict::Deny(DenyReason::AdminOnly)
        } else {
            Verdict::Allow
        };
    }

    if admin {
        return Verdict::Deny(DenyReason::AdminOnly);
    }

    match config.mode {
        BotMode::Public => Verdict::Allow,
        BotMode::Private => Verdict::Deny(DenyReason::Mode(BotMode::Private)),
        BotMode::InboxOnly => {
            if sender.is_group {
                Verdict::Deny(DenyReason::Mode(BotMode::InboxOnly))
            } else {
                Verdict::Allow
            }
        }
        BotMode::GroupsOnly => {
            if sender.is_group {
                Verdict::Allow
            } else {
                Verdict::Deny(DenyReason::Mode(BotMode::GroupsOnly))
            }
        }
    }
}

/// Fixed denial reply for admin-only commands.
pub const ADMIN_DENY_MESSAGE: &str = "🚫 Owner Commands are Restricted";

/// Mode-specific denial reply.
pub fn mode_deny_message(mode: BotMode) -> &'static str {
    match mode {
        BotMode::Private => "🔒 Bot is Currently Private",
        BotMode::InboxOnly => "📩 Bot Only Works in Private Chats",
        BotMode::GroupsOnly => "👥 Bot Only Works in Groups",
        BotMode::Public => "🚫 Command Not Allowed",
    }
}
