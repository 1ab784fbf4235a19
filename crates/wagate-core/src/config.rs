//! Environment-driven configuration.
//!
//! [`Config`] is read once at startup and never mutated. [`RuntimeConfig`]
//! is the owner-mutable policy state (prefix, mode, allow/block lists);
//! it is shared behind a `tokio::sync::RwLock` and passed explicitly to
//! the dispatcher, API, and session manager.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Default HTTP port.
const DEFAULT_PORT: u16 = 8000;
/// Default credential storage location.
const DEFAULT_AUTH_PATH: &str = "./auth";
/// Default command prefix.
const DEFAULT_PREFIX: &str = ".";

/// Immutable process configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen port (`PORT`, default 8000).
    pub port: u16,
    /// The bot's own phone number (`BOT_NUMBER`).
    pub bot_number: String,
    /// The owner's phone number (`OWNER_NUMBER`).
    pub owner_number: String,
    /// Credential storage directory (`AUTH_PATH`, default `./auth`).
    pub auth_path: String,
    /// Browser/client visibility toggle (`HEADLESS`, default true).
    pub headless: bool,
    /// Forced auth flow (`AUTH_TYPE=pairing-code` skips the terminal prompt).
    pub auth_type: Option<String>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, GatewayError> {
        let port = match std::env::var("PORT") {
            Ok(v) => v
                .parse::<u16>()
                .map_err(|_| GatewayError::Config(format!("invalid PORT value '{v}'")))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            bot_number: std::env::var("BOT_NUMBER").unwrap_or_default(),
            owner_number: std::env::var("OWNER_NUMBER").unwrap_or_default(),
            auth_path: std::env::var("AUTH_PATH").unwrap_or_else(|_| DEFAULT_AUTH_PATH.into()),
            headless: std::env::var("HEADLESS").map(|v| v != "false").unwrap_or(true),
            auth_type: std::env::var("AUTH_TYPE").ok().filter(|v| !v.is_empty()),
        })
    }

    /// Whether the pairing flow is forced non-interactively.
    pub fn forced_pairing(&self) -> bool {
        self.auth_type.as_deref() == Some("pairing-code")
    }
}

/// Bot operating mode — controls which senders/chats may invoke
/// non-admin commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BotMode {
    Public,
    #[default]
    Private,
    InboxOnly,
    GroupsOnly,
}

impl BotMode {
    /// All accepted mode names, for validation and usage text.
    pub const VALID: [&'static str; 4] = ["public", "private", "inbox-only", "groups-only"];
}

impl FromStr for BotMode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "inbox-only" => Ok(Self::InboxOnly),
            "groups-only" => Ok(Self::GroupsOnly),
            other => Err(GatewayError::Validation(format!(
                "invalid mode '{other}', valid modes: {}",
                Self::VALID.join(", ")
            ))),
        }
    }
}

impl fmt::Display for BotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::InboxOnly => "inbox-only",
            Self::GroupsOnly => "groups-only",
        };
        f.write_str(name)
    }
}

/// Owner-mutable runtime policy state.
///
/// Read by command parsing and the permission policy on every message;
/// written only by the owner `prefix` and `mode` commands. Not persisted
/// across restarts.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub prefix: String,
    pub mode: BotMode,
    pub allowed_groups: HashSet<String>,
    pub blocked_users: HashSet<String>,
    pub allowed_numbers: HashSet<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            mode: BotMode::default(),
            allowed_groups: HashSet::new(),
            blocked_users: HashSet::new(),
            allowed_numbers: HashSet::new(),
        }
    }
}

impl RuntimeConfig {
    /// Build the initial runtime state from the environment list variables
    /// (`ALLOWED_GROUPS`, `BLOCKED_USERS`, `ALLOWED_NUMBERS`).
    pub fn from_env() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            mode: BotMode::default(),
            allowed_groups: split_env_list("ALLOWED_GROUPS"),
            blocked_users: split_env_list("BLOCKED_USERS"),
            allowed_numbers: split_env_list("ALLOWED_NUMBERS"),
        }
    }
}

/// Parse a comma-separated env var into a set, dropping empty entries.
fn split_env_list(key: &str) -> HashSet<String> {
    std::env::var(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Validate a phone number as 10-15 bare digits, no `+` or separators.
pub fn is_valid_phone(number: &str) -> bool {
    (10..=15).contains(&number.len()) && number.bytes().all(|b| b.is_ascii_digit())
}

/// Build the direct-chat identifier for a bare phone number.
pub fn direct_chat_id(number: &str) -> String {
    format!("{number}@c.us")
}

/// Whether a chat identifier denotes a group chat (suffix convention).
pub fn is_group_chat(chat_id: &str) -> bool {
    chat_id.ends_with("@g.us")
}

/// Strip the server suffix from a chat/user identifier, leaving the
/// bare number.
pub fn bare_number(id: &str) -> &str {
    id.split('@').next().unwrap_or(id)
}
