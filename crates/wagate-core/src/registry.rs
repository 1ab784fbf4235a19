//! The command registry — pattern/alias lookup over plugin handlers.
//!
//! Populated once at startup, then frozen behind an `Arc` before the
//! dispatcher attaches to the inbound stream. No registration happens
//! after dispatch begins.

use crate::context::InvocationContext;
use crate::error::GatewayError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Identity and metadata for a registered command.
///
/// `owner_only` is advisory (documentation and usage text); the actual
/// privilege gate is the policy module's admin-command list.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Primary name, matched case-insensitively. Unique across the registry.
    pub pattern: String,
    /// Alternate names resolving to the same command.
    pub aliases: Vec<String>,
    pub owner_only: bool,
    pub description: String,
    pub usage: String,
}

/// A command implementation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, ctx: &mut InvocationContext) -> Result<(), GatewayError>;
}

/// One registered command: spec plus handler.
pub struct CommandEntry {
    pub spec: CommandSpec,
    pub handler: Arc<dyn CommandHandler>,
}

/// Process-wide mapping from command words to entries.
#[derive(Default)]
pub struct CommandRegistry {
    /// Distinct registrations, in registration order.
    commands: Vec<Arc<CommandEntry>>,
    /// Lowercased pattern and alias index.
    index: HashMap<String, Arc<CommandEntry>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. The pattern and every alias are indexed
    /// case-insensitively. Re-registering an existing pattern or alias
    /// overwrites the previous binding: last registration wins.
    pub fn register(&mut self, spec: CommandSpec, handler: Arc<dyn CommandHandler>) {
        let entry = Arc::new(CommandEntry { spec, handler });
        let pattern = entry.spec.pattern.to_lowercase();

        // Drop any previous registration under the same pattern.
        if self.index.contains_key(&pattern) {
            warn!("command '{pattern}' re-registered, previous handler replaced");
            self.commands
                .retain(|c| !c.spec.pattern.eq_ignore_ascii_case(&pattern));
        }

        self.index.insert(pattern, entry.clone());
        for alias in &entry.spec.aliases {
            let key = alias.to_lowercase();
            if let Some(prev) = self.index.insert(key, entry.clone()) {
                if !prev.spec.pattern.eq_ignore_ascii_case(&entry.spec.pattern) {
                    warn!(
                        "alias '{alias}' of '{}' shadows command '{}'",
                        entry.spec.pattern, prev.spec.pattern
                    );
                }
            }
        }
        self.commands.push(entry);
    }

    /// Resolve a command word (pattern or alias, any case).
    pub fn lookup(&self, word: &str) -> Option<&Arc<CommandEntry>> {
        self.index.get(&word.to_lowercase())
    }

    /// Number of distinct registered commands, for diagnostics.
    pub fn count(&self) -> usize {
        self.commands.len()
    }

    /// All registered specs, in registration order.
    pub fn specs(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.iter().map(|c| &c.spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    #[async_trait]
    impl CommandHandler for NoopHandler {
        async fn execute(&self, _ctx: &mut InvocationContext) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn spec(pattern: &str, aliases: &[&str]) -> CommandSpec {
        CommandSpec {
            pattern: pattern.into(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            owner_only: false,
            description: String::new(),
            usage: String::new(),
        }
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let mut reg = CommandRegistry::new();
        reg.register(spec("Ping", &[]), Arc::new(NoopHandler));

        assert!(reg.lookup("ping").is_some());
        assert!(reg.lookup("PING").is_some());
        assert!(reg.lookup("pong").is_none());
    }

    #[test]
    fn test_alias_resolves_to_same_entry() {
        let mut reg = CommandRegistry::new();
        reg.register(spec("menu", &["help", "commands"]), Arc::new(NoopHandler));

        let canonical = reg.lookup("menu").unwrap().spec.pattern.clone();
        for word in ["help", "HELP", "Commands"] {
            assert_eq!(reg.lookup(word).unwrap().spec.pattern, canonical);
        }
    }

    #[test]
    fn test_last_registration_wins() {
        let mut reg = CommandRegistry::new();
        reg.register(spec("ping", &[]), Arc::new(NoopHandler));
        reg.register(
            CommandSpec {
                description: "second".into(),
                ..spec("ping", &[])
            },
            Arc::new(NoopHandler),
        );

        assert_eq!(reg.count(), 1);
        assert_eq!(reg.lookup("ping").unwrap().spec.description, "second");
    }

    #[test]
    fn test_count_distinct_commands() {
        let mut reg = CommandRegistry::new();
        reg.register(spec("ping", &[]), Arc::new(NoopHandler));
        reg.register(spec("menu", &["help"]), Arc::new(NoopHandler));

        // Aliases do not inflate the count.
        assert_eq!(reg.count(), 2);
    }
}
