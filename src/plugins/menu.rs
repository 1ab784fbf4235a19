//! Command listing.

use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use wagate_core::context::InvocationContext;
use wagate_core::error::GatewayError;
use wagate_core::registry::{CommandHandler, CommandRegistry, CommandSpec};

pub fn register(registry: &mut CommandRegistry) {
    registry.register(
        CommandSpec {
            pattern: "menu".into(),
            aliases: vec!["help".into(), "commands".into()],
            owner_only: false,
            description: "List available commands".into(),
            usage: "menu".into(),
        },
        Arc::new(MenuCommand),
    );
}

struct MenuCommand;

#[async_trait]
impl CommandHandler for MenuCommand {
    async fn execute(&self, ctx: &mut InvocationContext) -> Result<(), GatewayError> {
        let mut out = String::from("📋 *Available Commands*\n");
        for spec in ctx.registry.specs() {
            let lock = if spec.owner_only { " 🔐" } else { "" };
            let _ = write!(
                out,
                "\n*{}{}*{lock} — {}\n  Usage: {}{}",
                ctx.prefix, spec.pattern, spec.description, ctx.prefix, spec.usage
            );
        }
        ctx.reply(&out).await
    }
}
