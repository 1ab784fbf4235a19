//! Liveness check command.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use wagate_core::context::InvocationContext;
use wagate_core::error::GatewayError;
use wagate_core::registry::{CommandHandler, CommandRegistry, CommandSpec};

pub fn register(registry: &mut CommandRegistry) {
    registry.register(
        CommandSpec {
            pattern: "ping".into(),
            aliases: Vec::new(),
            owner_only: false,
            description: "Check that the bot is alive".into(),
            usage: "ping".into(),
        },
        Arc::new(PingCommand),
    );
}

struct PingCommand;

#[async_trait]
impl CommandHandler for PingCommand {
    async fn execute(&self, ctx: &mut InvocationContext) -> Result<(), GatewayError> {
        let started = Instant::now();
        ctx.react("🏓").await?;
        let elapsed_ms = started.elapsed().as_millis();
        ctx.reply(&format!("🏓 Pong! {elapsed_ms}ms")).await
    }
}
