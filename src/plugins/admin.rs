//! Owner commands that mutate runtime policy state.

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use wagate_core::config::BotMode;
use wagate_core::context::InvocationContext;
use wagate_core::error::GatewayError;
use wagate_core::registry::{CommandHandler, CommandRegistry, CommandSpec};

pub fn register(registry: &mut CommandRegistry) {
    registry.register(
        CommandSpec {
            pattern: "prefix".into(),
            aliases: Vec::new(),
            owner_only: true,
            description: "Show or change the command prefix".into(),
            usage: "prefix [new-prefix]".into(),
        },
        Arc::new(PrefixCommand),
    );
    registry.register(
        CommandSpec {
            pattern: "mode".into(),
            aliases: Vec::new(),
            owner_only: true,
            description: "Show or change the bot mode".into(),
            usage: format!("mode [{}]", BotMode::VALID.join("|")),
        },
        Arc::new(ModeCommand),
    );
}

struct PrefixCommand;

#[async_trait]
impl CommandHandler for PrefixCommand {
    async fn execute(&self, ctx: &mut InvocationContext) -> Result<(), GatewayError> {
        let Some(new_prefix) = ctx.args.first() else {
            let current = ctx.runtime.read().await.prefix.clone();
            return ctx.reply(&format!("Current prefix: {current}")).await;
        };

        ctx.runtime.write().await.prefix = new_prefix.clone();
        info!("command prefix changed to '{new_prefix}'");
        ctx.reply(&format!("✅ Prefix updated to: {new_prefix}")).await
    }
}

struct ModeCommand;

#[async_trait]
impl CommandHandler for ModeCommand {
    async fn execute(&self, ctx: &mut InvocationContext) -> Result<(), GatewayError> {
        let requested = ctx.args.first().map(|a| BotMode::from_str(a));

        match requested {
            Some(Ok(mode)) => {
                ctx.runtime.write().await.mode = mode;
                info!("bot mode changed to {mode}");
                ctx.reply(&format!("✅ Bot mode set to: {mode}")).await
            }
            // No argument and bad argument both show the current state.
            _ => {
                let current = ctx.runtime.read().await.mode;
                ctx.reply(&format!(
                    "Current mode: {current}\nValid modes: {}",
                    BotMode::VALID.join(", ")
                ))
                .await
            }
        }
    }
}
