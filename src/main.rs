mod api;
mod dispatcher;
mod plugins;
mod state;
mod terminal;
#[cfg(test)]
mod testutil;

use clap::{Parser, Subcommand};
use state::AppState;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use wagate_core::config::{Config, RuntimeConfig};
use wagate_core::registry::CommandRegistry;
use wagate_core::traits::ClientFactory;
use wagate_session::SessionManager;

#[derive(Parser)]
#[command(name = "wagate", version, about = "WhatsApp chat-bot gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway.
    Start,
    /// Print the effective configuration.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Start => start().await,
        Commands::Status => status(),
    }
}

async fn start() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let runtime = Arc::new(RwLock::new(RuntimeConfig::from_env()));

    let mut registry = CommandRegistry::new();
    plugins::load_all(&mut registry);
    let registry = Arc::new(registry);

    let factory = build_factory(&config)?;
    let (msg_tx, msg_rx) = mpsc::channel(64);
    let sessions = Arc::new(SessionManager::new(
        factory,
        config.owner_number.clone(),
        runtime.clone(),
        msg_tx,
    ));

    let state = AppState {
        config: Arc::new(config),
        runtime,
        registry,
        sessions: sessions.clone(),
    };

    // The dispatcher consumes the primary session's message stream; the
    // registry is frozen before it attaches.
    tokio::spawn(dispatcher::run(state.clone(), msg_rx));
    tokio::spawn(api::serve(state.clone()));

    // Credentials from a previous run resume without re-linking; a
    // failed resume falls back to the interactive flow.
    if wagate_session::has_persisted_credentials(&state.config.auth_path) {
        info!("persisted credentials found, resuming primary session");
        if let Err(e) = sessions.resume_primary().await {
            warn!("primary session resume failed: {e}");
            terminal::run_auth_flow(&state).await?;
        }
    } else {
        terminal::run_auth_flow(&state).await?;
    }

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    sessions.shutdown().await;

    Ok(())
}

fn status() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let runtime = RuntimeConfig::from_env();

    println!("wagate configuration");
    println!("  port:            {}", config.port);
    println!("  bot number:      {}", config.bot_number);
    println!("  owner number:    {}", config.owner_number);
    println!("  auth path:       {}", config.auth_path);
    println!("  auth type:       {}", config.auth_type.as_deref().unwrap_or("interactive"));
    println!("  prefix:          {}", runtime.prefix);
    println!("  mode:            {}", runtime.mode);
    println!("  allowed numbers: {}", runtime.allowed_numbers.len());
    println!("  blocked users:   {}", runtime.blocked_users.len());
    println!("  allowed groups:  {}", runtime.allowed_groups.len());
    println!(
        "  live client:     {}",
        if cfg!(feature = "whatsapp-live") { "enabled" } else { "disabled" }
    );

    Ok(())
}

#[cfg(feature = "whatsapp-live")]
fn build_factory(config: &Config) -> anyhow::Result<Arc<dyn ClientFactory>> {
    Ok(Arc::new(wagate_session::whatsapp::WhatsAppFactory::new(
        &config.auth_path,
    )))
}

#[cfg(not(feature = "whatsapp-live"))]
fn build_factory(_config: &Config) -> anyhow::Result<Arc<dyn ClientFactory>> {
    anyhow::bail!(
        "this build has no WhatsApp client; rebuild with --features whatsapp-live to start the gateway"
    )
}
