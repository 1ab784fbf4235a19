//! Shared state threaded through the dispatcher and the HTTP API.

use std::sync::Arc;
use tokio::sync::RwLock;
use wagate_core::config::{Config, RuntimeConfig};
use wagate_core::registry::CommandRegistry;
use wagate_session::SessionManager;

/// Everything a handler needs, explicitly passed — no module globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Owner-mutable policy state behind a lock.
    pub runtime: Arc<RwLock<RuntimeConfig>>,
    /// Frozen before the dispatcher starts.
    pub registry: Arc<CommandRegistry>,
    pub sessions: Arc<SessionManager>,
}
