//! Built-in command plugins.
//!
//! Each module registers its commands into the shared registry at
//! startup; the registry is frozen before the dispatcher attaches.

mod admin;
mod menu;
mod ping;

use tracing::info;
use wagate_core::registry::CommandRegistry;

/// Load every built-in plugin into `registry`.
pub fn load_all(registry: &mut CommandRegistry) {
    admin::register(registry);
    ping::register(registry);
    menu::register(registry);

    info!("plugins loaded: {}", registry.count());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_registered() {
        let mut registry = CommandRegistry::new();
        load_all(&mut registry);

        for word in ["prefix", "mode", "ping", "menu", "help"] {
            assert!(registry.lookup(word).is_some(), "missing command {word}");
        }
        assert_eq!(registry.count(), 4);
    }
}
