//! Core types for the wagate gateway: configuration, errors, the command
//! registry, the permission policy, and the chat-client trait boundary.

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod policy;
pub mod registry;
pub mod traits;

pub use error::GatewayError;
