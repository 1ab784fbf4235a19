//! Session lifecycle management: ephemeral authentication attempts,
//! the long-lived primary session, and QR rendering.
//!
//! The live WhatsApp binding lives behind the `whatsapp-live` feature;
//! everything else operates on the `wagate_core::traits` boundary.

pub mod attempt;
pub mod manager;
pub mod primary;
pub mod qr;

#[cfg(feature = "whatsapp-live")]
pub mod whatsapp;

pub use attempt::{AttemptMethod, AttemptState};
pub use manager::{AttemptNotice, SessionManager};
pub use primary::{has_persisted_credentials, PrimarySession};
