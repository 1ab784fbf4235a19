use thiserror::Error;

/// Top-level error type for the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed caller input (bad phone number, missing content).
    /// Surfaced as HTTP 400, never logged as exceptional.
    #[error("validation error: {0}")]
    Validation(String),

    /// The remote service rejected the credential, or the session
    /// dropped before reaching ready.
    #[error("authentication error: {0}")]
    Auth(String),

    /// A bounded wait (pairing flow) expired.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Error from the underlying chat client.
    #[error("client error: {0}")]
    Client(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// A command handler failed. Recovered by the dispatcher.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
