//! Error types for the pandora bridge.

/// Top-level error type for the wearable/phone bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Message stream could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BridgeError>;
