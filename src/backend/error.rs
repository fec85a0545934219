//! Error types for the alarm backend client.
//!
//! Each variant carries a stable code (SCREAMING_SNAKE_CASE) that is included
//! in the Display output and accessible via [`BackendError::code()`].

/// Stable error codes for backend failures.
pub mod error_codes {
    /// The backend rejected the stored credentials (HTTP 401).
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";

    /// The backend could not be reached (connect error, timeout).
    pub const NETWORK: &str = "NETWORK";

    /// The backend answered with a non-success status.
    pub const HTTP_STATUS: &str = "HTTP_STATUS";

    /// The response body did not match the expected shape.
    pub const DECODE: &str = "DECODE";

    /// The client could not be constructed from the stored settings.
    pub const CONFIG: &str = "CONFIG";
}

/// Errors produced by backend calls.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// Stored credentials were rejected. They have already been cleared.
    #[error("[{}] credentials rejected by backend", error_codes::UNAUTHORIZED)]
    Unauthorized,

    /// Transport-level failure.
    #[error("[{}] {}", error_codes::NETWORK, .0)]
    Network(String),

    /// Non-success HTTP status other than 401.
    #[error("[{}] HTTP {status}: {message}", error_codes::HTTP_STATUS)]
    Http {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },

    /// Unexpected response payload.
    #[error("[{}] {}", error_codes::DECODE, .0)]
    Decode(String),

    /// Invalid base URL or client settings.
    #[error("[{}] {}", error_codes::CONFIG, .0)]
    Config(String),
}

impl BackendError {
    /// Returns the stable error code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => error_codes::UNAUTHORIZED,
            Self::Network(_) => error_codes::NETWORK,
            Self::Http { .. } => error_codes::HTTP_STATUS,
            Self::Decode(_) => error_codes::DECODE,
            Self::Config(_) => error_codes::CONFIG,
        }
    }

    /// Whether this failure means the session must be rebuilt.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::Config(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
