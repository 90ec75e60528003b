//! Error types for the Reflexion domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external capability has its own error enum; only some of them are
//! allowed to cross the reflexion loop boundary (see [`Error`]).

use thiserror::Error;

/// The top-level error type for all Reflexion operations.
///
/// The loop surfaces exactly three of these to its caller:
/// [`Error::InvalidInput`], [`Error::Cancelled`], and
/// [`Error::Generation`]. Lookup failures are recovered inside the loop.
#[derive(Debug, Error)]
pub enum Error {
    // --- Request validation ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Generation backend ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Evidence backend ---
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    // --- Session storage ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Cancellation ---
    #[error("Run cancelled before completion")]
    Cancelled,

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Generation(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Capability errors ---

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    /// The model answered, but not in the expected structured shape, and
    /// local repair could not recover it.
    #[error("Malformed structured response from {tool}: {reason}")]
    MalformedResponse { tool: String, reason: String },
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited { .. }
                | GenerationError::Timeout(_)
                | GenerationError::Network(_)
                | GenerationError::MalformedResponse { .. }
        ) || matches!(self, GenerationError::ApiError { status_code, .. } if *status_code >= 500)
    }
}

#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("Search request failed: {reason} (status: {status_code})")]
    ApiError { status_code: u16, reason: String },

    #[error("Search backend not configured: {0}")]
    NotConfigured(String),

    #[error("Search timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl LookupError {
    /// Short human-readable reason, used when annotating placeholders.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
