//! Failure taxonomy shared by the gateway, the stores, and the session.
//!
//! Every variant maps to one user-facing message. `UpstreamUnavailable` is
//! the only retry-eligible class and gets its own wording so the client can
//! tell "try again shortly" apart from a hard failure.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Missing or invalid parameters: {0}")]
    MissingParameters(String),

    #[error("The AI service is overloaded or temporarily unavailable. Please try again shortly. ({0})")]
    UpstreamUnavailable(String),

    #[error("AI backend error: {0}")]
    UpstreamError(String),

    #[error("AI response failed schema validation: {0}")]
    SchemaViolation(String),

    #[error("The store rejected the operation: permission denied.")]
    PermissionDenied,

    // Only reachable from store backends with a real transport.
    #[allow(dead_code)]
    #[error("Document store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AppError {
    /// True for transient failures the user may simply retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::UpstreamUnavailable(_))
    }
}
