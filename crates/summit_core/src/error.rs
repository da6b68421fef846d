//! # Pipeline Error Taxonomy
//!
//! Every rejection a client can observe. Internal reason codes (WHICH check
//! inside a stage fired) are logged server-side and never serialized into
//! these variants beyond the category.

use thiserror::Error;

/// Errors returned to clients by the action pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    /// Credential invalid or session expired. No state was changed.
    #[error("credential invalid or expired")]
    Auth,

    /// Bad signature, replayed nonce, or out-of-order timestamp.
    /// No state was changed.
    #[error("request failed integrity checks")]
    Integrity,

    /// Admission cap exceeded for the sliding window.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited {
        /// Milliseconds until admission will be retried.
        retry_after_ms: u64,
    },

    /// Unknown action kind or malformed parameters.
    #[error("malformed action request")]
    Validation,

    /// Risk score crossed the rejection threshold. A strike was recorded.
    #[error("action rejected by anomaly evaluation")]
    AnomalyRejected,

    /// Active ban. Every action is rejected until the ban elapses.
    #[error("account suspended until {until_ms}")]
    Suspended {
        /// Ban expiry, milliseconds since the UNIX epoch.
        until_ms: u64,
    },

    /// Durable append unavailable or timed out. Safe to retry: nonce
    /// de-duplication makes retried commits idempotent.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl ActionError {
    /// True when the caller may safely retry the identical request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. })
    }
}

/// Result type for pipeline operations.
pub type ActionResult<T> = Result<T, ActionError>;
