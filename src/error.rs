//! # Structured Error Handling
//!
//! Central error taxonomy for the pool orchestrator. Façade-level errors are
//! returned synchronously to the caller; worker-pipeline errors are logged and
//! persisted as a failed status on the owning row rather than raised past the
//! worker boundary.

use thiserror::Error;

/// Errors surfaced by the pool façade and worker pipelines.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Malformed or out-of-range caller input. No state was mutated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A host or task was not in the phase the operation requires.
    /// No partial mutation occurred.
    #[error("Precondition error: {0}")]
    Precondition(String),

    /// An external automation system call failed or returned a
    /// non-success code.
    #[error("Adapter error: {api}: {message}")]
    Adapter { api: String, message: String },

    /// The bounded-retry driver ran out of time before the operation
    /// settled.
    #[error("Retry budget exhausted for {0}")]
    Exhausted(String),

    /// Persistent task store failure.
    #[error("Store error: {0}")]
    Store(String),

    /// An illegal state-machine transition was requested.
    #[error("State transition error: {0}")]
    StateTransition(String),

    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PoolError {
    /// Build an adapter error for the named external API.
    pub fn adapter<S: Into<String>, M: Into<String>>(api: S, message: M) -> Self {
        Self::Adapter {
            api: api.into(),
            message: message.into(),
        }
    }

    /// True for errors the bounded-retry driver may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Adapter { .. })
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
