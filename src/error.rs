//! Error types for alertmem.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions. `NotFound` is an ordinary outcome of a lookup; the
//! remaining variants indicate invalid input, a closed store, or a broken
//! process (poisoned lock, thread spawn failure).

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::alert::Fingerprint;
use crate::marker::MarkerError;

/// Validation errors that occur during input validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("GC interval must be non-zero, got {interval:?}")]
    InvalidGcInterval {
        interval: Duration,
    },

    #[error("Label set cannot be empty")]
    EmptyLabelSet,

    #[error("Invalid label name '{name}'")]
    InvalidLabelName {
        name: String,
    },

    #[error("Label '{name}' has an empty value")]
    EmptyLabelValue {
        name: String,
    },

    #[error("Alert ends ({ends_at}) before it starts ({starts_at})")]
    EndBeforeStart {
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    },
}

/// Execution errors that occur while operating on a store.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Alert not found: {fingerprint}")]
    NotFound {
        fingerprint: Fingerprint,
    },

    #[error("Alert store is closed")]
    Closed,

    #[error("Timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Poisoned lock: {context}")]
    LockPoisoned {
        context: &'static str,
    },

    #[error("Failed to spawn worker thread: {message}")]
    Spawn {
        message: String,
    },
}

/// Top-level error type for alertmem.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Marker error: {0}")]
    Marker(#[from] MarkerError),
}

impl AlertError {
    pub(crate) const fn not_found(fingerprint: Fingerprint) -> Self {
        Self::Execution(ExecutionError::NotFound { fingerprint })
    }

    pub(crate) const fn poisoned(context: &'static str) -> Self {
        Self::Execution(ExecutionError::LockPoisoned { context })
    }

    /// Returns true if this is the "no such alert" sentinel.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::NotFound { .. }))
    }

    /// Returns true if the store was already closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::Closed))
    }

    /// Returns true if a bounded wait expired.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::Timeout { .. }))
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }
}

/// Result type alias for alertmem operations.
pub type AlertResult<T> = Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mentions_fingerprint() {
        let fp = Fingerprint::from_u64(0xabc);
        let err = AlertError::not_found(fp);
        assert!(err.is_not_found());
        assert!(err.is_execution());
        let msg = format!("{err}");
        assert!(msg.contains("0000000000000abc"));
    }

    #[test]
    fn test_validation_gc_interval() {
        let err: AlertError = ValidationError::InvalidGcInterval {
            interval: Duration::ZERO,
        }
        .into();
        assert!(err.is_validation());
        assert!(!err.is_not_found());
        assert!(format!("{err}").contains("non-zero"));
    }

    #[test]
    fn test_poisoned_carries_context() {
        let err = AlertError::poisoned("alerts.put");
        assert!(err.is_execution());
        assert!(format!("{err}").contains("alerts.put"));
    }

    #[test]
    fn test_closed() {
        let err: AlertError = ExecutionError::Closed.into();
        assert!(err.is_closed());
        assert!(!err.is_validation());
    }
}
