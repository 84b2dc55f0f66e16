//! Per-alert status bookkeeping.
//!
//! The store only needs [`Marker::delete`], called once for every alert the
//! garbage collector forgets. [`MemMarker`] is a thread-safe in-memory
//! implementation that also tracks whether an alert is active or suppressed.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alert::Fingerprint;

/// Errors reported by a marker sink.
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("poisoned lock: {context}")]
    LockPoisoned {
        context: &'static str,
    },

    #[error("marker backend error: {0}")]
    Backend(String),
}

/// Sink notified when an alert is permanently forgotten.
pub trait Marker: Send + Sync {
    /// Drops all state held for `fingerprint`.
    fn delete(&self, fingerprint: Fingerprint) -> Result<(), MarkerError>;
}

impl<M: Marker + ?Sized> Marker for Arc<M> {
    fn delete(&self, fingerprint: Fingerprint) -> Result<(), MarkerError> {
        (**self).delete(fingerprint)
    }
}

/// Processing state of an alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    #[default]
    Unprocessed,
    Active,
    Suppressed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStatus {
    pub state: AlertState,
    pub silenced_by: Vec<String>,
    pub inhibited_by: Vec<String>,
}

/// Thread-safe in-memory marker.
#[derive(Debug, Default)]
pub struct MemMarker {
    statuses: RwLock<HashMap<Fingerprint, AlertStatus>>,
}

impl MemMarker {
    /// Create a new empty marker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the alert active, clearing silences and inhibitions.
    pub fn set_active(&self, fingerprint: Fingerprint) -> Result<(), MarkerError> {
        let mut statuses = self
            .statuses
            .write()
            .map_err(|_| MarkerError::LockPoisoned { context: "marker.set_active" })?;
        let status = statuses.entry(fingerprint).or_default();
        status.state = AlertState::Active;
        status.silenced_by.clear();
        status.inhibited_by.clear();
        Ok(())
    }

    /// Records the silences muting the alert. An empty list with no
    /// inhibitions makes the alert active again.
    pub fn set_silenced(&self, fingerprint: Fingerprint, ids: Vec<String>) -> Result<(), MarkerError> {
        let mut statuses = self
            .statuses
            .write()
            .map_err(|_| MarkerError::LockPoisoned { context: "marker.set_silenced" })?;
        let status = statuses.entry(fingerprint).or_default();
        status.state = if ids.is_empty() && status.inhibited_by.is_empty() {
            AlertState::Active
        } else {
            AlertState::Suppressed
        };
        status.silenced_by = ids;
        Ok(())
    }

    /// Records the alerts inhibiting this one. An empty list with no
    /// silences makes the alert active again.
    pub fn set_inhibited(&self, fingerprint: Fingerprint, ids: Vec<String>) -> Result<(), MarkerError> {
        let mut statuses = self
            .statuses
            .write()
            .map_err(|_| MarkerError::LockPoisoned { context: "marker.set_inhibited" })?;
        let status = statuses.entry(fingerprint).or_default();
        status.state = if ids.is_empty() && status.silenced_by.is_empty() {
            AlertState::Active
        } else {
            AlertState::Suppressed
        };
        status.inhibited_by = ids;
        Ok(())
    }

    /// Status of the alert; unknown alerts are unprocessed.
    pub fn status(&self, fingerprint: Fingerprint) -> Result<AlertStatus, MarkerError> {
        let statuses = self
            .statuses
            .read()
            .map_err(|_| MarkerError::LockPoisoned { context: "marker.status" })?;
        Ok(statuses.get(&fingerprint).cloned().unwrap_or_default())
    }

    /// Number of tracked alerts in the given state.
    pub fn count(&self, state: AlertState) -> Result<usize, MarkerError> {
        let statuses = self
            .statuses
            .read()
            .map_err(|_| MarkerError::LockPoisoned { context: "marker.count" })?;
        Ok(statuses.values().filter(|s| s.state == state).count())
    }
}

impl Marker for MemMarker {
    fn delete(&self, fingerprint: Fingerprint) -> Result<(), MarkerError> {
        let mut statuses = self
            .statuses
            .write()
            .map_err(|_| MarkerError::LockPoisoned { context: "marker.delete" })?;
        statuses.remove(&fingerprint);
        Ok(())
    }
}
