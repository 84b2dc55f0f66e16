//! Provider contract consumed by the dispatch layer.

use std::sync::Arc;

use crate::alert::{Fingerprint, Mergeable};
use crate::error::AlertResult;

use super::iterator::AlertIterator;

/// Access to a set of alerts. All methods are safe to call concurrently.
pub trait AlertProvider<A: Mergeable>: Send + Sync {
    /// Current alerts followed by every alert written afterwards, until the
    /// iterator is closed. Alerts are not guaranteed to be in chronological
    /// order.
    fn subscribe(&self) -> AlertIterator<A>;

    /// One-shot iterator over the alerts stored right now.
    fn get_pending(&self) -> AlertIterator<A>;

    /// Alert stored under `fingerprint`.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::NotFound` if there is none.
    fn get(&self, fingerprint: Fingerprint) -> AlertResult<Arc<A>>;

    /// Stores the alerts in order, merging each with an overlapping stored
    /// alert of the same fingerprint.
    fn put(&self, alerts: Vec<A>) -> AlertResult<()>;
}
