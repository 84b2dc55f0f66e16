//! Pull-style iterator over a push queue.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};

use crate::error::{AlertError, AlertResult, ExecutionError};

use super::cancel::{cancel_pair, CancelHandle};

/// Lazy sequence of alerts backed by a bounded queue.
///
/// Iteration blocks until the next alert arrives and ends once the producer
/// closes the queue or [`AlertIterator::close`] is called. Dropping the
/// iterator cancels it; the producer notices lazily.
#[derive(Debug)]
pub struct AlertIterator<A> {
    rx: Receiver<Arc<A>>,
    cancel: CancelHandle,
    err: Option<AlertError>,
}

impl<A> AlertIterator<A> {
    /// Builds an iterator from a queue, the consumer half of its
    /// cancellation pair, and an optional error raised while setting it up.
    #[must_use]
    pub fn new(rx: Receiver<Arc<A>>, cancel: CancelHandle, err: Option<AlertError>) -> Self {
        Self { rx, cancel, err }
    }

    /// An already exhausted iterator carrying `err`.
    pub(crate) fn failed(err: AlertError) -> Self {
        let (_, rx) = bounded(0);
        let (cancel, _) = cancel_pair();
        Self::new(rx, cancel, Some(err))
    }

    /// Error raised while the iterator was created, if any.
    #[must_use]
    pub const fn err(&self) -> Option<&AlertError> {
        self.err.as_ref()
    }

    /// Stops the iterator and signals the producer. Idempotent.
    pub fn close(&mut self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits at most `timeout` for the next alert.
    ///
    /// Returns `Ok(None)` once the sequence has ended.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Timeout` if nothing arrived in time.
    pub fn next_timeout(&mut self, timeout: Duration) -> AlertResult<Option<Arc<A>>> {
        if self.is_closed() {
            return Ok(None);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(alert) => Ok(Some(alert)),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
            Err(RecvTimeoutError::Timeout) => Err(ExecutionError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            }
            .into()),
        }
    }
}

impl<A> Iterator for AlertIterator<A> {
    type Item = Arc<A>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_closed() {
            return None;
        }
        self.rx.recv().ok()
    }
}
