//! One-shot cancellation signal.
//!
//! The consumer owns a [`CancelHandle`]; the store keeps the matching
//! [`CancelSignal`]. Cancelling (or dropping) the handle disconnects the
//! underlying channel, which makes the signal observable both by polling and
//! from a crossbeam `select!`.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// Creates a connected handle/signal pair.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = bounded::<()>(0);
    (CancelHandle { tx: Some(tx) }, CancelSignal { rx })
}

/// Consumer side. Fires the signal on [`CancelHandle::cancel`] or on drop.
#[derive(Debug)]
pub struct CancelHandle {
    // Never sent on; dropping it is the signal.
    tx: Option<Sender<()>>,
}

impl CancelHandle {
    /// Fires the signal. Idempotent.
    pub fn cancel(&mut self) {
        self.tx.take();
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.tx.is_none()
    }
}

/// Observer side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Receiver<()>,
}

impl CancelSignal {
    /// Returns true once the handle was cancelled or dropped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Receiver that becomes ready (disconnected) on cancellation, for use in
    /// `select!`.
    #[must_use]
    pub const fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::select;

    use super::*;

    #[test]
    fn test_signal_fires_on_cancel() {
        let (mut handle, signal) = cancel_pair();
        assert!(!signal.is_cancelled());
        handle.cancel();
        assert!(handle.is_cancelled());
        assert!(signal.is_cancelled());

        // A second cancel is harmless.
        handle.cancel();
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_signal_fires_on_drop() {
        let (handle, signal) = cancel_pair();
        let observer = signal.clone();
        drop(handle);
        assert!(signal.is_cancelled());
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_signal_wakes_select() {
        let (mut handle, signal) = cancel_pair();
        handle.cancel();
        let woke = select! {
            recv(signal.receiver()) -> _ => true,
            default(Duration::from_secs(1)) => false,
        };
        assert!(woke);
    }
}
