//! Listener registry and broadcast.
//!
//! Lives inside the store's lock: registration, broadcast and reclamation all
//! run with the write lock held by the caller.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{select, Sender};
use tracing::debug;

use crate::provider::cancel::CancelSignal;

#[derive(Debug)]
struct Listener<A> {
    tx: Sender<Arc<A>>,
    done: CancelSignal,
}

#[derive(Debug)]
pub(super) struct Listeners<A> {
    by_id: HashMap<u64, Listener<A>>,
    next: u64,
}

impl<A> Default for Listeners<A> {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            next: 0,
        }
    }
}

impl<A> Listeners<A> {
    /// Registers a listener and returns its id. Ids are never reused.
    pub(super) fn register(&mut self, tx: Sender<Arc<A>>, done: CancelSignal) -> u64 {
        let id = self.next;
        self.next += 1;
        self.by_id.insert(id, Listener { tx, done });
        id
    }

    /// Delivers `alert` to every listener.
    ///
    /// Blocks on a full queue until the consumer drains it or cancels. The
    /// caller holds the store's write lock, so a stalled consumer stalls all
    /// writers.
    pub(super) fn broadcast(&self, alert: &Arc<A>) {
        for listener in self.by_id.values() {
            select! {
                send(listener.tx, Arc::clone(alert)) -> _ => {}
                recv(listener.done.receiver()) -> _ => {}
            }
        }
    }

    /// Drops every cancelled listener, closing its queue. Returns how many
    /// were removed.
    pub(super) fn reap(&mut self) -> usize {
        let before = self.by_id.len();
        self.by_id.retain(|id, listener| {
            if listener.done.is_cancelled() {
                debug!(listener = *id, "listener reclaimed");
                false
            } else {
                true
            }
        });
        before - self.by_id.len()
    }

    pub(super) fn len(&self) -> usize {
        self.by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use crossbeam_channel::{bounded, TryRecvError};

    use super::*;
    use crate::provider::cancel::cancel_pair;

    #[test]
    fn test_ids_are_monotonic() {
        let mut listeners = Listeners::<u32>::default();
        let (_h1, s1) = cancel_pair();
        let (_h2, s2) = cancel_pair();
        let (tx, _rx) = bounded(1);

        let a = listeners.register(tx.clone(), s1);
        let b = listeners.register(tx, s2);
        assert_eq!((a, b), (0, 1));
    }

    #[test]
    fn test_broadcast_reaches_every_listener() {
        let mut listeners = Listeners::<u32>::default();
        let (_h1, s1) = cancel_pair();
        let (_h2, s2) = cancel_pair();
        let (tx1, rx1) = bounded(2);
        let (tx2, rx2) = bounded(2);
        listeners.register(tx1, s1);
        listeners.register(tx2, s2);

        listeners.broadcast(&Arc::new(3));
        assert_eq!(*rx1.try_recv().unwrap(), 3);
        assert_eq!(*rx2.try_recv().unwrap(), 3);
    }

    #[test]
    fn test_broadcast_skips_cancelled_full_listener() {
        let mut listeners = Listeners::<u32>::default();
        let (mut handle, signal) = cancel_pair();
        let (tx, _rx) = bounded(1);
        listeners.register(tx, signal);

        listeners.broadcast(&Arc::new(1));
        handle.cancel();
        // Queue is full; this must not block once cancelled.
        listeners.broadcast(&Arc::new(2));
    }

    #[test]
    fn test_broadcast_waits_for_slow_consumer() {
        let mut listeners = Listeners::<u32>::default();
        let (_handle, signal) = cancel_pair();
        let (tx, rx) = bounded(1);
        listeners.register(tx, signal);
        listeners.broadcast(&Arc::new(1));

        let consumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let first = *rx.recv().unwrap();
            let second = *rx.recv().unwrap();
            (first, second)
        });

        listeners.broadcast(&Arc::new(2));
        assert_eq!(consumer.join().unwrap(), (1, 2));
    }

    #[test]
    fn test_reap_closes_only_cancelled() {
        let mut listeners = Listeners::<u32>::default();
        let (mut h1, s1) = cancel_pair();
        let (_h2, s2) = cancel_pair();
        let (tx1, rx1) = bounded(1);
        let (tx2, rx2) = bounded(1);
        listeners.register(tx1, s1);
        listeners.register(tx2, s2);

        h1.cancel();
        assert_eq!(listeners.reap(), 1);
        assert_eq!(listeners.len(), 1);
        assert!(matches!(rx1.try_recv(), Err(TryRecvError::Disconnected)));
        assert!(matches!(rx2.try_recv(), Err(TryRecvError::Empty)));
    }
}
