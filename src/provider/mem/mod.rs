//! In-memory alert provider.
//!
//! A single `RwLock` guards both the alert map and the listener registry.
//! Writes merge against the stored alert when their activity intervals
//! overlap, then fan the stored alert out to every live listener while still
//! holding the lock. A background thread drops expired alerts and reclaims
//! cancelled listeners every GC interval.
//!
//! Subscribers get the snapshot taken *before* they are registered; an alert
//! written between the snapshot and the registration reaches neither.

mod gc;
mod listeners;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, select, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::alert::{Fingerprint, Mergeable};
use crate::error::{AlertError, AlertResult, ExecutionError, ValidationError};
use crate::marker::Marker;

use super::cancel::cancel_pair;
use super::iterator::AlertIterator;
use super::traits::AlertProvider;

use listeners::Listeners;

/// Default capacity of listener and pending queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 200;

/// Default period between GC sweeps.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemAlertsConfig {
    /// Period between GC sweeps. Must be non-zero.
    pub gc_interval: Duration,
    /// Minimum queue capacity per subscriber; grows to fit the snapshot.
    pub listener_capacity: usize,
    /// Queue capacity for `get_pending` iterators.
    pub pending_capacity: usize,
}

impl Default for MemAlertsConfig {
    fn default() -> Self {
        Self {
            gc_interval: DEFAULT_GC_INTERVAL,
            listener_capacity: DEFAULT_QUEUE_CAPACITY,
            pending_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug)]
struct State<A> {
    alerts: HashMap<Fingerprint, Arc<A>>,
    listeners: Listeners<A>,
}

struct Shared<A, M> {
    state: RwLock<State<A>>,
    marker: M,
}

impl<A: Mergeable, M> Shared<A, M> {
    fn snapshot(&self) -> AlertResult<Vec<Arc<A>>> {
        let state = self.state.read().map_err(|_| AlertError::poisoned("alerts.snapshot"))?;
        Ok(state.alerts.values().cloned().collect())
    }
}

/// Merge only if the incoming alert ends or starts strictly inside the
/// stored alert's interval. An incoming interval that fully contains the
/// stored one does not merge.
fn overlaps<A: Mergeable>(old: &A, new: &A) -> bool {
    let (start, end) = (old.starts_at(), old.ends_at());
    let inside = |t: DateTime<Utc>| start < t && t < end;
    inside(new.ends_at()) || inside(new.starts_at())
}

/// Thread-safe in-memory alert store with live subscriptions.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use alertmem::{Alert, AlertProvider, LabelSet, MemAlerts, MemMarker, Mergeable};
/// use chrono::Utc;
///
/// let alerts: MemAlerts<Alert, _> =
///     MemAlerts::new(Arc::new(MemMarker::new()), Duration::from_secs(60)).unwrap();
/// let now = Utc::now();
/// let alert = Alert::new(
///     LabelSet::new().with("alertname", "DiskFull"),
///     now,
///     now + chrono::Duration::hours(1),
/// );
/// let fp = alert.fingerprint();
/// alerts.put(vec![alert]).unwrap();
/// assert!(alerts.get(fp).is_ok());
/// alerts.close().unwrap();
/// ```
pub struct MemAlerts<A, M> {
    shared: Arc<Shared<A, M>>,
    cfg: MemAlertsConfig,
    stop: Mutex<Option<Sender<()>>>,
    gc: JoinHandle<()>,
}

impl<A, M> MemAlerts<A, M>
where
    A: Mergeable + 'static,
    M: Marker + 'static,
{
    /// Creates a store with the default queue capacities and starts its GC.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a zero `gc_interval` and an execution
    /// error if the GC thread cannot be spawned.
    pub fn new(marker: M, gc_interval: Duration) -> AlertResult<Self> {
        Self::with_config(
            marker,
            MemAlertsConfig {
                gc_interval,
                ..MemAlertsConfig::default()
            },
        )
    }

    /// Creates a store from a full configuration and starts its GC.
    ///
    /// # Errors
    ///
    /// Same as [`MemAlerts::new`].
    pub fn with_config(marker: M, cfg: MemAlertsConfig) -> AlertResult<Self> {
        if cfg.gc_interval.is_zero() {
            return Err(ValidationError::InvalidGcInterval {
                interval: cfg.gc_interval,
            }
            .into());
        }

        let cfg = MemAlertsConfig {
            listener_capacity: cfg.listener_capacity.max(1),
            pending_capacity: cfg.pending_capacity.max(1),
            ..cfg
        };

        let shared = Arc::new(Shared {
            state: RwLock::new(State {
                alerts: HashMap::new(),
                listeners: Listeners::default(),
            }),
            marker,
        });

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let gc_shared = Arc::clone(&shared);
        let interval = cfg.gc_interval;
        let gc = thread::Builder::new()
            .name("alertmem-gc".to_string())
            .spawn(move || gc::run(&gc_shared, interval, &stop_rx))
            .map_err(|e| ExecutionError::Spawn { message: e.to_string() })?;

        debug!(gc_interval = ?cfg.gc_interval, "alert store started");

        Ok(Self {
            shared,
            cfg,
            stop: Mutex::new(Some(stop_tx)),
            gc,
        })
    }

    /// Stops the GC loop.
    ///
    /// # Errors
    ///
    /// Returns an execution error if the internal lock is poisoned.
    ///
    /// # Panics
    ///
    /// Panics if the store was already closed. Closing twice is a contract
    /// violation.
    pub fn close(&self) -> AlertResult<()> {
        let mut stop = self.stop.lock().map_err(|_| AlertError::poisoned("alerts.close"))?;
        assert!(stop.take().is_some(), "alert store closed twice");
        debug!("alert store closed");
        Ok(())
    }

    /// Returns true once [`MemAlerts::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.stop.lock().map_or(true, |stop| stop.is_none())
    }

    /// Returns true while the GC thread is alive.
    #[must_use]
    pub fn gc_running(&self) -> bool {
        !self.gc.is_finished()
    }

    /// Number of stored alerts.
    ///
    /// # Errors
    ///
    /// Returns an execution error if the lock is poisoned.
    pub fn len(&self) -> AlertResult<usize> {
        let state = self.shared.state.read().map_err(|_| AlertError::poisoned("alerts.len"))?;
        Ok(state.alerts.len())
    }

    /// Returns true if no alert is stored.
    ///
    /// # Errors
    ///
    /// Returns an execution error if the lock is poisoned.
    pub fn is_empty(&self) -> AlertResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of registered listeners, including cancelled ones the GC has
    /// not reclaimed yet.
    ///
    /// # Errors
    ///
    /// Returns an execution error if the lock is poisoned.
    pub fn listener_count(&self) -> AlertResult<usize> {
        let state = self.shared.state.read().map_err(|_| AlertError::poisoned("alerts.listeners"))?;
        Ok(state.listeners.len())
    }

    /// Runs one GC sweep immediately.
    #[cfg(test)]
    fn sweep_now(&self) -> AlertResult<gc::Sweep> {
        gc::sweep(&self.shared)
    }
}

impl<A, M> AlertProvider<A> for MemAlerts<A, M>
where
    A: Mergeable + 'static,
    M: Marker + 'static,
{
    fn subscribe(&self) -> AlertIterator<A> {
        if self.is_closed() {
            error!("subscribe on a closed alert store");
            return AlertIterator::failed(ExecutionError::Closed.into());
        }

        let alerts = match self.shared.snapshot() {
            Ok(alerts) => alerts,
            Err(err) => return AlertIterator::failed(err),
        };

        let (cancel, done) = cancel_pair();
        let preloaded = alerts.len();
        let (tx, rx) = bounded(preloaded.max(self.cfg.listener_capacity));
        for alert in alerts {
            // Capacity covers the whole snapshot.
            let _ = tx.try_send(alert);
        }

        let id = match self.shared.state.write() {
            Ok(mut state) => state.listeners.register(tx, done),
            Err(_) => {
                // Dropping `tx` closes the queue after the snapshot.
                return AlertIterator::new(rx, cancel, Some(AlertError::poisoned("alerts.subscribe")));
            }
        };
        debug!(listener = id, preloaded, "listener registered");

        AlertIterator::new(rx, cancel, None)
    }

    fn get_pending(&self) -> AlertIterator<A> {
        let alerts = match self.shared.snapshot() {
            Ok(alerts) => alerts,
            Err(err) => return AlertIterator::failed(err),
        };

        let (cancel, done) = cancel_pair();
        let (tx, rx) = bounded(self.cfg.pending_capacity);

        let spawned = thread::Builder::new()
            .name("alertmem-pending".to_string())
            .spawn(move || {
                for alert in alerts {
                    select! {
                        send(tx, alert) -> res => {
                            if res.is_err() {
                                return;
                            }
                        }
                        recv(done.receiver()) -> _ => return,
                    }
                }
            });

        match spawned {
            Ok(_) => AlertIterator::new(rx, cancel, None),
            Err(e) => AlertIterator::failed(ExecutionError::Spawn { message: e.to_string() }.into()),
        }
    }

    fn get(&self, fingerprint: Fingerprint) -> AlertResult<Arc<A>> {
        let state = self.shared.state.read().map_err(|_| AlertError::poisoned("alerts.get"))?;
        state
            .alerts
            .get(&fingerprint)
            .cloned()
            .ok_or(AlertError::not_found(fingerprint))
    }

    fn put(&self, alerts: Vec<A>) -> AlertResult<()> {
        let mut guard = self.shared.state.write().map_err(|_| AlertError::poisoned("alerts.put"))?;
        let state = &mut *guard;

        for alert in alerts {
            let fp = alert.fingerprint();

            let alert = match state.alerts.get(&fp) {
                Some(old) if overlaps(&**old, &alert) => Arc::new(old.merge(&alert)),
                _ => Arc::new(alert),
            };

            state.alerts.insert(fp, Arc::clone(&alert));
            state.listeners.broadcast(&alert);
        }

        Ok(())
    }
}

impl<A, M> Drop for MemAlerts<A, M> {
    fn drop(&mut self) {
        // Stops the GC if close() was never called.
        if let Ok(mut stop) = self.stop.lock() {
            stop.take();
        }
    }
}
