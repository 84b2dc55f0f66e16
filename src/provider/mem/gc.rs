//! Periodic garbage collection of expired alerts and cancelled listeners.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{after, select, Receiver};
use tracing::{debug, error, trace, warn};

use crate::alert::Mergeable;
use crate::error::{AlertError, AlertResult};
use crate::marker::Marker;

use super::Shared;

/// Outcome of a single sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct Sweep {
    pub(super) expired: usize,
    pub(super) reaped: usize,
}

/// Runs sweeps every `interval` until `stop` is signalled or disconnected.
/// There is no final sweep on shutdown.
pub(super) fn run<A: Mergeable, M: Marker>(shared: &Shared<A, M>, interval: Duration, stop: &Receiver<()>) {
    loop {
        select! {
            recv(stop) -> _ => {
                debug!("alert gc stopped");
                return;
            }
            recv(after(interval)) -> _ => {}
        }

        if let Err(err) = sweep(shared) {
            error!(%err, "alert gc aborted");
            return;
        }
    }
}

/// Removes alerts whose end lies strictly in the past, notifying the marker
/// for each, then reclaims cancelled listeners.
///
/// Marker failures are logged and skipped.
pub(super) fn sweep<A: Mergeable, M: Marker>(shared: &Shared<A, M>) -> AlertResult<Sweep> {
    let mut guard = shared.state.write().map_err(|_| AlertError::poisoned("alerts.gc"))?;
    let state = &mut *guard;
    let now = Utc::now();
    let marker = &shared.marker;

    let before = state.alerts.len();
    state.alerts.retain(|fp, alert: &mut Arc<A>| {
        if alert.ends_at() >= now {
            return true;
        }
        if let Err(err) = marker.delete(*fp) {
            warn!(fingerprint = %fp, %err, "marker delete failed");
        }
        false
    });
    let expired = before - state.alerts.len();
    let reaped = state.listeners.reap();

    trace!(expired, reaped, remaining = state.alerts.len(), "alert gc sweep");
    Ok(Sweep { expired, reaped })
}
