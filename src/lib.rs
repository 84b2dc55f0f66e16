//! # alertmem - in-memory alert provider
//!
//! A concurrency-safe registry of currently active alerts that doubles as a
//! live broadcast source. Consumers read the current set of alerts and keep
//! receiving every alert written afterwards without polling.
//!
//! ## Core Concepts
//!
//! - **Fingerprint**: stable identity of an alert, derived from its labels
//! - **Mergeable**: what the store needs from an alert (identity, activity
//!   interval, merge)
//! - **Marker**: sink told when an alert is forgotten
//! - **MemAlerts**: the store, its merge-on-write policy, GC and listeners
//! - **AlertIterator**: pull interface over a subscription queue
//!
//! ## Usage
//!
//! ```rust,ignore
//! use alertmem::{Alert, AlertProvider, LabelSet, MemAlerts, MemMarker};
//!
//! let alerts: MemAlerts<Alert, _> = MemAlerts::new(Arc::new(MemMarker::new()), gc_interval)?;
//! let mut feed = alerts.subscribe();
//! alerts.put(vec![alert])?;
//! while let Some(alert) = feed.next() {
//!     dispatch(&alert);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alert;
pub mod error;
pub mod marker;
pub mod provider;

// Re-export primary types at crate root for convenience
pub use alert::{Alert, Fingerprint, LabelSet, Mergeable};
pub use error::{AlertError, AlertResult, ExecutionError, ValidationError};
pub use marker::{AlertState, AlertStatus, Marker, MarkerError, MemMarker};
pub use provider::{
    cancel_pair, AlertIterator, AlertProvider, CancelHandle, CancelSignal, MemAlerts,
    MemAlertsConfig,
};
