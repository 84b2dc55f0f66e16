//! Alert providers.
//!
//! [`AlertProvider`] is the contract; [`MemAlerts`] is the in-memory
//! implementation. Readers consume alerts through [`AlertIterator`].

pub mod cancel;
mod iterator;
pub mod mem;
mod traits;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use iterator::AlertIterator;
pub use mem::{MemAlerts, MemAlertsConfig};
pub use traits::AlertProvider;
