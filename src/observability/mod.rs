//! Observability for the record layer
//!
//! Logging goes through `tracing`; the library never installs a
//! subscriber. Each line carries an `event` field naming an [`Event`].
//!
//! # Targets
//!
//! - `aerorecord::declare` model resolution
//! - `aerorecord::cache` identity map activity
//! - `aerorecord::persist` transport-backed lifecycle transitions
//! - `aerorecord::assoc` link resolution and cascades
//!
//! Counters are kept per model class in [`PersistStats`].

mod events;
mod metrics;

pub use events::Event;
pub use metrics::{PersistStats, StatsSnapshot};

pub(crate) const TARGET_DECLARE: &str = "aerorecord::declare";
pub(crate) const TARGET_CACHE: &str = "aerorecord::cache";
pub(crate) const TARGET_PERSIST: &str = "aerorecord::persist";
pub(crate) const TARGET_ASSOC: &str = "aerorecord::assoc";
