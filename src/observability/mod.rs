//! Observability for the storage engine
//!
//! - Structured log events go through `tracing`; the library never
//!   installs a subscriber
//! - `MetricsRegistry` holds per-store monotonic counters
//!
//! Observability is read-only: nothing here affects commit outcomes.

mod metrics;

pub use metrics::{MetricsRegistry, MetricsSnapshot};
