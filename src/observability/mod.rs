//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Connections and the accept loop produce:
//!     → logging.rs (structured log events, one span per connection)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Connection ID flows through every event via the connection span
//! - Metrics are cheap (atomic increments) and no-ops when no recorder is installed

pub mod logging;
pub mod metrics;
