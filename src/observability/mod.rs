//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Connection and backend identities are attached as structured fields
//! - Metric updates are no-ops until a recorder is installed
//! - Neither subsystem is allowed to abort startup

pub mod logging;
pub mod metrics;
