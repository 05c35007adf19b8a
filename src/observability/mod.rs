//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Service workers and recovery produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (rolling per-service counters, mirrored to the metrics facade)
//!
//! Consumers:
//!     → Log output (stdout, pretty or JSON)
//!     → Periodic summary (MetricsSnapshot)
//!     → Metrics endpoint (optional Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments, per-service DashMap entries)
//! - The exporter is off by default

pub mod logging;
pub mod metrics;

pub use metrics::{MetricsAggregator, MetricsSnapshot, ServiceMetrics};
