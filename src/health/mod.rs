//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler (scheduler.rs), one task per service:
//!     Fixed-cadence tick
//!     → Probe under deadline
//!     → State machine (state.rs)
//!     → Transition published (incidents + metrics)
//!     → Recovery orchestrator on →Unhealthy
//!
//! State machine (state.rs):
//!     Healthy → Degraded → Unhealthy → Healthy
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Degraded is observation only; only Unhealthy triggers recovery
//! - State transitions require consecutive successes/failures
//! - Health state is per-service, processed in order on the service's task

pub mod scheduler;
pub mod state;

pub use scheduler::ServiceWorker;
pub use state::{observe, HealthTransition};
