//! Monitored services.
//!
//! # Data Flow
//! ```text
//! validated config
//!     → spec.rs (ServiceSpec: immutable, resolved targets and actions)
//!     → registry.rs (name → ServiceRecord, built once at startup)
//!     → record.rs (ServiceState: health, counters, circuit, active target)
//! ```

pub mod record;
pub mod registry;
pub mod spec;

pub use record::{Health, ServiceRecord, ServiceState};
pub use registry::{EngineError, ServiceRegistry};
pub use spec::{RecoveryAction, RecoveryPolicy, ServiceSpec, Target};
