//! Recovery subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler (transition → Unhealthy, auto-recover on)
//!     → orchestrator.rs (circuit gate, backoff, verification)
//!     → executor.rs     (restart / failover / alert side effects)
//!     → types.rs        (RecoveryReport → incidents + metrics)
//! ```

pub mod executor;
pub mod orchestrator;
pub mod types;

pub use executor::{ActionError, ActionExecutor, SystemActionExecutor};
pub use orchestrator::RecoveryOrchestrator;
pub use types::{RecoveryOutcome, RecoveryReport};
