//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Open incident log → Build probes → Monitor
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Workers finish in-flight probe/recovery → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then sinks and probes, then workers
//! - Shutdown has timeout: remaining workers are aborted after the deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{MonitorOptions, StartupError};
