//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Probe invocation:
//!     → timeouts.rs (caller-owned deadline, expiry = failure result)
//!
//! Recovery attempt:
//!     → circuit_breaker.rs (suppress while open, half-open trial after cooldown)
//!     → backoff.rs (capped exponential delay before the action)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every probe has a deadline
//! - Circuit breaker is per service, never global
//! - Backoff attempt counter is capped, so the delay is bounded

pub mod backoff;
pub mod circuit_breaker;
pub mod timeouts;
