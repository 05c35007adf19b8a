//! Circuit breaker guarding recovery actions.
//!
//! # States
//! - Closed: recovery actions run normally
//! - Open: target assumed persistently down, actions are suppressed
//! - Half-Open: cooldown elapsed, a single trial attempt is allowed
//!
//! # State Transitions
//! ```text
//! Closed → Open: backoff_attempt reaches max_retries
//! Open → Half-Open: cooldown elapsed when the next attempt is requested
//! Half-Open → Closed: verification succeeds
//! Half-Open → Open: verification fails
//! ```
//!
//! Probes keep running while the circuit is open; only actions are gated.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        f.write_str(name)
    }
}

/// Result of asking the breaker for permission to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    Suppressed { remaining: Duration },
}

/// Per-service breaker plus the backoff attempt counter it drives.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    opened_at: Option<Instant>,
    backoff_attempt: u32,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            opened_at: None,
            backoff_attempt: 0,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    pub fn backoff_attempt(&self) -> u32 {
        self.backoff_attempt
    }

    /// Check whether a recovery attempt may run at `now`.
    ///
    /// An open circuit whose cooldown has elapsed moves to Half-Open.
    pub fn try_acquire(&mut self, now: Instant, cooldown: Duration) -> Gate {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => Gate::Proceed,
            CircuitState::Open => {
                let opened_at = self.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= cooldown {
                    self.state = CircuitState::HalfOpen;
                    Gate::Proceed
                } else {
                    Gate::Suppressed {
                        remaining: cooldown - elapsed,
                    }
                }
            }
        }
    }

    /// Record a verified recovery.
    pub fn record_success(&mut self) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.backoff_attempt = 0;
    }

    /// Record a failed attempt. Returns true when this failure opened the circuit.
    pub fn record_failure(&mut self, now: Instant, max_retries: u32) -> bool {
        self.backoff_attempt = self.backoff_attempt.saturating_add(1).min(max_retries);
        if self.state == CircuitState::HalfOpen || self.backoff_attempt >= max_retries {
            self.state = CircuitState::Open;
            self.opened_at = Some(now);
            true
        } else {
            false
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}
