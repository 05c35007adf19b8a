//! Recovery result types.

use serde::Serialize;
use std::fmt;

use crate::resilience::circuit_breaker::CircuitState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// The verification probe succeeded.
    Success,
    /// The action could not run, or the verification probe failed.
    Failed,
}

impl fmt::Display for RecoveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryOutcome::Success => f.write_str("success"),
            RecoveryOutcome::Failed => f.write_str("failed"),
        }
    }
}

/// One completed recovery attempt. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub service: String,
    pub action: String,
    /// 1-based attempt number since the last verified recovery.
    pub attempt: u32,
    pub outcome: RecoveryOutcome,
    /// Backoff waited before the action ran.
    pub backoff_ms: u64,
    /// Target the verification probe ran against.
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Circuit state after the outcome was applied.
    pub circuit: CircuitState,
}

impl fmt::Display for RecoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempt #{} on {}: {}",
            self.action, self.attempt, self.target, self.outcome
        )?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        if self.circuit == CircuitState::Open {
            f.write_str(", circuit open")?;
        }
        Ok(())
    }
}
