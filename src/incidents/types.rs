//! Incident types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::health::state::HealthTransition;
use crate::recovery::types::{RecoveryOutcome, RecoveryReport};
use crate::resilience::circuit_breaker::CircuitState;

/// What happened. Serialized as `event_type` plus `detail`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", content = "detail", rename_all = "snake_case")]
pub enum IncidentEvent {
    HealthTransition(HealthTransition),
    RecoveryOutcome(RecoveryReport),
    /// A recovery attempt skipped because the circuit is open.
    RecoverySuppressed {
        circuit: CircuitState,
        cooldown_remaining_ms: u64,
    },
    Alert {
        message: String,
    },
}

/// A recorded event. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incident {
    /// Strictly increasing, starting at 1.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    #[serde(flatten)]
    pub event: IncidentEvent,
}

impl Incident {
    /// Short upper-case status used in text output.
    pub fn status(&self) -> String {
        match &self.event {
            IncidentEvent::HealthTransition(t) => t.to.to_string(),
            IncidentEvent::RecoveryOutcome(r) => match r.outcome {
                RecoveryOutcome::Success => "RECOVERED".to_string(),
                RecoveryOutcome::Failed => "RECOVERY FAILED".to_string(),
            },
            IncidentEvent::RecoverySuppressed { .. } => "RECOVERY SUPPRESSED".to_string(),
            IncidentEvent::Alert { .. } => "ALERT".to_string(),
        }
    }

    /// Human-readable detail used in text output.
    pub fn details(&self) -> String {
        match &self.event {
            IncidentEvent::HealthTransition(t) => t.to_string(),
            IncidentEvent::RecoveryOutcome(r) => r.to_string(),
            IncidentEvent::RecoverySuppressed {
                circuit,
                cooldown_remaining_ms,
            } => format!(
                "circuit {}, {:.1}s of cooldown left",
                circuit,
                *cooldown_remaining_ms as f64 / 1000.0
            ),
            IncidentEvent::Alert { message } => message.clone(),
        }
    }

    /// `[timestamp] service: STATUS - details`
    pub fn to_text_line(&self) -> String {
        format!(
            "[{}] {}: {} - {}",
            self.timestamp.to_rfc3339(),
            self.service,
            self.status(),
            self.details()
        )
    }
}
