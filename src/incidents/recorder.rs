//! Append-only incident recorder.
//!
//! # Responsibilities
//! - Assign strictly increasing sequence numbers
//! - Forward each incident to the configured sink
//! - Answer per-service and summary queries
//!
//! # Design Decisions
//! - One mutex guards sequence, entries and sink; an append is all-or-nothing
//! - Entries are only ever pushed, never edited or removed
//! - Sink failures are logged and do not drop the in-memory entry

use chrono::Utc;
use serde::Serialize;
use std::sync::Mutex;

use crate::incidents::sink::IncidentSink;
use crate::incidents::types::{Incident, IncidentEvent};
use crate::recovery::types::RecoveryOutcome;

/// Aggregate counts over all recorded incidents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IncidentSummary {
    pub total_incidents: u64,
    pub total_transitions: u64,
    pub recovery_attempts: u64,
    pub recovery_successes: u64,
    pub suppressed_attempts: u64,
    pub alerts: u64,
}

impl IncidentSummary {
    /// Successes / attempts, or 0 when nothing was attempted.
    pub fn success_rate(&self) -> f64 {
        if self.recovery_attempts == 0 {
            0.0
        } else {
            self.recovery_successes as f64 / self.recovery_attempts as f64
        }
    }

    fn count(&mut self, event: &IncidentEvent) {
        self.total_incidents += 1;
        match event {
            IncidentEvent::HealthTransition(_) => self.total_transitions += 1,
            IncidentEvent::RecoveryOutcome(report) => {
                self.recovery_attempts += 1;
                if report.outcome == RecoveryOutcome::Success {
                    self.recovery_successes += 1;
                }
            }
            IncidentEvent::RecoverySuppressed { .. } => self.suppressed_attempts += 1,
            IncidentEvent::Alert { .. } => self.alerts += 1,
        }
    }
}

struct Inner {
    entries: Vec<Incident>,
    next_seq: u64,
    summary: IncidentSummary,
    sink: Option<Box<dyn IncidentSink>>,
}

pub struct IncidentRecorder {
    inner: Mutex<Inner>,
}

impl IncidentRecorder {
    /// In-memory recorder without an output sink.
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_sink(sink: Box<dyn IncidentSink>) -> Self {
        Self::build(Some(sink))
    }

    fn build(sink: Option<Box<dyn IncidentSink>>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                next_seq: 1,
                summary: IncidentSummary::default(),
                sink,
            }),
        }
    }

    /// Append an event for `service` and return the recorded incident.
    pub fn record(&self, service: &str, event: IncidentEvent) -> Incident {
        let mut inner = self.inner.lock().expect("incident recorder mutex poisoned");

        let incident = Incident {
            seq: inner.next_seq,
            timestamp: Utc::now(),
            service: service.to_string(),
            event,
        };
        inner.next_seq += 1;

        if let Some(sink) = inner.sink.as_mut() {
            if let Err(e) = sink.write(&incident) {
                tracing::error!(
                    service = %incident.service,
                    seq = incident.seq,
                    error = %e,
                    "Failed to write incident to sink"
                );
            }
        }

        inner.summary.count(&incident.event);
        inner.entries.push(incident.clone());
        incident
    }

    /// All incidents for one service, in sequence order.
    pub fn for_service(&self, service: &str) -> Vec<Incident> {
        let inner = self.inner.lock().expect("incident recorder mutex poisoned");
        inner
            .entries
            .iter()
            .filter(|i| i.service == service)
            .cloned()
            .collect()
    }

    /// Every incident, in sequence order.
    pub fn all(&self) -> Vec<Incident> {
        self.inner
            .lock()
            .expect("incident recorder mutex poisoned")
            .entries
            .clone()
    }

    pub fn summary(&self) -> IncidentSummary {
        self.inner.lock().expect("incident recorder mutex poisoned").summary
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("incident recorder mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IncidentRecorder {
    fn default() -> Self {
        Self::new()
    }
}
