//! Per-service probe loop.
//!
//! # Responsibilities
//! - Tick on a fixed cadence anchored at start, independent of probe duration
//! - Enforce the probe deadline regardless of transport behavior
//! - Feed results to the state machine and hand triggers to recovery
//!
//! Each service gets its own task. Probing for a service pauses while its
//! recovery attempt is in flight; ticks missed meanwhile are skipped, so the
//! cadence stays on the original grid.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::health::state::{self, HealthTransition};
use crate::incidents::{IncidentEvent, IncidentRecorder};
use crate::observability::metrics::MetricsAggregator;
use crate::probe::Probe;
use crate::recovery::orchestrator::RecoveryOrchestrator;
use crate::resilience::timeouts::with_deadline;
use crate::service::record::{Health, ServiceRecord};

/// Log, record and count a health transition.
pub(crate) fn publish_transition(
    recorder: &IncidentRecorder,
    metrics: &MetricsAggregator,
    transition: &HealthTransition,
) {
    let service = transition.service.as_str();
    match transition.to {
        Health::Healthy => tracing::info!(
            service = %service,
            from = %transition.from,
            successes = transition.consecutive_successes,
            "Service recovered: {}",
            transition
        ),
        Health::Degraded => tracing::warn!(
            service = %service,
            failures = transition.consecutive_failures,
            "Service degraded: {}",
            transition
        ),
        Health::Unhealthy => tracing::error!(
            service = %service,
            failures = transition.consecutive_failures,
            persisting = transition.is_persisting(),
            "Service unhealthy: {}",
            transition
        ),
    }

    recorder.record(service, IncidentEvent::HealthTransition(transition.clone()));
    metrics.record_transition(transition);
}

pub struct ServiceWorker {
    record: Arc<ServiceRecord>,
    probe: Arc<dyn Probe>,
    recorder: Arc<IncidentRecorder>,
    metrics: Arc<MetricsAggregator>,
    /// `None` when auto-recovery is disabled.
    orchestrator: Option<Arc<RecoveryOrchestrator>>,
    /// Upper bound of the random delay before the first tick.
    start_jitter: Duration,
}

impl ServiceWorker {
    pub fn new(
        record: Arc<ServiceRecord>,
        probe: Arc<dyn Probe>,
        recorder: Arc<IncidentRecorder>,
        metrics: Arc<MetricsAggregator>,
    ) -> Self {
        Self {
            record,
            probe,
            recorder,
            metrics,
            orchestrator: None,
            start_jitter: Duration::ZERO,
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: Arc<RecoveryOrchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn with_start_jitter(mut self, jitter: Duration) -> Self {
        self.start_jitter = jitter;
        self
    }

    fn initial_delay(&self) -> Duration {
        let max_ms = self.start_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let spec = self.record.spec();
        let delay = self.initial_delay();

        tracing::info!(
            service = %spec.name,
            protocol = %spec.protocol,
            endpoint = %spec.target,
            interval_secs = spec.interval.as_secs_f64(),
            timeout_secs = spec.timeout.as_secs_f64(),
            start_delay_ms = delay.as_millis() as u64,
            "Service worker starting"
        );

        let mut ticker = time::interval_at(Instant::now() + delay, spec.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::debug!(service = %spec.name, "Service worker received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe once, apply the result and run recovery if it was triggered.
    pub async fn run_once(&self) -> Option<HealthTransition> {
        let spec = self.record.spec();
        let name = self.record.name();
        let target = self.record.update(|s| s.active_target.clone());

        let result = with_deadline(spec.timeout, self.probe.check(&target, spec.timeout)).await;

        let (transition, health) = self.record.update(|s| {
            let transition = state::observe(name, &spec.health, s, &result);
            (transition, s.health)
        });
        self.metrics.record_probe(name, &result, health);

        tracing::debug!(
            service = %name,
            endpoint = %target,
            success = result.is_success(),
            latency_ms = result.latency().as_secs_f64() * 1000.0,
            error = result.error().unwrap_or(""),
            health = %health,
            "Probe completed"
        );

        let transition = transition?;
        publish_transition(&self.recorder, &self.metrics, &transition);

        if transition.triggers_recovery() {
            match &self.orchestrator {
                Some(orchestrator) => {
                    orchestrator
                        .recover(&self.record, self.probe.as_ref(), &transition)
                        .await;
                }
                None => tracing::info!(
                    service = %name,
                    "Auto-recovery disabled, no action taken"
                ),
            }
        }

        Some(transition)
    }
}
