//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Keep rolling per-service counters for the periodic summary
//! - Mirror every update into the `metrics` facade
//! - Optionally expose a Prometheus scrape endpoint
//!
//! # Metrics
//! - `monitor_probes_total` (counter): probes by service, result
//! - `monitor_probe_latency_seconds` (histogram): probe latency by service
//! - `monitor_service_health` (gauge): 2=healthy, 1=degraded, 0=unhealthy
//! - `monitor_recoveries_total` (counter): attempts by service, action, outcome
//! - `monitor_recoveries_suppressed_total` (counter): attempts skipped by an open circuit
//! - `monitor_circuit_open` (gauge): 1 while a service's circuit is open

use dashmap::DashMap;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::health::state::HealthTransition;
use crate::probe::ProbeResult;
use crate::recovery::types::{RecoveryOutcome, RecoveryReport};
use crate::resilience::circuit_breaker::CircuitState;
use crate::service::record::Health;
use crate::service::registry::ServiceRegistry;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

fn health_gauge(health: Health) -> f64 {
    match health {
        Health::Healthy => 2.0,
        Health::Degraded => 1.0,
        Health::Unhealthy => 0.0,
    }
}

/// Rolling counters for one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceMetrics {
    pub name: String,
    pub health: Health,
    pub circuit: CircuitState,
    pub active_target: String,
    pub checks: u64,
    pub failures: u64,
    pub last_latency_ms: Option<f64>,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
    total_latency_ms: f64,
    pub last_error: Option<String>,
    pub recovery_attempts: u64,
    pub recovery_successes: u64,
    pub suppressed_attempts: u64,
}

impl ServiceMetrics {
    fn new(name: &str, active_target: String) -> Self {
        Self {
            name: name.to_string(),
            health: Health::Healthy,
            circuit: CircuitState::Closed,
            active_target,
            checks: 0,
            failures: 0,
            last_latency_ms: None,
            min_latency_ms: None,
            max_latency_ms: None,
            total_latency_ms: 0.0,
            last_error: None,
            recovery_attempts: 0,
            recovery_successes: 0,
            suppressed_attempts: 0,
        }
    }

    pub fn avg_latency_ms(&self) -> Option<f64> {
        (self.checks > 0).then(|| self.total_latency_ms / self.checks as f64)
    }
}

/// Aggregated view produced for the periodic summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_services: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub circuit_open: usize,
    pub total_checks: u64,
    pub healthy_checks: u64,
    pub unhealthy_checks: u64,
    pub recoveries_attempted: u64,
    pub recoveries_successful: u64,
    pub services: Vec<ServiceMetrics>,
}

impl MetricsSnapshot {
    pub fn recovery_success_rate(&self) -> f64 {
        if self.recoveries_attempted == 0 {
            0.0
        } else {
            self.recoveries_successful as f64 / self.recoveries_attempted as f64
        }
    }

    /// Log the summary block: one aggregate line, then one line per service.
    pub fn log(&self) {
        tracing::info!(
            total = self.total_services,
            healthy = self.healthy,
            degraded = self.degraded,
            unhealthy = self.unhealthy,
            circuit_open = self.circuit_open,
            recoveries = self.recoveries_attempted,
            "{}",
            self
        );
        for svc in &self.services {
            let latency = svc
                .last_latency_ms
                .map(|ms| format!("{:.2}ms", ms))
                .unwrap_or_else(|| "-".to_string());
            let circuit = if svc.circuit == CircuitState::Open {
                " [CIRCUIT OPEN: recovery paused]"
            } else {
                ""
            };
            tracing::info!(
                service = %svc.name,
                health = %svc.health,
                checks = svc.checks,
                failures = svc.failures,
                "  {} {} (last {}) via {}{}",
                svc.name,
                svc.health,
                latency,
                svc.active_target,
                circuit
            );
        }
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Summary: {}/{} services healthy ({} degraded, {} unhealthy, {} circuit open); \
             checks {} ({} ok, {} failed); recoveries {}/{} successful",
            self.healthy,
            self.total_services,
            self.degraded,
            self.unhealthy,
            self.circuit_open,
            self.total_checks,
            self.healthy_checks,
            self.unhealthy_checks,
            self.recoveries_successful,
            self.recoveries_attempted
        )
    }
}

/// Concurrent metrics store shared by every service worker.
#[derive(Debug)]
pub struct MetricsAggregator {
    services: DashMap<String, ServiceMetrics>,
    order: Vec<String>,
    total_checks: AtomicU64,
    healthy_checks: AtomicU64,
    recoveries_attempted: AtomicU64,
    recoveries_successful: AtomicU64,
}

impl MetricsAggregator {
    pub fn new(registry: &ServiceRegistry) -> Self {
        let services = DashMap::new();
        for record in registry.all() {
            services.insert(
                record.name().to_string(),
                ServiceMetrics::new(record.name(), record.spec().target.to_string()),
            );
        }
        Self {
            services,
            order: registry.names().to_vec(),
            total_checks: AtomicU64::new(0),
            healthy_checks: AtomicU64::new(0),
            recoveries_attempted: AtomicU64::new(0),
            recoveries_successful: AtomicU64::new(0),
        }
    }

    /// Record a probe result and the health it left the service in.
    pub fn record_probe(&self, service: &str, result: &ProbeResult, health: Health) {
        let latency_ms = result.latency().as_secs_f64() * 1000.0;
        let outcome = if result.is_success() { "success" } else { "failure" };

        self.total_checks.fetch_add(1, Ordering::Relaxed);
        if result.is_success() {
            self.healthy_checks.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(mut entry) = self.services.get_mut(service) {
            entry.checks += 1;
            entry.health = health;
            entry.last_latency_ms = Some(latency_ms);
            entry.total_latency_ms += latency_ms;
            entry.min_latency_ms = Some(entry.min_latency_ms.map_or(latency_ms, |m| m.min(latency_ms)));
            entry.max_latency_ms = Some(entry.max_latency_ms.map_or(latency_ms, |m| m.max(latency_ms)));
            if result.is_success() {
                entry.last_error = None;
            } else {
                entry.failures += 1;
                entry.last_error = result.error().map(str::to_string);
            }
        }

        metrics::counter!("monitor_probes_total", "service" => service.to_string(), "result" => outcome)
            .increment(1);
        metrics::histogram!("monitor_probe_latency_seconds", "service" => service.to_string())
            .record(result.latency().as_secs_f64());
        metrics::gauge!("monitor_service_health", "service" => service.to_string()).set(health_gauge(health));
    }

    /// Reaching Healthy also closes the service's circuit.
    pub fn record_transition(&self, transition: &HealthTransition) {
        let healed = transition.to == Health::Healthy;
        if let Some(mut entry) = self.services.get_mut(&transition.service) {
            entry.health = transition.to;
            if healed {
                entry.circuit = CircuitState::Closed;
            }
        }
        metrics::gauge!("monitor_service_health", "service" => transition.service.clone())
            .set(health_gauge(transition.to));
        if healed {
            metrics::gauge!("monitor_circuit_open", "service" => transition.service.clone()).set(0.0);
        }
    }

    pub fn record_recovery(&self, report: &RecoveryReport, active_target: String) {
        let success = report.outcome == RecoveryOutcome::Success;
        self.recoveries_attempted.fetch_add(1, Ordering::Relaxed);
        if success {
            self.recoveries_successful.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(mut entry) = self.services.get_mut(&report.service) {
            entry.recovery_attempts += 1;
            if success {
                entry.recovery_successes += 1;
            }
            entry.circuit = report.circuit;
            entry.active_target = active_target;
        }

        metrics::counter!(
            "monitor_recoveries_total",
            "service" => report.service.clone(),
            "action" => report.action.clone(),
            "outcome" => report.outcome.to_string()
        )
        .increment(1);
        let open = if report.circuit == CircuitState::Open { 1.0 } else { 0.0 };
        metrics::gauge!("monitor_circuit_open", "service" => report.service.clone()).set(open);
    }

    pub fn record_suppressed(&self, service: &str, circuit: CircuitState) {
        if let Some(mut entry) = self.services.get_mut(service) {
            entry.suppressed_attempts += 1;
            entry.circuit = circuit;
        }
        metrics::counter!("monitor_recoveries_suppressed_total", "service" => service.to_string())
            .increment(1);
    }

    /// Current metrics for one service.
    pub fn service(&self, name: &str) -> Option<ServiceMetrics> {
        self.services.get(name).map(|r| r.value().clone())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let services: Vec<ServiceMetrics> = self
            .order
            .iter()
            .filter_map(|name| self.service(name))
            .collect();

        let count = |h: Health| services.iter().filter(|s| s.health == h).count();
        let total_checks = self.total_checks.load(Ordering::Relaxed);
        let healthy_checks = self.healthy_checks.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_services: services.len(),
            healthy: count(Health::Healthy),
            degraded: count(Health::Degraded),
            unhealthy: count(Health::Unhealthy),
            circuit_open: services.iter().filter(|s| s.circuit == CircuitState::Open).count(),
            total_checks,
            healthy_checks,
            unhealthy_checks: total_checks.saturating_sub(healthy_checks),
            recoveries_attempted: self.recoveries_attempted.load(Ordering::Relaxed),
            recoveries_successful: self.recoveries_successful.load(Ordering::Relaxed),
            services,
        }
    }
}
