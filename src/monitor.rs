//! The monitor: owns the registry and runs one worker per service.
//!
//! # Responsibilities
//! - Wire probes, recorder, metrics and recovery into service workers
//! - Run workers concurrently until shutdown
//! - Report periodic summaries and final statistics
//! - Drain in-flight work on shutdown, abort what misses the deadline

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::health::scheduler::ServiceWorker;
use crate::incidents::IncidentRecorder;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics::{MetricsAggregator, MetricsSnapshot};
use crate::probe::ProbeSet;
use crate::recovery::executor::{ActionExecutor, SystemActionExecutor};
use crate::recovery::orchestrator::RecoveryOrchestrator;
use crate::service::registry::{EngineError, ServiceRegistry};
use crate::service::spec::ServiceSpec;

pub struct MonitorBuilder {
    specs: Vec<ServiceSpec>,
    probes: ProbeSet,
    executor: Option<Arc<dyn ActionExecutor>>,
    recorder: Option<Arc<IncidentRecorder>>,
    auto_recover: bool,
    start_jitter: Duration,
    summary_interval: Option<Duration>,
    shutdown_timeout: Duration,
}

impl MonitorBuilder {
    /// Action executor used for recovery. Defaults to `SystemActionExecutor`.
    pub fn executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn recorder(mut self, recorder: Arc<IncidentRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn auto_recover(mut self, enabled: bool) -> Self {
        self.auto_recover = enabled;
        self
    }

    pub fn start_jitter(mut self, jitter: Duration) -> Self {
        self.start_jitter = jitter;
        self
    }

    /// Interval between periodic summaries. Zero disables them.
    pub fn summary_interval(mut self, interval: Duration) -> Self {
        self.summary_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Monitor, EngineError> {
        let registry = Arc::new(ServiceRegistry::new(self.specs)?);

        let mut workers = Vec::with_capacity(registry.len());
        let recorder = self.recorder.unwrap_or_default();
        let metrics = Arc::new(MetricsAggregator::new(&registry));
        let orchestrator = self.auto_recover.then(|| {
            let executor = self
                .executor
                .unwrap_or_else(|| Arc::new(SystemActionExecutor::default()));
            Arc::new(RecoveryOrchestrator::new(executor, recorder.clone(), metrics.clone()))
        });

        for record in registry.all() {
            let protocol = record.spec().protocol;
            let probe = self
                .probes
                .get(protocol)
                .ok_or(EngineError::MissingProbe(protocol))?;
            let mut worker = ServiceWorker::new(record, probe, recorder.clone(), metrics.clone())
                .with_start_jitter(self.start_jitter);
            if let Some(orchestrator) = &orchestrator {
                worker = worker.with_orchestrator(orchestrator.clone());
            }
            workers.push(worker);
        }

        Ok(Monitor {
            registry,
            recorder,
            metrics,
            workers,
            auto_recover: self.auto_recover,
            summary_interval: self.summary_interval,
            shutdown_timeout: self.shutdown_timeout,
        })
    }
}

pub struct Monitor {
    registry: Arc<ServiceRegistry>,
    recorder: Arc<IncidentRecorder>,
    metrics: Arc<MetricsAggregator>,
    workers: Vec<ServiceWorker>,
    auto_recover: bool,
    summary_interval: Option<Duration>,
    shutdown_timeout: Duration,
}

impl Monitor {
    pub fn builder(specs: Vec<ServiceSpec>, probes: ProbeSet) -> MonitorBuilder {
        MonitorBuilder {
            specs,
            probes,
            executor: None,
            recorder: None,
            auto_recover: false,
            start_jitter: Duration::ZERO,
            summary_interval: Some(Duration::from_secs(60)),
            shutdown_timeout: Duration::from_secs(10),
        }
    }

    pub fn registry(&self) -> Arc<ServiceRegistry> {
        self.registry.clone()
    }

    pub fn recorder(&self) -> Arc<IncidentRecorder> {
        self.recorder.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsAggregator> {
        self.metrics.clone()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Run until `shutdown` fires. A worker that dies unexpectedly is fatal:
    /// the rest are shut down and the error is returned.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), EngineError> {
        let Monitor {
            metrics,
            workers,
            auto_recover,
            summary_interval,
            shutdown_timeout,
            ..
        } = self;

        tracing::info!(
            services = workers.len(),
            auto_recover,
            "Monitor starting"
        );
        if !auto_recover {
            tracing::info!("Auto-recovery disabled, transitions are recorded only");
        }

        let mut stop = shutdown.subscribe();
        let mut tasks = JoinSet::new();
        for worker in workers {
            let rx = shutdown.subscribe();
            tasks.spawn(worker.run(rx));
        }

        if let Some(interval) = summary_interval {
            let metrics = metrics.clone();
            let mut rx = shutdown.subscribe();
            tasks.spawn(async move {
                let mut ticker = time::interval_at(Instant::now() + interval, interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => metrics.snapshot().log(),
                        _ = rx.recv() => break,
                    }
                }
            });
        }

        let mut outcome = Ok(());
        tokio::select! {
            biased;
            _ = stop.recv() => {
                tracing::info!("Shutdown signal received, draining service workers");
            }
            Some(joined) = tasks.join_next() => {
                let reason = match joined {
                    Err(e) if e.is_panic() => format!("panic: {}", e),
                    Err(e) => e.to_string(),
                    Ok(()) => "exited before shutdown".to_string(),
                };
                tracing::error!(reason = %reason, "Service worker failed, shutting down");
                outcome = Err(EngineError::WorkerFailed(reason));
                shutdown.trigger();
            }
        }

        let deadline = Instant::now() + shutdown_timeout;
        while !tasks.is_empty() {
            match time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Err(e))) if e.is_panic() => {
                    tracing::error!(error = %e, "Service worker panicked during shutdown");
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        remaining = tasks.len(),
                        timeout_secs = shutdown_timeout.as_secs(),
                        "Shutdown timeout reached, aborting remaining workers"
                    );
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    break;
                }
            }
        }

        log_final_stats(&metrics.snapshot());
        outcome
    }
}

fn log_final_stats(snapshot: &MetricsSnapshot) {
    tracing::info!(
        total_checks = snapshot.total_checks,
        healthy_checks = snapshot.healthy_checks,
        unhealthy_checks = snapshot.unhealthy_checks,
        recoveries_attempted = snapshot.recoveries_attempted,
        recoveries_successful = snapshot.recoveries_successful,
        success_rate = snapshot.recovery_success_rate(),
        "Final statistics"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Protocol;
    use crate::probe::{BoxFuture, Probe, ProbeResult};
    use crate::service::spec::Target;

    struct InstantProbe;

    impl Probe for InstantProbe {
        fn check<'a>(&'a self, _target: &'a Target, _timeout: Duration) -> BoxFuture<'a, ProbeResult> {
            Box::pin(async { ProbeResult::success(Duration::ZERO, None) })
        }
    }

    #[test]
    fn test_missing_probe_is_rejected() {
        let specs = vec![ServiceSpec::new("db", Protocol::Tcp, Target::socket("127.0.0.1", 5432))];
        let err = Monitor::builder(specs, ProbeSet::empty()).build().err().unwrap();
        assert!(matches!(err, EngineError::MissingProbe(Protocol::Tcp)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_clean_shutdown_is_never_a_worker_failure() {
        for _ in 0..20 {
            let specs = (0..16)
                .map(|i| {
                    ServiceSpec::new(format!("svc-{}", i), Protocol::Tcp, Target::socket("127.0.0.1", 5060))
                        .with_timing(Duration::from_millis(5), Duration::from_millis(5))
                })
                .collect();
            let monitor = Monitor::builder(specs, ProbeSet::empty().with(Protocol::Tcp, Arc::new(InstantProbe)))
                .summary_interval(Duration::from_millis(5))
                .build()
                .unwrap();

            let shutdown = Shutdown::new();
            let handle = {
                let shutdown = shutdown.clone();
                tokio::spawn(async move { monitor.run(&shutdown).await })
            };
            time::sleep(Duration::from_millis(20)).await;
            shutdown.trigger();
            assert!(handle.await.unwrap().is_ok());
        }
    }
}
