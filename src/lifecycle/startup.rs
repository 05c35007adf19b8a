//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Build probes, the incident log and the action executor
//! - Assemble the `Monitor` from validated service specs
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Workers start only once everything they need exists

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::loader::{load_config, ConfigError, ValidatedConfig};
use crate::incidents::{FileSink, IncidentRecorder};
use crate::monitor::Monitor;
use crate::probe::{ProbeError, ProbeSet};
use crate::recovery::executor::SystemActionExecutor;
use crate::service::registry::EngineError;

/// Options recognized from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOptions {
    pub auto_recover: bool,
    pub verbose: bool,
    pub config_path: PathBuf,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            auto_recover: false,
            verbose: false,
            config_path: PathBuf::from("config.toml"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open incident log {path}: {source}")]
    IncidentLog {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to initialize probes: {0}")]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Load and validate the configuration named by `options`.
pub fn load(options: &MonitorOptions) -> Result<ValidatedConfig, StartupError> {
    Ok(load_config(&options.config_path)?)
}

/// Build a monitor with real network probes and the system executor.
pub fn prepare(config: &ValidatedConfig, options: &MonitorOptions) -> Result<Monitor, StartupError> {
    let settings = &config.settings;

    let recorder = if settings.incidents.enabled {
        let path = Path::new(&settings.incidents.path);
        let sink = FileSink::open(path, settings.incidents.format).map_err(|source| {
            StartupError::IncidentLog {
                path: path.to_path_buf(),
                source,
            }
        })?;
        tracing::info!(path = %path.display(), format = ?settings.incidents.format, "Incident log opened");
        IncidentRecorder::with_sink(Box::new(sink))
    } else {
        IncidentRecorder::new()
    };

    let monitor = Monitor::builder(config.services.clone(), ProbeSet::network()?)
        .executor(Arc::new(SystemActionExecutor::default()))
        .recorder(Arc::new(recorder))
        .auto_recover(options.auto_recover)
        .start_jitter(Duration::from_millis(settings.scheduler.start_jitter_ms))
        .summary_interval(Duration::from_secs(settings.observability.summary_interval_secs))
        .shutdown_timeout(Duration::from_secs(settings.shutdown_timeout_secs))
        .build()?;

    for record in monitor.registry().all() {
        let spec = record.spec();
        tracing::info!(
            service = %spec.name,
            protocol = %spec.protocol,
            endpoint = %spec.target,
            action = spec.recovery.action.kind(),
            "Service configured"
        );
    }

    Ok(monitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;

    #[tokio::test]
    async fn test_prepare_without_incident_file() {
        let config = parse_config(
            r#"
            [incidents]
            enabled = false

            [[services]]
            name = "db"
            protocol = "tcp"
            host = "127.0.0.1"
            port = 5432
            "#,
            false,
        )
        .unwrap();

        let monitor = prepare(&config, &MonitorOptions::default()).unwrap();
        assert_eq!(monitor.registry().names(), ["db".to_string()]);
        assert!(monitor.recorder().is_empty());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let options = MonitorOptions {
            config_path: PathBuf::from("/nonexistent/config.toml"),
            ..MonitorOptions::default()
        };
        assert!(matches!(load(&options), Err(StartupError::Config(ConfigError::Io { .. }))));
    }
}
