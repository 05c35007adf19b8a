//! Recovery action executors.
//!
//! # Responsibilities
//! - Perform the side effect behind a recovery action
//! - Report success or failure; never panic on an operational failure
//!
//! The engine treats the executor as opaque. `SystemActionExecutor` shells
//! out for restarts, keeps an in-process failover routing table and emits
//! alerts as WARN log events.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time;

use crate::probe::BoxFuture;
use crate::service::spec::{RecoveryAction, Target};

/// Failure to carry out a recovery action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    ExitStatus {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("'{0}' did not finish within {1:?}")]
    Timeout(String, Duration),

    #[error("action rejected: {0}")]
    Rejected(String),
}

/// Side-effecting half of recovery. Returns an optional detail on success.
pub trait ActionExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        service: &'a str,
        action: &'a RecoveryAction,
    ) -> BoxFuture<'a, Result<Option<String>, ActionError>>;
}

/// Executor backed by the local system.
#[derive(Debug, Clone)]
pub struct SystemActionExecutor {
    /// service name → target traffic is routed to after a failover.
    routes: Arc<DashMap<String, Target>>,
    command_timeout: Duration,
}

impl SystemActionExecutor {
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            routes: Arc::new(DashMap::new()),
            command_timeout,
        }
    }

    /// Current failover route for a service, if one was installed.
    pub fn route(&self, service: &str) -> Option<Target> {
        self.routes.get(service).map(|r| r.value().clone())
    }

    async fn restart(&self, command: &str) -> Result<Option<String>, ActionError> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output();

        let output = time::timeout(self.command_timeout, child)
            .await
            .map_err(|_| ActionError::Timeout(command.to_string(), self.command_timeout))?
            .map_err(|source| ActionError::Spawn {
                command: command.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ActionError::ExitStatus {
                command: command.to_string(),
                status: output.status,
                stderr: first_line(&output.stderr),
            });
        }
        let stdout = first_line(&output.stdout);
        Ok((!stdout.is_empty()).then_some(stdout))
    }

    fn failover(&self, service: &str, target: &Target) -> Option<String> {
        let previous = self.routes.insert(service.to_string(), target.clone());
        tracing::info!(
            service = %service,
            failover_target = %target,
            previous = ?previous.map(|t| t.to_string()),
            "Routing table updated for failover"
        );
        Some(format!("routing {} via {}", service, target))
    }

    fn alert(&self, service: &str, message: &str) -> Option<String> {
        tracing::warn!(service = %service, message = %message, "ALERT dispatched");
        None
    }
}

impl Default for SystemActionExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ActionExecutor for SystemActionExecutor {
    fn execute<'a>(
        &'a self,
        service: &'a str,
        action: &'a RecoveryAction,
    ) -> BoxFuture<'a, Result<Option<String>, ActionError>> {
        Box::pin(async move {
            match action {
                RecoveryAction::Restart { command, .. } => self.restart(command).await,
                RecoveryAction::Failover { target } => Ok(self.failover(service, target)),
                RecoveryAction::Alert { message } => Ok(self.alert(service, message)),
            }
        })
    }
}

fn first_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
