//! Service registry: the context object mapping names to service records.
//!
//! Built once at startup and passed explicitly to every component; there is
//! no process-wide mutable state besides what it owns.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::schema::Protocol;
use crate::service::record::ServiceRecord;
use crate::service::spec::ServiceSpec;

/// Engine faults. These indicate a programming error, never a runtime
/// condition of a monitored service, and halt the monitor.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("internal invariant violated: unknown service '{0}'")]
    UnknownService(String),

    #[error("internal invariant violated: duplicate service '{0}'")]
    DuplicateService(String),

    #[error("no probe registered for protocol {0}")]
    MissingProbe(Protocol),

    #[error("service worker failed: {0}")]
    WorkerFailed(String),
}

#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<ServiceRecord>>,
    /// Names in configuration order, for stable reporting.
    order: Vec<String>,
}

impl ServiceRegistry {
    /// Create one record per spec. Names must already be unique.
    pub fn new(specs: Vec<ServiceSpec>) -> Result<Self, EngineError> {
        let mut registry = Self::default();
        for spec in specs {
            let name = spec.name.clone();
            if registry.services.contains_key(&name) {
                return Err(EngineError::DuplicateService(name));
            }
            registry.services.insert(name.clone(), Arc::new(ServiceRecord::new(spec)));
            registry.order.push(name);
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Result<Arc<ServiceRecord>, EngineError> {
        self.services
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownService(name.to_string()))
    }

    /// All records in configuration order.
    pub fn all(&self) -> Vec<Arc<ServiceRecord>> {
        self.order
            .iter()
            .filter_map(|name| self.services.get(name).cloned())
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
