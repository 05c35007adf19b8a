//! Telecom service health monitor library.

pub mod config;
pub mod health;
pub mod incidents;
pub mod lifecycle;
pub mod monitor;
pub mod observability;
pub mod probe;
pub mod recovery;
pub mod resilience;
pub mod service;

pub use config::schema::MonitorConfig;
pub use lifecycle::Shutdown;
pub use monitor::{Monitor, MonitorBuilder};
