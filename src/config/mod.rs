//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, or JSON for .json paths)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, target + action resolution)
//!     → ValidatedConfig { settings, services: Vec<ServiceSpec> }
//!     → handed to startup, immutable afterwards
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Invalid configuration is a startup error, never a runtime fault

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError, ValidatedConfig};
pub use schema::{HealthPolicy, MonitorConfig, Protocol, ServiceConfig};
pub use validation::{validate_config, ValidationError};
