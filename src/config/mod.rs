//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → shared via Arc to the guard and its evaluation tasks
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the guard is constructed
//! - All fields have defaults so a minimal config only lists services
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BaselineConfig, GuardConfig, PerformanceThresholds, SchedulerConfig, ServiceConfig,
};
pub use validation::{validate_config, ValidationError};
