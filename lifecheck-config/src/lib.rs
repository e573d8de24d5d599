//! Configuration loading for lifecheck.
//!
//! Values come from, in increasing precedence: built-in defaults, an
//! optional TOML file, then the process environment (after `.env` has been
//! applied). Problems that do not stop the process are returned as
//! [`ConfigWarnings`] instead of errors.

/// Discovery and precedence rules.
pub mod loader;
/// Resolved configuration.
pub mod models;
/// Raw file and environment inputs.
pub mod sources;
/// Non-fatal configuration checks.
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    Config, ConfigMetadata, DatabaseConfig, RegistryConfig, SchedulerSettings,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigWarning, ConfigWarnings};
