//! Configuration module for spec sync
//!
//! Layered configuration:
//! 1. Defaults (from code)
//! 2. Config file (specsync.toml)
//! 3. Environment variables (SPECSYNC_* prefix, `__` for nesting)
//!
//! # Example
//!
//! ```no_run
//! use speckit_sync::config::ConfigLoader;
//!
//! let config = ConfigLoader::load_default().expect("Failed to load config");
//! assert!(config.audit.limit >= 1);
//! ```

pub mod error;
pub mod loader;
pub mod validator;

pub use error::{ConfigError, Result};
pub use loader::{
    AuditConfig, ConfigLoader, CoverageConfig, DuplicatesConfig, LayoutConfig, ProjectPaths,
    SyncConfig, SyncOptions,
};
pub use validator::SchemaValidator;
