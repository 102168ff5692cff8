//! Spec synchronization and identity engine
//!
//! Keeps the projections of an increment consistent: the increment's own
//! `spec.md` / `tasks.md`, the living-docs tree that republishes its user
//! stories, and optional external tracker mirrors. The increment's files are
//! always authoritative ("increment wins").
//!
//! Besides the steady-state sync pass, the crate provides two maintenance
//! operations: chronological `FS-NNNE` identifier allocation for externally
//! sourced features, and duplicate-increment detection and resolution.
//!
//! All file access goes through the [`store::FileStore`] trait and all time
//! through [`clock::Clock`], so every operation can be exercised in tests
//! without touching the real filesystem or wall clock.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod allocator;
pub mod clock;
pub mod config;
pub mod coverage;
pub mod duplicates;
pub mod error;
pub mod lock;
pub mod metadata;
pub mod parser;
pub mod store;
pub mod sync;
pub mod timing;
pub mod types;

pub use clock::{Clock, MockClock, SystemClock};
pub use error::{ErrorCategory, Result, SyncError};
pub use store::{FileStore, LocalFileStore, MemoryFileStore};
pub use types::{IncrementStatus, Origin, StorageLocation};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Spec file name inside an increment folder
pub const SPEC_FILE: &str = "spec.md";

/// Task list file name inside an increment folder
pub const TASKS_FILE: &str = "tasks.md";

/// Metadata file name inside an increment folder
pub const METADATA_FILE: &str = "metadata.json";
