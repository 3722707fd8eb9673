//! Configuration management for vaultsync.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables (`VAULTSYNC_*`)
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{Config, DEFAULT_SKIP_DIRS, DEFAULT_VECTOR_NAME};
