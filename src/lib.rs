//! vaultsync
//!
//! Incremental synchronization of a Markdown notes vault into a Qdrant
//! vector index: only changed documents are re-embedded, stale points are
//! reconciled, and state survives between runs.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod embeddings;
pub mod error;
pub mod storage;
pub mod store;
pub mod sync;
pub mod telemetry;

pub use config::Config;
pub use error::{Error, Result};
