//! Durable sync state.
//!
//! The state file is the only record of what the remote index holds for each
//! document; the vector store is never read back to recover it.

mod models;
mod state;

pub use models::{StateEntry, SyncState};
pub use state::StateStore;
