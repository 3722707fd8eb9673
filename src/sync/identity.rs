//! Document hashing and point identity.
//!
//! The two concerns are kept apart: the document hash only decides whether a
//! document changed, while point ids must never change once assigned.

use blake3::Hasher;
use uuid::Uuid;

/// Compute the change-detection hash of raw document bytes.
#[must_use]
pub fn document_hash(bytes: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize().to_hex().to_string()
}

/// Deterministic point id for chunk `index` of the document at `path`.
///
/// UUIDv5 in the URL namespace over `"{path}::{index}"`, so ids are stable
/// across runs and machines.
#[must_use]
pub fn point_id(path: &str, index: usize) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{path}::{index}").as_bytes())
}

/// Point ids for chunk indices `0..count`.
#[must_use]
pub fn point_ids(path: &str, count: usize) -> Vec<Uuid> {
    (0..count).map(|i| point_id(path, i)).collect()
}
