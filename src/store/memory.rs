//! In-memory vector store.
//!
//! Enforces the same contract as a real index (collections must exist before
//! points are written, vectors must match the collection size) and records
//! every call so tests can assert on remote traffic.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{CollectionSpec, Point, VectorStore};
use crate::error::StoreError;
use crate::Result;

/// A recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    EnsureCollection { name: String, created: bool },
    Upsert { collection: String, ids: Vec<Uuid> },
    Delete { collection: String, ids: Vec<Uuid> },
}

impl StoreOp {
    /// Whether the call changed remote contents.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        match self {
            Self::EnsureCollection { created, .. } => *created,
            Self::Upsert { .. } | Self::Delete { .. } => true,
        }
    }
}

#[derive(Debug)]
struct Collection {
    spec: CollectionSpec,
    points: BTreeMap<Uuid, Point>,
}

#[derive(Debug, Default)]
struct Inner {
    collections: BTreeMap<String, Collection>,
    ops: Vec<StoreOp>,
    failing: HashSet<&'static str>,
}

/// Vector store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `operation` call (`"upsert"`, `"delete"`, `"ensure_collection"`,
    /// `"point_count"`) fail until [`heal`](Self::heal) is called.
    pub fn fail_operation(&self, operation: &'static str) {
        self.inner.lock().failing.insert(operation);
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        self.inner.lock().failing.clear();
    }

    /// All calls recorded so far.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.inner.lock().ops.clone()
    }

    /// Calls that changed remote contents.
    #[must_use]
    pub fn mutations(&self) -> Vec<StoreOp> {
        self.inner
            .lock()
            .ops
            .iter()
            .filter(|op| op.is_mutation())
            .cloned()
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_operations(&self) {
        self.inner.lock().ops.clear();
    }

    /// Whether a collection exists.
    #[must_use]
    pub fn has_collection(&self, name: &str) -> bool {
        self.inner.lock().collections.contains_key(name)
    }

    /// Get a point by id.
    #[must_use]
    pub fn point(&self, collection: &str, id: &Uuid) -> Option<Point> {
        self.inner
            .lock()
            .collections
            .get(collection)
            .and_then(|c| c.points.get(id).cloned())
    }

    /// Ids stored in a collection, sorted.
    #[must_use]
    pub fn ids(&self, collection: &str) -> Vec<Uuid> {
        self.inner
            .lock()
            .collections
            .get(collection)
            .map(|c| c.points.keys().copied().collect())
            .unwrap_or_default()
    }

    fn check_failure(inner: &Inner, operation: &'static str) -> Result<()> {
        if inner.failing.contains(operation) {
            return Err(StoreError::transport(operation, "injected failure").into());
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_collection(&self, name: &str, spec: &CollectionSpec) -> Result<bool> {
        let mut inner = self.inner.lock();
        Self::check_failure(&inner, "ensure_collection")?;

        let created = !inner.collections.contains_key(name);
        if created {
            inner.collections.insert(
                name.to_string(),
                Collection {
                    spec: spec.clone(),
                    points: BTreeMap::new(),
                },
            );
        }
        inner.ops.push(StoreOp::EnsureCollection {
            name: name.to_string(),
            created,
        });
        Ok(created)
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::check_failure(&inner, "upsert")?;

        let target = inner
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        for point in &points {
            if point.vector_name != target.spec.vector_name || point.vector.len() != target.spec.size
            {
                return Err(StoreError::Rejected {
                    operation: "upsert",
                    collection: collection.to_string(),
                    status: 400,
                    body: format!(
                        "expected vector '{}' of size {}, got '{}' of size {}",
                        target.spec.vector_name,
                        target.spec.size,
                        point.vector_name,
                        point.vector.len()
                    ),
                }
                .into());
            }
        }

        let ids = points.iter().map(|p| p.id).collect();
        for point in points {
            target.points.insert(point.id, point);
        }
        inner.ops.push(StoreOp::Upsert {
            collection: collection.to_string(),
            ids,
        });
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[Uuid]) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::check_failure(&inner, "delete")?;

        let target = inner
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;
        for id in ids {
            target.points.remove(id);
        }
        inner.ops.push(StoreOp::Delete {
            collection: collection.to_string(),
            ids: ids.to_vec(),
        });
        Ok(())
    }

    async fn point_count(&self, collection: &str) -> Result<u64> {
        let inner = self.inner.lock();
        Self::check_failure(&inner, "point_count")?;

        inner
            .collections
            .get(collection)
            .map(|c| c.points.len() as u64)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()).into())
    }
}
