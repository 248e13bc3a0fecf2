//! Process-local identity map: one canonical value per persisted node.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};

use crate::db::NodeId;

/// Caches exactly one `Arc<T>` per node id for the lifetime of the cache.
///
/// Lookups take a read lock only. On a miss the caller takes the build lock,
/// checks again, and builds while still holding it, so two callers racing on
/// the same new id never both construct it. The build lock is reentrant
/// because building one value may resolve others through the same cache
/// (a category resolves its parent). Entries are never evicted.
pub struct IdentityCache<T> {
    entries: RwLock<HashMap<NodeId, Arc<T>>>,
    build_lock: ReentrantMutex<()>,
}

impl<T> IdentityCache<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            build_lock: ReentrantMutex::new(()),
        }
    }

    pub fn get(&self, id: NodeId) -> Option<Arc<T>> {
        self.entries.read().get(&id).cloned()
    }

    /// Return the cached value for `id`, building and caching it on first use.
    ///
    /// A failed build caches nothing; the next caller tries again.
    pub fn resolve<E, F>(&self, id: NodeId, build: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(hit) = self.get(id) {
            return Ok(hit);
        }

        let _guard = self.build_lock.lock();
        if let Some(hit) = self.get(id) {
            return Ok(hit);
        }

        let value = Arc::new(build()?);
        self.entries.write().insert(id, value.clone());
        tracing::debug!(node = %id, "Identity cache populated");
        Ok(value)
    }

    /// Number of cached values.
    pub fn count(&self) -> usize {
        self.entries.read().len()
    }
}

impl<T> Default for IdentityCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
