//! Lazily grown concurrent map with atomic get-or-create.

use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use super::FastHashMap;

/// Associative structure shared between threads.
///
/// Values are handed out as `Arc<V>` so callers can keep using them (for
/// example, holding a lock stored in the map) after the map lock is released.
/// `get_or_add` runs the factory at most once per key: the read path is
/// lock-shared, the miss path re-checks under the exclusive lock.
pub(crate) struct ConcurrentMap<K, V> {
    inner: RwLock<FastHashMap<K, Arc<V>>>,
}

impl<K: Eq + Hash + Clone, V> ConcurrentMap<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            inner: RwLock::new(FastHashMap::default()),
        }
    }

    #[inline]
    pub(crate) fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.read().get(key).cloned()
    }

    /// Returns the value for `key`, creating it with `factory` on a miss.
    pub(crate) fn get_or_add<F>(&self, key: &K, factory: F) -> Arc<V>
    where
        F: FnOnce(&K) -> V,
    {
        if let Some(value) = self.inner.read().get(key) {
            return value.clone();
        }

        let mut map = self.inner.write();
        map.entry(key.clone())
            .or_insert_with(|| Arc::new(factory(key)))
            .clone()
    }

    /// Stores `value` unless the key is already present; returns the stored value.
    pub(crate) fn get_or_insert(&self, key: K, value: Arc<V>) -> Arc<V> {
        self.inner.write().entry(key).or_insert(value).clone()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub(crate) fn clear(&self) {
        self.inner.write().clear();
    }

    #[cfg(feature = "diagnostics")]
    pub(crate) fn values(&self) -> Vec<Arc<V>> {
        self.inner.read().values().cloned().collect()
    }
}
