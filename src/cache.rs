use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::directory::Directory;

/// Directories kept hot per reader unless told otherwise.
pub const DEFAULT_CACHE_CAPACITY: usize = 20;

/// Recency-ordered cache of decoded leaf directories, keyed by the byte
/// offset of the directory block in the archive.
///
/// `get` promotes the key to most-recently-used; `set` inserts at the front
/// and evicts from the tail once the fixed capacity is exceeded.
#[derive(Debug)]
pub struct DirectoryCache {
    inner: LruCache<u64, Arc<Directory>>,
}

impl DirectoryCache {
    /// Create a cache bounded to `capacity` directories (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, offset: u64) -> Option<Arc<Directory>> {
        self.inner.get(&offset).cloned()
    }

    pub fn set(&mut self, offset: u64, directory: Arc<Directory>) {
        self.inner.put(offset, directory);
    }

    pub fn delete(&mut self, offset: u64) -> bool {
        self.inner.pop(&offset).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for DirectoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::directory::Entry;

    fn directory(tag: u64) -> Arc<Directory> {
        Arc::new(Directory::new(vec![Entry::new(tag, 0, 0, 1)]))
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let mut cache = DirectoryCache::new(3);
        for offset in 0..5u64 {
            cache.set(offset, directory(offset));
        }

        assert_eq!(cache.len(), 3);
        assert!(cache.get(0).is_none());
        assert!(cache.get(1).is_none());
        for offset in 2..5u64 {
            assert_eq!(cache.get(offset).unwrap().entries[0].tile_id, offset);
        }
    }

    #[test]
    fn test_get_promotes_to_front() {
        let mut cache = DirectoryCache::new(2);
        cache.set(1, directory(1));
        cache.set(2, directory(2));

        // touch 1 so 2 becomes the eviction candidate
        assert!(cache.get(1).is_some());
        cache.set(3, directory(3));

        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());
        assert!(cache.get(3).is_some());
    }

    #[test]
    fn test_delete() {
        let mut cache = DirectoryCache::new(2);
        cache.set(1, directory(1));

        assert!(cache.delete(1));
        assert!(!cache.delete(1));
        assert!(cache.get(1).is_none());
        assert!(cache.is_empty());
    }
}
