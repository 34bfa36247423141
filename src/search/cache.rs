use std::collections::HashMap;

use parking_lot::RwLock;

use super::schema::ScoredResult;

/// Best-effort in-memory result cache / 搜索结果缓存
///
/// Keyed by normalized query plus the filter fingerprint the caller builds
/// into the key. Purely an optimization: a miss falls back to recomputation
/// and correctness never depends on an entry being present. Callers must
/// clear it whenever the catalog changes.
pub struct SearchCache {
    entries: RwLock<HashMap<String, Vec<ScoredResult>>>,
    capacity: usize,
}

impl SearchCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<ScoredResult>> {
        self.entries.read().get(key).cloned()
    }

    /// Insert a result set; when full the whole cache is flushed first.
    /// 满了就整体清空，简单且足够。
    pub fn put(&self, key: String, results: Vec<ScoredResult>) {
        let mut entries = self.entries.write();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.clear();
        }
        entries.insert(key, results);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put_clear() {
        let cache = SearchCache::new(4);
        assert!(cache.get("smart rack").is_none());

        cache.put("smart rack".to_string(), Vec::new());
        assert!(cache.get("smart rack").is_some());
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("smart rack").is_none());
    }

    #[test]
    fn test_flush_on_full() {
        let cache = SearchCache::new(2);
        cache.put("a".to_string(), Vec::new());
        cache.put("b".to_string(), Vec::new());
        assert_eq!(cache.len(), 2);

        // 第三条触发整体清空后再插入
        cache.put("c".to_string(), Vec::new());
        assert_eq!(cache.len(), 1);
        assert!(cache.get("c").is_some());
        assert!(cache.get("a").is_none());

        // 覆盖已有键不触发清空
        cache.put("c".to_string(), Vec::new());
        assert_eq!(cache.len(), 1);
    }
}
