use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::types::{CacheStats, EffectiveSearchParameters};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    payload: serde_json::Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() <= self.ttl
    }
}

/// In-memory TTL cache for upstream search payloads. Expired entries are
/// dropped lazily on read and swept in bulk when the entry count passes
/// `max_entries` after an insert.
pub struct ResultCache {
    entries: HashMap<String, CacheEntry>,
    max_entries: usize,
}

impl ResultCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
        }
    }

    /// Canonical cache key for an effective parameter set. Pairs are sorted
    /// before joining, so the key never depends on field ordering.
    pub fn cache_key(params: &EffectiveSearchParameters) -> String {
        canonical_key(&params.to_query_pairs())
    }

    pub fn get(&mut self, key: &str) -> Option<serde_json::Value> {
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh() => {
                debug!(key, "cache hit");
                Some(entry.payload.clone())
            }
            Some(_) => {
                debug!(key, "cache entry expired");
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&mut self, key: String, payload: serde_json::Value, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                payload,
                stored_at: Instant::now(),
                ttl,
            },
        );
        if self.entries.len() > self.max_entries {
            let before = self.entries.len();
            self.entries.retain(|_, e| e.is_fresh());
            debug!(removed = before - self.entries.len(), "cache sweep");
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Valid/expired split uses the same freshness rule as `get`; byte size
    /// is the serialized size of all stored payloads.
    pub fn stats(&self) -> CacheStats {
        let valid = self.entries.values().filter(|e| e.is_fresh()).count();
        let approximate_bytes = self
            .entries
            .values()
            .map(|e| e.payload.to_string().len())
            .sum();
        CacheStats {
            total: self.entries.len(),
            valid,
            expired: self.entries.len() - valid,
            approximate_bytes,
        }
    }
}

fn canonical_key(pairs: &[(String, String)]) -> String {
    let sorted: BTreeMap<&str, &str> = pairs
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(query: &str, page: u32) -> EffectiveSearchParameters {
        EffectiveSearchParameters {
            query: Some(query.into()),
            near: Some("Austin,TX,US".into()),
            lat_lon: None,
            bbox: None,
            geo_points: None,
            radius: Some(10),
            category: None,
            topic: None,
            start_date: None,
            end_date: None,
            exclude_children: Some(true),
            kids: None,
            registerable_only: None,
            current_page: page,
            per_page: 25,
            sort: None,
            attributes: None,
            tags: None,
            exists: None,
            facets: None,
        }
    }

    #[test]
    fn key_is_deterministic() {
        assert_eq!(
            ResultCache::cache_key(&params("yoga", 1)),
            ResultCache::cache_key(&params("yoga", 1))
        );
        assert_ne!(
            ResultCache::cache_key(&params("yoga", 1)),
            ResultCache::cache_key(&params("yoga", 2))
        );
    }

    #[test]
    fn key_ignores_pair_order() {
        let a = vec![
            ("query".to_string(), "yoga".to_string()),
            ("near".to_string(), "Austin,TX,US".to_string()),
            ("per_page".to_string(), "25".to_string()),
        ];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(canonical_key(&a), canonical_key(&b));
    }

    #[test]
    fn serves_fresh_and_expires_stale() {
        let mut cache = ResultCache::new(100);
        cache.put("k".into(), json!({"v": 1}), Duration::from_millis(40));
        assert_eq!(cache.get("k"), Some(json!({"v": 1})));

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get("k"), None);
        // expiry detected at read deletes the entry
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn put_overwrites_existing_entry() {
        let mut cache = ResultCache::new(100);
        cache.put("k".into(), json!(1), DEFAULT_TTL);
        cache.put("k".into(), json!(2), DEFAULT_TTL);
        assert_eq!(cache.get("k"), Some(json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn sweep_removes_all_expired_past_threshold() {
        let mut cache = ResultCache::new(100);
        for i in 0..100 {
            cache.put(format!("k{i}"), json!(i), Duration::ZERO);
        }
        assert_eq!(cache.len(), 100);
        // 101st insert trips the full sweep of expired entries
        cache.put("fresh".into(), json!("x"), DEFAULT_TTL);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(json!("x")));
    }

    #[test]
    fn stats_split_by_freshness() {
        let mut cache = ResultCache::new(100);
        cache.put("live".into(), json!({"a": 1}), DEFAULT_TTL);
        cache.put("dead".into(), json!({"b": 2}), Duration::ZERO);
        let stats = cache.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.expired, 1);
        assert!(stats.approximate_bytes > 0);
    }

    #[test]
    fn clear_and_remove() {
        let mut cache = ResultCache::new(100);
        cache.put("a".into(), json!(1), DEFAULT_TTL);
        cache.put("b".into(), json!(2), DEFAULT_TTL);
        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert_eq!(cache.clear(), 1);
        assert!(cache.is_empty());
    }
}
