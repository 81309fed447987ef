//! ResolveCache — bounded cache correlating two-phase list/resolve requests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

/// Default number of candidate lists kept alive at once.
pub const DEFAULT_CAPACITY: usize = 3;

/// Bounded key → opaque-payload cache.
///
/// A "produce candidate list" response stores its context here and carries
/// only the small key on the wire; the paired "resolve one candidate"
/// request presents the key to recover that context. Entries are evicted
/// oldest-first when capacity is exceeded and are never promoted on access:
/// the two-phase pattern touches an entry only briefly after creation, but
/// one list may serve several resolve calls, so lookups do not consume.
pub struct ResolveCache {
    capacity: usize,
    next_key: AtomicU64,
    entries: Mutex<VecDeque<(u64, Value)>>,
}

impl ResolveCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_key: AtomicU64::new(0),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Insert a payload, evicting the oldest surviving entry if the cache
    /// is full. Returns the key the client will echo back.
    pub fn put(&self, payload: Value) -> u64 {
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back((key, payload));
        key
    }

    /// Look up a payload by key; absent once evicted.
    pub fn try_get(&self, key: u64) -> Option<Value> {
        let entries = self.entries.lock();
        entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone())
    }
}

impl Default for ResolveCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// Registry-managed so the list and resolve handlers share one instance.
impl crate::registry::Service for ResolveCache {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_then_get_round_trips() {
        let cache = ResolveCache::default();
        let key = cache.put(json!({"list": [1, 2, 3]}));
        assert_eq!(cache.try_get(key), Some(json!({"list": [1, 2, 3]})));
    }

    #[test]
    fn fourth_insert_evicts_exactly_the_first() {
        let cache = ResolveCache::new(3);
        let k0 = cache.put(json!(0));
        let k1 = cache.put(json!(1));
        let k2 = cache.put(json!(2));
        let k3 = cache.put(json!(3));
        assert_eq!(cache.try_get(k0), None);
        assert_eq!(cache.try_get(k1), Some(json!(1)));
        assert_eq!(cache.try_get(k2), Some(json!(2)));
        assert_eq!(cache.try_get(k3), Some(json!(3)));
    }

    #[test]
    fn lookups_do_not_consume_entries() {
        let cache = ResolveCache::new(3);
        let key = cache.put(json!("ctx"));
        assert!(cache.try_get(key).is_some());
        assert!(cache.try_get(key).is_some());
    }

    #[test]
    fn keys_stay_unique_across_eviction() {
        let cache = ResolveCache::new(3);
        let mut keys = Vec::new();
        for i in 0..10 {
            keys.push(cache.put(json!(i)));
        }
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
    }
}
