use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use chime_scheduler::store::CacheInvalidator;

/// In-process cache of registry snapshots, keyed by (group, tier).
///
/// The run-state store invalidates it as part of every locked update, so a
/// reader can never serve a `last_run` older than the latest claim.
pub struct RegistryCache {
    entries: DashMap<(String, i64), Value>,
}

impl RegistryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, group: &str, tier: i64) -> Option<Value> {
        self.entries
            .get(&(group.to_string(), tier))
            .map(|entry| entry.value().clone())
    }

    pub fn put(&self, group: &str, tier: i64, value: Value) {
        self.entries.insert((group.to_string(), tier), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RegistryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheInvalidator for RegistryCache {
    fn invalidate(&self, groups: &[&str], tiers: &[i64]) {
        for group in groups {
            for tier in tiers {
                if self
                    .entries
                    .remove(&((*group).to_string(), *tier))
                    .is_some()
                {
                    debug!(group, tier, "registry cache invalidated");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_get_round_trip() {
        let cache = RegistryCache::new();
        assert!(cache.get("registry", 0).is_none());

        cache.put("registry", 0, json!({"tasks": []}));
        assert_eq!(cache.get("registry", 0), Some(json!({"tasks": []})));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn invalidate_clears_only_named_entries() {
        let cache = RegistryCache::new();
        cache.put("registry", 0, json!(1));
        cache.put("registry", 1, json!(2));
        cache.put("other", 0, json!(3));

        cache.invalidate(&["registry"], &[0, 1]);

        assert!(cache.get("registry", 0).is_none());
        assert!(cache.get("registry", 1).is_none());
        assert_eq!(cache.get("other", 0), Some(json!(3)));
    }

    #[test]
    fn invalidating_an_empty_cache_is_harmless() {
        let cache = RegistryCache::new();
        cache.invalidate(&["registry"], &[0, 1]);
        assert!(cache.is_empty());
    }
}
