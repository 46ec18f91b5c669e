//! Time-bounded LRU cache for routing-service answers.
//!
//! Keyed by the exact coordinate sequence of a request. The cache is a pure
//! optimisation: a miss (including a poisoned lock) only costs a service call.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use super::{Route, RoutingConfig, Waypoint};

struct CachedRoute {
    route: Route,
    stored_at: Instant,
}

/// Thread-safe route cache, meant to be shared through an `Arc` across flight runs.
pub struct RouteCache {
    entries: Mutex<LruCache<String, CachedRoute>>,
    ttl: Duration,
}

impl RouteCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(config.cache_capacity, Duration::from_secs(config.cache_ttl_secs))
    }

    /// `lng,lat` pairs joined by `;`, six decimals (about 0.1 m).
    pub fn key_for(waypoints: &[Waypoint]) -> String {
        waypoints
            .iter()
            .map(|w| format!("{:.6},{:.6}", w.longitude, w.latitude))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`, if any. Expired entries are evicted on access.
    pub fn get(&self, key: &str) -> Option<Route> {
        let mut entries = self.entries.lock().ok()?;
        let expired = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return Some(entry.route.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    pub fn set(&self, key: String, route: Route) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key,
                CachedRoute {
                    route,
                    stored_at: Instant::now(),
                },
            );
        }
    }

    /// Evict every expired entry; returns how many were removed.
    pub fn expire(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.stored_at.elapsed() >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl Default for RouteCache {
    fn default() -> Self {
        Self::from_config(&RoutingConfig::default())
    }
}

impl std::fmt::Debug for RouteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::routing::{greedy_route, DEFAULT_AVERAGE_SPEED_KMH};

    fn sample() -> (String, Route) {
        let waypoints = vec![
            Waypoint::airport("MUC", Coordinate::new(48.3538, 11.7861)),
            Waypoint::airport("X", Coordinate::new(48.1372, 11.5755)),
        ];
        (
            RouteCache::key_for(&waypoints),
            greedy_route(&waypoints, DEFAULT_AVERAGE_SPEED_KMH),
        )
    }

    #[test]
    fn key_is_coordinate_sequence() {
        let (key, _) = sample();
        assert_eq!(key, "11.786100,48.353800;11.575500,48.137200");
    }

    #[test]
    fn get_returns_stored_route() {
        let cache = RouteCache::new(4, Duration::from_secs(3600));
        let (key, route) = sample();
        assert!(cache.get(&key).is_none());
        cache.set(key.clone(), route.clone());
        assert_eq!(cache.get(&key), Some(route));
    }

    #[test]
    fn zero_ttl_entries_expire_immediately() {
        let cache = RouteCache::new(4, Duration::ZERO);
        let (key, route) = sample();
        cache.set(key.clone(), route);
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());

        cache.set(key, sample().1);
        assert_eq!(cache.expire(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_is_bounded() {
        let cache = RouteCache::new(1, Duration::from_secs(3600));
        let (_, route) = sample();
        cache.set("a".to_string(), route.clone());
        cache.set("b".to_string(), route);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a").is_none());
    }
}
