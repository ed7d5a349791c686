use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Default lifetime of a cached provider response (30 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Source of the current time for expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A thread-safe cache with per-entry TTL support.
///
/// Expired entries are dropped lazily when read. Concurrent misses on the
/// same key are serialized so only one caller runs the compute closure while
/// the others wait and then read its result.
pub struct TtlCache<K, V> {
    data: DashMap<K, CacheEntry<V>>,
    in_flight: DashMap<K, Arc<Mutex<()>>>,
    clock: Arc<dyn Clock>,
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a new cache using the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a new cache reading time from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            data: DashMap::new(),
            in_flight: DashMap::new(),
            clock,
        }
    }

    /// Get a value from the cache if it exists and hasn't expired
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.data.get(key)?;
        if entry.expires_at > self.clock.now() {
            Some(entry.value.clone())
        } else {
            drop(entry);
            self.data.remove(key);
            None
        }
    }

    /// Insert a value into the cache, replacing any previous entry
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: self.clock.now() + ttl,
        };
        self.data.insert(key, entry);
    }

    /// Return the live value for `key`, or run `compute` once and cache its
    /// `Ok` result for `ttl`. `Err` results are returned without being stored.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, ttl: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            metrics::counter!("weather_cache_hits_total").increment(1);
            return Ok(value);
        }

        let lock = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        // Another caller may have filled the entry while we waited
        let result = match self.get(&key) {
            Some(value) => {
                metrics::counter!("weather_cache_hits_total").increment(1);
                Ok(value)
            }
            None => {
                metrics::counter!("weather_cache_misses_total").increment(1);
                let computed = compute().await;
                if let Ok(value) = &computed {
                    self.insert(key.clone(), value.clone(), ttl);
                }
                computed
            }
        };

        drop(guard);
        drop(lock);

        // The map's own reference is the only one left once every waiter is done
        self.in_flight
            .remove_if(&key, |_, l| Arc::strong_count(l) == 1);

        result
    }

    /// Get the number of entries in the cache (including expired ones)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Number of entries that have not expired yet
    pub fn live_len(&self) -> usize {
        let now = self.clock.now();
        self.data
            .iter()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize free text for use inside a cache key
/// Converts to lowercase and trims whitespace
pub fn normalize_cache_key(text: &str) -> String {
    text.trim().to_lowercase()
}
