//! Sliding-expiration memo cache.
//!
//! Each entry remembers when it was last handed out. An entry idle for longer
//! than the window is treated as absent and recomputed on the next lookup.
//! Expiry is evaluated lazily on access; nothing sweeps in the background.
//!
//! # Concurrency
//!
//! Every storage key owns a slot mutex. A lookup locks only its slot while the
//! factory runs, so concurrent lookups of one key run the factory once and the
//! rest observe its result, while other keys proceed independently.

use affconf_core::{elapsed_between, AffconfResult, BackendError, Clock, Timestamp};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::stats::CacheStats;

type Projection<K> = Box<dyn Fn(&K) -> K + Send + Sync>;
type Factory<K, V> = Box<dyn Fn(&K) -> AffconfResult<V> + Send + Sync>;
type Slot<V> = Arc<Mutex<Option<CacheEntry<V>>>>;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    last_access: Timestamp,
}

/// Memo cache with per-entry sliding expiration.
pub struct SlidingCache<K, V> {
    window: Duration,
    clock: Arc<dyn Clock>,
    project: Projection<K>,
    factory: Factory<K, V>,
    slots: Mutex<HashMap<K, Slot<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> SlidingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache whose storage key is the lookup key itself.
    pub fn new<F>(window: Duration, clock: Arc<dyn Clock>, factory: F) -> Self
    where
        F: Fn(&K) -> AffconfResult<V> + Send + Sync + 'static,
        K: 'static,
    {
        Self {
            window,
            clock,
            project: Box::new(K::clone),
            factory: Box::new(factory),
            slots: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Map lookup keys to storage keys before caching (e.g. normalisation).
    pub fn with_key_projection<P>(mut self, project: P) -> Self
    where
        P: Fn(&K) -> K + Send + Sync + 'static,
    {
        self.project = Box::new(project);
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: Timestamp) -> bool {
        elapsed_between(entry.last_access, now) > self.window
    }

    fn slot(&self, storage_key: &K) -> AffconfResult<Slot<V>> {
        let mut slots = self.slots.lock().map_err(|_| BackendError::LockPoisoned)?;
        Ok(Arc::clone(slots.entry(storage_key.clone()).or_default()))
    }

    /// Remove an empty slot from the map unless another lookup holds it.
    ///
    /// Clones are only taken under the map lock, so the count is exact here.
    fn release_if_unused(&self, storage_key: &K, slot: &Slot<V>) -> AffconfResult<()> {
        let mut slots = self.slots.lock().map_err(|_| BackendError::LockPoisoned)?;
        let unused = slots
            .get(storage_key)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2);
        if unused {
            slots.remove(storage_key);
        }
        Ok(())
    }

    /// Return the live value for `key`, computing it if absent or expired.
    ///
    /// A factory failure leaves nothing cached; the next lookup retries.
    pub fn get(&self, key: &K) -> AffconfResult<V> {
        let storage_key = (self.project)(key);
        let slot = self.slot(&storage_key)?;
        let mut entry = slot.lock().map_err(|_| BackendError::LockPoisoned)?;

        let now = self.clock.now();
        if let Some(live) = entry.as_mut() {
            if !self.is_expired(live, now) {
                live.last_access = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(live.value.clone());
            }
            self.evictions.fetch_add(1, Ordering::Relaxed);
            *entry = None;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = match (self.factory)(&storage_key) {
            Ok(value) => value,
            Err(err) => {
                drop(entry);
                self.release_if_unused(&storage_key, &slot)?;
                return Err(err);
            }
        };
        *entry = Some(CacheEntry {
            value: value.clone(),
            last_access: self.clock.now(),
        });
        Ok(value)
    }

    /// Drop the entry for `key`, if any.
    pub fn invalidate(&self, key: &K) -> AffconfResult<()> {
        let storage_key = (self.project)(key);
        self.slots
            .lock()
            .map_err(|_| BackendError::LockPoisoned)?
            .remove(&storage_key);
        Ok(())
    }

    pub fn clear(&self) -> AffconfResult<()> {
        self.slots
            .lock()
            .map_err(|_| BackendError::LockPoisoned)?
            .clear();
        Ok(())
    }

    /// Remove expired and empty slots. Returns how many expired entries went.
    pub fn purge_expired(&self) -> AffconfResult<u64> {
        let now = self.clock.now();
        let mut slots = self.slots.lock().map_err(|_| BackendError::LockPoisoned)?;
        let mut purged = 0u64;
        slots.retain(|_, slot| {
            // Held by a lookup that has not locked it yet.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(entry) => match entry.as_ref() {
                    Some(live) if self.is_expired(live, now) => {
                        purged += 1;
                        false
                    }
                    Some(_) => true,
                    None => false,
                },
                Err(_) => true,
            }
        });
        self.evictions.fetch_add(purged, Ordering::Relaxed);
        Ok(purged)
    }

    /// Number of live (present and unexpired) entries.
    pub fn len(&self) -> AffconfResult<usize> {
        let now = self.clock.now();
        let slots: Vec<Slot<V>> = self
            .slots
            .lock()
            .map_err(|_| BackendError::LockPoisoned)?
            .values()
            .cloned()
            .collect();
        let mut live = 0;
        for slot in slots {
            let entry = slot.lock().map_err(|_| BackendError::LockPoisoned)?;
            if entry.as_ref().is_some_and(|e| !self.is_expired(e, now)) {
                live += 1;
            }
        }
        Ok(live)
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> AffconfResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn stats(&self) -> AffconfResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len()? as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}

impl<K, V> std::fmt::Debug for SlidingCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingCache")
            .field("window", &self.window)
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use affconf_core::{AffconfError, LookupError, ManualClock};
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn counting_cache(
        clock: Arc<ManualClock>,
        window: Duration,
    ) -> (Arc<SlidingCache<String, usize>>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = SlidingCache::new(window, clock, move |key: &String| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(key.len() * 100 + n)
        });
        (Arc::new(cache), calls)
    }

    #[test]
    fn test_hit_reuses_value() {
        let clock = Arc::new(ManualClock::new());
        let (cache, calls) = counting_cache(clock, Duration::from_secs(10));

        let first = cache.get(&"App1".to_string()).unwrap();
        let second = cache.get(&"App1".to_string()).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[test]
    fn test_idle_entry_is_recomputed() {
        let clock = Arc::new(ManualClock::new());
        let (cache, calls) = counting_cache(Arc::clone(&clock), Duration::from_secs(10));

        cache.get(&"App1".to_string()).unwrap();
        clock.advance(Duration::from_secs(11));
        cache.get(&"App1".to_string()).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().unwrap().evictions, 1);
    }

    #[test]
    fn test_access_slides_the_window() {
        let clock = Arc::new(ManualClock::new());
        let (cache, calls) = counting_cache(Arc::clone(&clock), Duration::from_secs(10));

        cache.get(&"App1".to_string()).unwrap();
        for _ in 0..5 {
            clock.advance(Duration::from_secs(8));
            cache.get(&"App1".to_string()).unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let clock = Arc::new(ManualClock::new());
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let cache: SlidingCache<String, String> =
            SlidingCache::new(Duration::from_secs(10), clock, move |key: &String| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(AffconfError::from(LookupError::ApplicationNotFound {
                        name: key.clone(),
                    }))
                } else {
                    Ok(key.to_uppercase())
                }
            });

        assert!(cache.get(&"app".to_string()).is_err());
        assert_eq!(cache.len().unwrap(), 0);
        assert_eq!(cache.get(&"app".to_string()).unwrap(), "APP");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_key_projection_shares_entries() {
        let clock = Arc::new(ManualClock::new());
        let (cache, calls) = counting_cache(clock, Duration::from_secs(10));
        let cache = Arc::try_unwrap(cache)
            .unwrap()
            .with_key_projection(|key: &String| key.to_lowercase());

        cache.get(&"App1".to_string()).unwrap();
        cache.get(&"APP1".to_string()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let clock = Arc::new(ManualClock::new());
        let (cache, calls) = counting_cache(clock, Duration::from_secs(10));

        cache.get(&"App1".to_string()).unwrap();
        cache.invalidate(&"App1".to_string()).unwrap();
        cache.get(&"App1".to_string()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_purge_expired() {
        let clock = Arc::new(ManualClock::new());
        let (cache, _) = counting_cache(Arc::clone(&clock), Duration::from_secs(10));

        cache.get(&"old".to_string()).unwrap();
        clock.advance(Duration::from_secs(6));
        cache.get(&"young".to_string()).unwrap();
        clock.advance(Duration::from_secs(6));

        assert_eq!(cache.purge_expired().unwrap(), 1);
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_gets_run_factory_once() {
        let clock = Arc::new(ManualClock::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = Arc::new(SlidingCache::new(
            Duration::from_secs(60),
            clock,
            move |key: &String| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                Ok(key.clone())
            },
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get(&"shared".to_string()).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "shared");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_lookups_leave_no_slots() {
        let clock = Arc::new(ManualClock::new());
        let cache: SlidingCache<String, String> =
            SlidingCache::new(Duration::from_secs(10), clock, |key: &String| {
                if key.starts_with("missing") {
                    Err(AffconfError::from(LookupError::ApplicationNotFound {
                        name: key.clone(),
                    }))
                } else {
                    Ok(key.clone())
                }
            });

        for i in 0..100 {
            assert!(cache.get(&format!("missing-{}", i)).is_err());
        }
        cache.get(&"present".to_string()).unwrap();
        assert_eq!(cache.slot_count(), 1);
    }

    #[test]
    fn test_purge_reclaims_expired_slots() {
        let clock = Arc::new(ManualClock::new());
        let (cache, _) = counting_cache(Arc::clone(&clock), Duration::from_secs(10));
        for i in 0..50 {
            cache.get(&format!("key-{}", i)).unwrap();
        }
        clock.advance(Duration::from_secs(3600));
        cache.get(&"key-0".to_string()).unwrap();

        assert_eq!(cache.purge_expired().unwrap(), 49);
        assert_eq!(cache.slot_count(), 1);
    }

    #[test]
    fn test_purge_keeps_slot_held_by_pending_lookup() {
        let clock = Arc::new(ManualClock::new());
        let (cache, calls) = counting_cache(clock, Duration::from_secs(10));
        let key = "pending".to_string();

        let held = cache.slot(&key).unwrap();
        assert_eq!(cache.purge_expired().unwrap(), 0);
        assert_eq!(cache.slot_count(), 1);
        assert!(Arc::ptr_eq(&held, &cache.slot(&key).unwrap()));

        drop(held);
        cache.get(&key).unwrap();
        cache.get(&key).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
