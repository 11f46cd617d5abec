//! In-memory memoizing cache with per-call TTL.

use std::collections::HashMap;
use std::convert::Infallible;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, instrument, trace, warn};

use ordo_core::config::CacheConfig;
use ordo_core::constants::MAX_PREALLOCATED_ENTRIES;
use ordo_core::traits::{Clock, SystemClock};

/// Memoized result with its expiry.
#[derive(Clone)]
struct CacheEntry<R> {
    result: R,
    /// None when `now + ttl` overflows the clock; such entries never expire.
    expires_at: Option<Instant>,
}

impl<R> CacheEntry<R> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
}

/// Memoizing cache keyed by the computation's input.
///
/// Thread-safe. Lookups of live entries share a read lock; recomputation is
/// serialized per key so at most one computation for a given key runs at a
/// time, while distinct keys compute independently. The table lock is never
/// held while a caller's function runs.
///
/// # Growth
///
/// With the default configuration the table is unbounded: an entry is kept
/// for every distinct key ever computed, and stale entries are only replaced
/// when their key is requested again. Call [`MemoCache::purge_expired`] or set
/// [`CacheConfig::max_entries`] to bound memory.
///
/// # Re-entrancy
///
/// A function may call back into the cache for a *different* key. Requesting
/// the key currently being computed from inside its own function deadlocks.
pub struct MemoCache<K, R, C = SystemClock> {
    entries: RwLock<HashMap<K, CacheEntry<R>>>,
    in_flight: DashMap<K, Arc<Mutex<()>>>,
    counters: Counters,
    config: CacheConfig,
    clock: C,
}

impl<K, R> MemoCache<K, R, SystemClock>
where
    K: Eq + Hash + Clone,
    R: Clone,
{
    /// Creates an unbounded cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, R> Default for MemoCache<K, R, SystemClock>
where
    K: Eq + Hash + Clone,
    R: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, R, C> MemoCache<K, R, C>
where
    K: Eq + Hash + Clone,
    R: Clone,
    C: Clock,
{
    /// Creates a cache reading time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        let capacity = config
            .max_entries
            .map_or(0, |max| max.min(MAX_PREALLOCATED_ENTRIES));
        Self {
            entries: RwLock::new(HashMap::with_capacity(capacity)),
            in_flight: DashMap::new(),
            counters: Counters::default(),
            config,
            clock,
        }
    }

    /// Returns the live result for `key`, computing it with `function` if
    /// there is none.
    ///
    /// The result is kept for `ttl`. A zero TTL stores an entry that is already
    /// stale, so every call recomputes.
    pub fn execute<F>(&self, key: K, function: F, ttl: Duration) -> R
    where
        F: FnOnce(&K) -> R,
    {
        match self.try_execute(key, |k| Ok::<R, Infallible>(function(k)), ttl) {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }

    /// Like [`MemoCache::execute`] with the TTL in whole seconds.
    ///
    /// Zero or negative values disable caching for this call.
    pub fn execute_secs<F>(&self, key: K, function: F, ttl_seconds: i64) -> R
    where
        F: FnOnce(&K) -> R,
    {
        let ttl = u64::try_from(ttl_seconds).map_or(Duration::ZERO, Duration::from_secs);
        self.execute(key, function, ttl)
    }

    /// Like [`MemoCache::execute`] with the configured default TTL.
    pub fn execute_default<F>(&self, key: K, function: F) -> R
    where
        F: FnOnce(&K) -> R,
    {
        self.execute(key, function, self.config.default_ttl_duration())
    }

    /// Fallible form of [`MemoCache::execute`].
    ///
    /// If `function` returns `Err`, nothing is written (a stale entry for the
    /// key stays exactly as it was) and the error is returned unchanged.
    #[instrument(
        level = "trace",
        skip_all,
        fields(ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
    )]
    pub fn try_execute<F, E>(&self, key: K, function: F, ttl: Duration) -> Result<R, E>
    where
        F: FnOnce(&K) -> Result<R, E>,
    {
        if let Some(hit) = self.lookup(&key) {
            self.count(&self.counters.hits);
            trace!("Cache hit");
            return Ok(hit);
        }

        // `_held` drops before `flight` on every exit, unwinding included.
        let flight = Flight::join(&self.in_flight, &key);
        let _held = flight.hold();

        // Filled by another caller while we waited on the flight lock.
        if let Some(hit) = self.lookup(&key) {
            self.count(&self.counters.hits);
            trace!("Cache hit after waiting on in-flight computation");
            return Ok(hit);
        }

        self.count(&self.counters.misses);
        debug!("Computing cache entry");

        let outcome = function(&key);
        match &outcome {
            Ok(result) => {
                let expires_at = self.clock.now().checked_add(ttl);
                self.store(key.clone(), result.clone(), expires_at);
            }
            Err(_) => {
                self.count(&self.counters.failures);
                warn!("Computation failed; cache left unchanged");
            }
        }

        outcome
    }

    /// Returns the live result for `key` without computing anything.
    pub fn get(&self, key: &K) -> Option<R> {
        self.lookup(key)
    }

    /// Removes the entry for `key`. Returns true if one was present.
    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Clears all cached entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "Purged expired entries");
        }
        purged
    }

    /// Returns the number of stored entries, live or stale.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.entries.read();
        let expired = entries.values().filter(|e| !e.is_live(now)).count();

        CacheStats {
            total_entries: entries.len(),
            live_entries: entries.len() - expired,
            expired_entries: expired,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            capacity: self.config.max_entries,
        }
    }

    fn lookup(&self, key: &K) -> Option<R> {
        let now = self.clock.now();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.result.clone())
    }

    fn store(&self, key: K, result: R, expires_at: Option<Instant>) {
        let mut entries = self.entries.write();

        if let Some(max) = self.config.max_entries {
            if !entries.contains_key(&key) && entries.len() >= max {
                self.make_room(&mut entries, max);
            }
        }

        entries.insert(key, CacheEntry { result, expires_at });
    }

    /// Purges expired entries, then evicts the soonest-expiring one if the
    /// table is still full.
    fn make_room(&self, entries: &mut HashMap<K, CacheEntry<R>>, max: usize) {
        let now = self.clock.now();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let mut evicted = before - entries.len();

        if entries.len() >= max {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, e)| (e.expires_at.is_none(), e.expires_at))
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.counters
                .evictions
                .fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, max, "Evicted entries to stay within capacity");
        }
    }

    fn count(&self, counter: &AtomicU64) {
        if self.config.track_stats {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// A caller's share of the per-key flight lock.
///
/// Dropping it removes the key's lock from the map once no other caller
/// holds or waits on it.
struct Flight<'a, K: Eq + Hash> {
    in_flight: &'a DashMap<K, Arc<Mutex<()>>>,
    key: &'a K,
    lock: Option<Arc<Mutex<()>>>,
}

impl<'a, K: Eq + Hash + Clone> Flight<'a, K> {
    fn join(in_flight: &'a DashMap<K, Arc<Mutex<()>>>, key: &'a K) -> Self {
        let lock = in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Self {
            in_flight,
            key,
            lock: Some(lock),
        }
    }

    /// Blocks until no other caller is computing this key.
    fn hold(&self) -> Option<MutexGuard<'_, ()>> {
        self.lock.as_ref().map(|lock| lock.lock())
    }
}

impl<K: Eq + Hash> Drop for Flight<'_, K> {
    fn drop(&mut self) {
        // Our reference goes first so the count below sees only the others.
        drop(self.lock.take());
        self.in_flight
            .remove_if(self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Cache statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheStats {
    /// Total entries (including expired)
    pub total_entries: usize,
    /// Entries still within their TTL
    pub live_entries: usize,
    /// Entries past their TTL, waiting to be overwritten or purged
    pub expired_entries: usize,
    /// Calls answered from the table
    pub hits: u64,
    /// Calls that ran the computation
    pub misses: u64,
    /// Computations that returned an error
    pub failures: u64,
    /// Entries dropped to respect `max_entries`
    pub evictions: u64,
    /// Configured bound (None = unbounded)
    pub capacity: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::AtomicUsize;
    use std::sync::{mpsc, Barrier};

    use ordo_core::traits::ManualClock;
    use test_case::test_case;

    fn manual_cache() -> (MemoCache<i64, i64, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (MemoCache::with_clock(CacheConfig::default(), clock.clone()), clock)
    }

    #[test]
    fn test_square_computed_once_within_ttl() {
        let cache = MemoCache::new();
        let calculations = AtomicUsize::new(0);
        let square = |x: &i64| {
            calculations.fetch_add(1, Ordering::SeqCst);
            x * x
        };

        assert_eq!(cache.execute_secs(4, square, 5), 16);
        assert_eq!(cache.execute_secs(4, square, 5), 16);
        assert_eq!(calculations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recompute_after_expiry() {
        let (cache, clock) = manual_cache();
        let calls = AtomicUsize::new(0);
        let compute = |x: &i64| x + calls.fetch_add(1, Ordering::SeqCst) as i64;

        assert_eq!(cache.execute(10, compute, Duration::from_secs(5)), 10);
        clock.advance(Duration::from_secs(4));
        assert_eq!(cache.execute(10, compute, Duration::from_secs(5)), 10);

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.execute(10, compute, Duration::from_secs(5)), 11);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entry_stale_exactly_at_expiry() {
        let (cache, clock) = manual_cache();
        cache.execute(1, |_| 100, Duration::from_secs(5));

        clock.advance(Duration::from_secs(5));
        assert!(cache.get(&1).is_none());
        assert_eq!(cache.execute(1, |_| 200, Duration::from_secs(5)), 200);
    }

    #[test_case(0 ; "zero")]
    #[test_case(-1 ; "negative")]
    #[test_case(i64::MIN ; "most negative")]
    fn test_non_positive_ttl_disables_caching(ttl_seconds: i64) {
        let (cache, _clock) = manual_cache();
        let calls = AtomicUsize::new(0);
        let compute = |_: &i64| calls.fetch_add(1, Ordering::SeqCst) as i64;

        for _ in 0..3 {
            cache.execute_secs(7, compute, ttl_seconds);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let (cache, clock) = manual_cache();
        cache.execute(1, |_| 1, Duration::MAX);
        clock.advance(Duration::from_secs(86_400 * 365));
        assert_eq!(cache.get(&1), Some(1));
    }

    #[test]
    fn test_execute_default_uses_config_ttl() {
        let clock = ManualClock::new();
        let config = CacheConfig::new().default_ttl_secs(2);
        let cache: MemoCache<&str, usize, _> = MemoCache::with_clock(config, clock.clone());

        assert_eq!(cache.execute_default("abc", |s| s.len()), 3);
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(&"abc"), Some(3));
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(&"abc"), None);
    }

    #[test]
    fn test_execute_default_one_second_ttl_caches() {
        let clock = ManualClock::new();
        let config = CacheConfig::new().default_ttl_secs(1);
        let cache: MemoCache<&str, usize, _> = MemoCache::with_clock(config, clock.clone());
        let calls = AtomicUsize::new(0);
        let len = |s: &&str| {
            calls.fetch_add(1, Ordering::SeqCst);
            s.len()
        };

        assert_eq!(cache.execute_default("abcd", len), 4);
        clock.advance(Duration::from_millis(999));
        assert_eq!(cache.execute_default("abcd", len), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_leaves_table_unchanged() {
        let (cache, clock) = manual_cache();
        cache.execute(1, |_| 10, Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));

        let err = cache
            .try_execute(1, |_| Err::<i64, _>("backend down"), Duration::from_secs(60))
            .unwrap_err();
        assert_eq!(err, "backend down");

        let missing = cache.try_execute(2, |_| Err::<i64, _>("nope"), Duration::from_secs(60));
        assert!(missing.is_err());

        // The stale entry for 1 is still there and still stale; 2 was never written.
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&1).is_none());
        assert_eq!(cache.stats().expired_entries, 1);
        assert_eq!(cache.stats().failures, 2);

        let ok: Result<i64, &str> = cache.try_execute(1, |_| Ok(11), Duration::from_secs(60));
        assert_eq!(ok, Ok(11));
    }

    #[test]
    fn test_panic_leaves_table_unchanged() {
        let (cache, _clock) = manual_cache();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            cache.execute(3, |_| panic!("computation exploded"), Duration::from_secs(60))
        }));
        assert!(outcome.is_err());
        assert!(cache.is_empty());
        assert!(cache.in_flight.is_empty());

        // The flight lock for the key was released during unwinding.
        assert_eq!(cache.execute(3, |x| x * 3, Duration::from_secs(60)), 9);
        assert!(cache.in_flight.is_empty());
    }

    #[test]
    fn test_repeated_panics_do_not_accumulate_flight_locks() {
        let (cache, _clock) = manual_cache();

        for key in 0..50 {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                cache.execute(key, |_| panic!("computation exploded"), Duration::from_secs(60))
            }));
            assert!(outcome.is_err());
        }

        assert!(cache.is_empty());
        assert!(cache.in_flight.is_empty());
    }

    #[test]
    fn test_distinct_keys_cached_independently() {
        let (cache, clock) = manual_cache();
        cache.execute(1, |_| 1, Duration::from_secs(1));
        cache.execute(2, |_| 2, Duration::from_secs(10));

        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(2));
    }

    #[test]
    fn test_nested_call_for_other_key() {
        let cache: MemoCache<u64, u64> = MemoCache::new();
        let ttl = Duration::from_secs(60);

        let outer = cache.execute(2, |x| x + cache.execute(1, |y| y * 100, ttl), ttl);
        assert_eq!(outer, 102);
        assert_eq!(cache.get(&1), Some(100));
    }

    #[test]
    fn test_unbounded_by_default() {
        let (cache, _clock) = manual_cache();
        for key in 0..2_000 {
            cache.execute(key, |k| *k, Duration::from_secs(60));
        }
        assert_eq!(cache.len(), 2_000);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.stats().capacity, None);
    }

    #[test]
    fn test_capacity_evicts_soonest_expiring() {
        let clock = ManualClock::new();
        let cache = MemoCache::with_clock(CacheConfig::new().max_entries(2), clock.clone());

        cache.execute(1, |_| 1, Duration::from_secs(30));
        cache.execute(2, |_| 2, Duration::from_secs(10));
        cache.execute(3, |_| 3, Duration::from_secs(20));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.get(&1), Some(1));
        assert_eq!(cache.get(&3), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_capacity_prefers_expired_entries() {
        let clock = ManualClock::new();
        let cache = MemoCache::with_clock(CacheConfig::new().max_entries(2), clock.clone());

        cache.execute(1, |_| 1, Duration::from_secs(1));
        cache.execute(2, |_| 2, Duration::from_secs(60));
        clock.advance(Duration::from_secs(2));

        cache.execute(3, |_| 3, Duration::from_secs(5));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&2), Some(2));
        assert_eq!(cache.get(&3), Some(3));
    }

    #[test]
    fn test_recompute_at_capacity_does_not_evict() {
        let clock = ManualClock::new();
        let cache = MemoCache::with_clock(CacheConfig::new().max_entries(2), clock.clone());

        cache.execute(1, |_| 1, Duration::from_secs(1));
        cache.execute(2, |_| 2, Duration::from_secs(60));
        clock.advance(Duration::from_secs(2));

        // Overwriting key 1 in place needs no room.
        cache.execute(1, |_| 10, Duration::from_secs(60));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_purge_invalidate_clear() {
        let (cache, clock) = manual_cache();
        cache.execute(1, |_| 1, Duration::from_secs(1));
        cache.execute(2, |_| 2, Duration::from_secs(60));
        cache.execute(3, |_| 3, Duration::from_secs(60));
        clock.advance(Duration::from_secs(2));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 2);

        assert!(cache.invalidate(&2));
        assert!(!cache.invalidate(&2));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_counters() {
        let (cache, clock) = manual_cache();
        cache.execute(1, |_| 1, Duration::from_secs(5));
        cache.execute(1, |_| 1, Duration::from_secs(5));
        cache.execute(2, |_| 2, Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.live_entries, 1);
        assert_eq!(stats.expired_entries, 1);
    }

    #[test]
    fn test_stats_disabled() {
        let cache = MemoCache::with_config(CacheConfig::new().without_stats());
        cache.execute(1, |_| 1, Duration::from_secs(5));
        cache.execute(1, |_| 1, Duration::from_secs(5));

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_ttl_expiration_real_clock() {
        let cache = MemoCache::new();
        cache.execute("alice", |_| 1, Duration::from_millis(1));

        std::thread::sleep(Duration::from_millis(10));

        assert!(cache.get(&"alice").is_none());
        assert_eq!(cache.execute("alice", |_| 2, Duration::from_secs(60)), 2);
    }

    #[test]
    fn test_concurrent_same_key_computes_once() {
        const THREADS: usize = 8;
        let cache: MemoCache<&str, usize> = MemoCache::new();
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        std::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    barrier.wait();
                    let value = cache.execute(
                        "expensive",
                        |_| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(Duration::from_millis(50));
                            42
                        },
                        Duration::from_secs(60),
                    );
                    assert_eq!(value, 42);
                });
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.in_flight.is_empty());
    }

    #[test]
    fn test_concurrent_distinct_keys() {
        let cache: MemoCache<usize, usize> = MemoCache::new();

        std::thread::scope(|s| {
            for t in 0..4 {
                let cache = &cache;
                s.spawn(move || {
                    for key in (t * 100)..(t * 100 + 100) {
                        assert_eq!(cache.execute(key, |k| k * 2, Duration::from_secs(60)), key * 2);
                    }
                });
            }
        });

        assert_eq!(cache.len(), 400);
        assert_eq!(cache.stats().misses, 400);
    }

    #[test]
    fn test_distinct_keys_compute_concurrently() {
        let cache: MemoCache<u32, bool> = MemoCache::new();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let timeout = Duration::from_secs(5);

        // Key 1 finishes only once key 2's computation releases it, and key 2
        // only starts releasing after seeing key 1 in progress. Either times
        // out if the two computations are serialized.
        let (first, second) = std::thread::scope(|s| {
            let cache = &cache;
            let first = s.spawn(move || {
                cache.execute(
                    1,
                    |_| {
                        started_tx.send(()).is_ok() && release_rx.recv_timeout(timeout).is_ok()
                    },
                    Duration::from_secs(60),
                )
            });
            let second = s.spawn(move || {
                cache.execute(
                    2,
                    |_| {
                        started_rx.recv_timeout(timeout).is_ok() && release_tx.send(()).is_ok()
                    },
                    Duration::from_secs(60),
                )
            });
            (first.join().unwrap(), second.join().unwrap())
        });

        assert!(first, "key 1 never saw key 2 compute");
        assert!(second, "key 2 never saw key 1 compute");
        assert_eq!(cache.stats().misses, 2);
        assert!(cache.in_flight.is_empty());
    }
}
