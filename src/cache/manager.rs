//! Keyed TTL cache with hit/miss/eviction statistics and single-flight fetches.
//!
//! Storage and statistics live behind one synchronous mutex that is never held
//! across an await point. Concurrent `get_or_fetch` calls for the same key are
//! serialized through a per-key async lock so the fetch runs once.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// A cached value with its creation time and time-to-live.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// `None` when the clock reads earlier than `created_at`.
    fn age(&self, now: Instant) -> Option<Duration> {
        now.checked_duration_since(self.created_at)
    }

    fn is_expired(&self, now: Instant) -> bool {
        match self.age(now) {
            Some(age) => age >= self.ttl,
            None => true,
        }
    }
}

/// Lifetime counters. Never reset by `clear`.
#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    counters: Counters,
}

/// Snapshot of cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_requests: u64,
    pub hit_rate_percent: f64,
}

/// Per-entry diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntryInfo {
    pub key: String,
    pub age_secs: f64,
    pub ttl_secs: f64,
    pub expires_in_secs: f64,
    pub expired: bool,
}

/// How `invalidate_pattern` selects keys.
#[derive(Debug, Clone)]
enum KeyPattern {
    Prefix(String),
    Glob(Regex),
}

impl KeyPattern {
    /// Patterns containing `*` or `?` are anchored globs; anything else is a prefix.
    fn parse(pattern: &str) -> Self {
        if !pattern.contains(['*', '?']) {
            return KeyPattern::Prefix(pattern.to_string());
        }

        let mut re = String::with_capacity(pattern.len() + 8);
        re.push('^');
        for c in pattern.chars() {
            match c {
                '*' => re.push_str(".*"),
                '?' => re.push('.'),
                other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        re.push('$');

        match Regex::new(&re) {
            Ok(regex) => KeyPattern::Glob(regex),
            Err(_) => KeyPattern::Prefix(pattern.to_string()),
        }
    }

    fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyPattern::Glob(regex) => regex.is_match(key),
        }
    }
}

type FlightMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Releases a key's in-flight lock once the last interested caller is done,
/// including when the caller's future is dropped mid-fetch.
struct FlightTicket<'a> {
    flights: &'a FlightMap,
    key: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for FlightTicket<'_> {
    fn drop(&mut self) {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map plus ours means nobody else is waiting.
        if Arc::strong_count(&self.lock) <= 2 {
            if let Some(existing) = flights.get(self.key) {
                if Arc::ptr_eq(existing, &self.lock) {
                    flights.remove(self.key);
                }
            }
        }
    }
}

/// A thread-safe TTL cache keyed by strings.
///
/// Cloning is cheap and clones share storage, statistics and in-flight state.
pub struct CacheManager<V> {
    inner: Arc<Mutex<Inner<V>>>,
    flights: Arc<FlightMap>,
}

impl<V> Clone for CacheManager<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            flights: Arc::clone(&self.flights),
        }
    }
}

impl<V: Clone> Default for CacheManager<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> CacheManager<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                counters: Counters::default(),
            })),
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a value if it exists and hasn't expired.
    ///
    /// Expired entries are removed and counted as both a miss and an eviction.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                inner.counters.hits += 1;
                return Some(entry.value.clone());
            }
            Some(_) => {
                inner.entries.remove(key);
                inner.counters.evictions += 1;
            }
            None => {}
        }

        inner.counters.misses += 1;
        None
    }

    /// Lookup that leaves statistics untouched.
    fn peek(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let inner = self.lock();
        inner
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Insert or replace a value.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            ttl,
        };
        self.lock().entries.insert(key.into(), entry);
    }

    /// Remove a single entry. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.lock();
        let existed = inner.entries.remove(key).is_some();
        if existed {
            inner.counters.evictions += 1;
        }
        existed
    }

    /// Remove every key matching a prefix or a `*`/`?` glob.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let pattern = KeyPattern::parse(pattern);
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !pattern.matches(key));
        let removed = before - inner.entries.len();
        inner.counters.evictions += removed as u64;
        removed
    }

    /// Remove all entries. Counters are kept.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.counters.evictions += removed as u64;
        removed
    }

    /// Physically remove expired entries.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - inner.entries.len();
        inner.counters.evictions += removed as u64;
        removed
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let Counters {
            hits,
            misses,
            evictions,
        } = inner.counters;
        let total_requests = hits + misses;
        let hit_rate_percent = if total_requests == 0 {
            0.0
        } else {
            (hits as f64 / total_requests as f64 * 10_000.0).round() / 100.0
        };

        CacheStats {
            size: inner.entries.len(),
            hits,
            misses,
            evictions,
            total_requests,
            hit_rate_percent,
        }
    }

    /// Diagnostics for every stored entry, sorted by key.
    pub fn entries(&self) -> Vec<CacheEntryInfo> {
        let now = Instant::now();
        let inner = self.lock();
        let mut infos: Vec<CacheEntryInfo> = inner
            .entries
            .iter()
            .map(|(key, entry)| {
                let age = entry.age(now).unwrap_or(entry.ttl);
                CacheEntryInfo {
                    key: key.clone(),
                    age_secs: age.as_secs_f64(),
                    ttl_secs: entry.ttl.as_secs_f64(),
                    expires_in_secs: entry.ttl.saturating_sub(age).as_secs_f64(),
                    expired: entry.is_expired(now),
                }
            })
            .collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    /// Return the cached value or run `fetch` once to populate it.
    ///
    /// Concurrent callers for the same key wait for the first fetch and share its
    /// result. Callers for different keys proceed independently. Errors are
    /// returned to the caller that fetched and are not cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, ttl: Duration, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_fetch_with(key, move || async move { fetch().await.map(|value| (value, ttl)) })
            .await
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but the fetched value picks its own TTL.
    pub async fn get_or_fetch_with<F, Fut, E>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(V, Duration), E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let ticket = self.flight_ticket(key);
        let _permit = ticket.lock.clone().lock_owned().await;

        // Populated by the caller we waited on
        if let Some(value) = self.peek(key) {
            return Ok(value);
        }

        let (value, ttl) = fetch().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    fn flight_ticket<'a>(&'a self, key: &'a str) -> FlightTicket<'a> {
        let mut flights = self.flights.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = flights
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        FlightTicket {
            flights: &self.flights,
            key,
            lock,
        }
    }

    #[cfg(test)]
    fn flights_in_progress(&self) -> usize {
        self.flights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<V> std::fmt::Debug for CacheManager<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = self
            .inner
            .lock()
            .map(|inner| inner.entries.len())
            .unwrap_or(0);
        f.debug_struct("CacheManager").field("size", &size).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get_within_ttl_is_a_hit() {
        let cache = CacheManager::new();
        cache.set("jobs:all", vec!["job1", "job2"], TTL);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cache.get("jobs:all"), Some(vec!["job1", "job2"]));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_after_ttl_is_miss_and_eviction() {
        let cache = CacheManager::new();
        cache.set("jobs:all", vec!["job1", "job2"], TTL);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get("jobs:all"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_is_inclusive_at_ttl() {
        let cache = CacheManager::new();
        cache.set("k", 1, TTL);
        tokio::time::advance(TTL).await;
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_get_missing_counts_miss() {
        let cache: CacheManager<u32> = CacheManager::new();
        assert_eq!(cache.get("nope"), None);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.total_requests, 1);
    }

    #[test]
    fn test_invalidate() {
        let cache = CacheManager::new();
        cache.set("a", 1, TTL);
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_invalidate_pattern_prefix_removes_exactly_matching() {
        let cache = CacheManager::new();
        cache.set("jobs_list:all", 1, TTL);
        cache.set("jobs_list:api", 2, TTL);
        cache.set("job_details:api:3", 3, TTL);
        cache.set("xjobs_list:all", 4, TTL);

        assert_eq!(cache.invalidate_pattern("jobs_list:"), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("job_details:api:3"), Some(3));
        assert_eq!(cache.get("xjobs_list:all"), Some(4));
    }

    #[test]
    fn test_invalidate_pattern_glob() {
        let cache = CacheManager::new();
        cache.set("build_info:api:1", 1, TTL);
        cache.set("build_info:web:1", 2, TTL);
        cache.set("build_info:api:12", 3, TTL);

        assert_eq!(cache.invalidate_pattern("build_info:*:1"), 2);
        assert_eq!(cache.get("build_info:api:12"), Some(3));

        cache.set("node_info:a.b", 4, TTL);
        cache.set("node_info:aXb", 5, TTL);
        assert_eq!(cache.invalidate_pattern("node_info:a.b"), 1);
        assert_eq!(cache.invalidate_pattern("node_info:a?b"), 1);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let cache = CacheManager::new();
        cache.set("a", 1, TTL);
        cache.set("b", 2, TTL);
        cache.get("a");
        cache.get("missing");

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.hit_rate_percent, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_expired_and_entries() {
        let cache = CacheManager::new();
        cache.set("short", 1, Duration::from_secs(5));
        cache.set("long", 2, Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(10)).await;
        let infos = cache.entries();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].key, "long");
        assert!(!infos[0].expired);
        assert_eq!(infos[0].expires_in_secs, 50.0);
        assert!(infos[1].expired);

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_fetch_single_flight() {
        let cache: CacheManager<String> = CacheManager::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let callers = (0..16).map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            async move {
                cache
                    .get_or_fetch("jobs_list:all", TTL, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, String>("fetched".to_string())
                    })
                    .await
            }
        });
        let results = futures::future::join_all(callers).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.as_deref() == Ok("fetched")));
        assert_eq!(cache.flights_in_progress(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_fetch_different_keys_do_not_block() {
        let cache: CacheManager<u32> = CacheManager::new();
        let start = Instant::now();

        let slow = cache.get_or_fetch("slow", TTL, || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, ()>(1)
        });
        let fast = async {
            let value = cache
                .get_or_fetch("fast", TTL, || async { Ok::<_, ()>(2) })
                .await;
            (value, start.elapsed())
        };

        let (slow, (fast, fast_elapsed)) = tokio::join!(slow, fast);
        assert_eq!(slow, Ok(1));
        assert_eq!(fast, Ok(2));
        assert!(fast_elapsed < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_get_or_fetch_error_not_cached() {
        let cache: CacheManager<u32> = CacheManager::new();

        let first = cache
            .get_or_fetch("k", TTL, || async { Err::<u32, _>("boom") })
            .await;
        assert_eq!(first, Err("boom"));
        assert!(cache.is_empty());

        let second = cache
            .get_or_fetch("k", TTL, || async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(second, Ok(7));
        assert_eq!(cache.get("k"), Some(7));
        assert_eq!(cache.flights_in_progress(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_or_fetch_with_uses_fetched_ttl() {
        let cache: CacheManager<u32> = CacheManager::new();

        let value = cache
            .get_or_fetch_with("short", || async {
                Ok::<_, &str>((1, Duration::from_secs(5)))
            })
            .await;
        assert_eq!(value, Ok(1));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get("short"), None);
    }

    #[test]
    fn test_clone_shares_storage() {
        let cache = CacheManager::new();
        let other = cache.clone();
        cache.set("a", 1, TTL);
        assert_eq!(other.get("a"), Some(1));
    }
}
