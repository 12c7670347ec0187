//! Process-local TTL cache with creation-time eviction.
//!
//! Keys are `prefix:canonical-params` strings, values are JSON payloads.
//! Entries expire at an absolute deadline; a background sweep removes the
//! expired ones and overflow evicts the entry with the oldest creation time.
//! No cross-instance coherence is promised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::GatewayError;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub const MEMORY_LIST_MAX: usize = 100;
pub const MEMORY_LIST_TTL: Duration = Duration::from_secs(30);
pub const STATS_MAX: usize = 20;
pub const STATS_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    created_at: Instant,
    expires_at: Instant,
    hits: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub name: &'static str,
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
    pub oldest_entry_age_ms: Option<u64>,
    pub newest_entry_age_ms: Option<u64>,
}

#[derive(Debug)]
pub struct TtlCache {
    name: &'static str,
    max_size: usize,
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TtlCache {
    pub fn new(name: &'static str, max_size: usize, default_ttl: Duration) -> Self {
        Self {
            name,
            max_size,
            default_ttl,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                entry.hits += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        let key = key.into();
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        if !entries.contains_key(&key) && entries.len() >= self.max_size {
            // Overflow policy: oldest creation time loses, ties broken by
            // key so concurrent callers agree on the victim.
            let evict = entries
                .iter()
                .min_by(|(ka, a), (kb, b)| a.created_at.cmp(&b.created_at).then(ka.cmp(kb)))
                .map(|(k, _)| k.clone());
            if let Some(victim) = evict {
                tracing::debug!(
                    component = "cache",
                    cache = self.name,
                    key = %victim,
                    "evicting oldest entry"
                );
                entries.remove(&victim);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + ttl.unwrap_or(self.default_ttl),
                hits: 0,
            },
        );
    }

    /// Return the cached value for `key`, or run `fetch`, store its result
    /// and return it. Fetch failures are not cached.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<Value, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, GatewayError>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .remove(key)
            .is_some()
    }

    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Drop every entry whose key matches `pattern`, returning the count.
    pub fn invalidate_pattern(&self, pattern: &Regex) -> usize {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|key, _| !pattern.is_match(key));
        before - entries.len()
    }

    /// Remove expired entries; called by the sweeper.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().expect("cache lock poisoned");
        let now = Instant::now();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let ages: Vec<u64> = entries
            .values()
            .map(|e| now.duration_since(e.created_at).as_millis() as u64)
            .collect();
        CacheStats {
            name: self.name,
            size: entries.len(),
            max_size: self.max_size,
            hits,
            misses,
            hit_rate_percent: if total == 0 {
                0.0
            } else {
                (hits as f64 / total as f64) * 100.0
            },
            oldest_entry_age_ms: ages.iter().max().copied(),
            newest_entry_age_ms: ages.iter().min().copied(),
        }
    }
}

// ── Preconfigured caches ────────────────────────────────────────────────

/// The gateway's two read caches.
#[derive(Debug)]
pub struct GatewayCaches {
    pub memory_list: Arc<TtlCache>,
    pub stats: Arc<TtlCache>,
}

impl GatewayCaches {
    pub fn new() -> Self {
        Self {
            memory_list: Arc::new(TtlCache::new("memoryList", MEMORY_LIST_MAX, MEMORY_LIST_TTL)),
            stats: Arc::new(TtlCache::new("stats", STATS_MAX, STATS_TTL)),
        }
    }

    pub fn all(&self) -> [&Arc<TtlCache>; 2] {
        [&self.memory_list, &self.stats]
    }

    /// Drop memory-list and stats entries after a write to the memory store.
    pub fn invalidate_after_write(&self) {
        let dropped = self.memory_list.clear() + self.stats.clear();
        if dropped > 0 {
            tracing::debug!(
                component = "cache",
                event = "write_invalidation",
                dropped,
                "cleared read caches after memory mutation"
            );
        }
    }

    /// Spawn the periodic TTL sweep for both caches.
    pub fn spawn_sweeper(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let caches = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                for cache in caches.all() {
                    let swept = cache.sweep();
                    if swept > 0 {
                        tracing::debug!(
                            component = "cache",
                            cache = cache.name(),
                            swept,
                            "removed expired entries"
                        );
                    }
                }
            }
        })
    }
}

impl Default for GatewayCaches {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical cache key: prefix plus stable serialization of the parameters.
pub fn cache_key(prefix: &str, params: &Value) -> String {
    let canonical = match params {
        Value::Object(map) => {
            // BTreeMap ordering makes the serialization order-insensitive.
            let sorted: std::collections::BTreeMap<_, _> = map.iter().collect();
            serde_json::to_string(&sorted).unwrap_or_default()
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    };
    format!("{prefix}:{canonical}")
}
