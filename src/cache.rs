//! # Response Cache (C5)
//!
//! A thread-safe, TTL- and capacity-bounded store keyed by a SHA-256 hash
//! of the canonicalized request (messages + model + options). Eviction
//! first drops expired entries, then — if still over capacity — removes
//! the least-used, oldest-remaining entries until back under the limit.
//!
//! The cache key reuses `window::content_fingerprint` for each message so
//! that large inline media payloads never enter the hash verbatim (only
//! their first 20 bytes do); two requests differing only in bytes beyond
//! that prefix collide, by design.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::provider::{ProviderOption, Response};
use crate::types::Message;
use crate::window::content_fingerprint;

/// Tuning knobs for a `ResponseCache`.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            ttl: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::cache("capacity must be at least 1"));
        }
        if self.ttl.is_zero() {
            return Err(Error::cache("ttl must be greater than zero"));
        }
        Ok(())
    }
}

/// Point-in-time counters surfaced for observability.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub ttl: Duration,
    pub hits: u64,
    pub misses: u64,
    pub stored: u64,
    pub evicted: u64,
    pub per_source: HashMap<String, u64>,
    pub hit_ratio: f64,
}

struct Entry {
    response: Response,
    inserted_at: Instant,
    usage_count: AtomicU64,
}

fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonical_value(v)))
                .collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}

fn canonical_json(value: &Value) -> String {
    canonical_value(value).to_string()
}

/// Hash a request down to a stable cache key. Identical messages, model,
/// and options always yield the same key regardless of JSON key order.
pub fn compute_key(messages: &[Message], model: &str, options: &[ProviderOption]) -> String {
    let mut hasher = Sha256::new();
    for message in messages {
        hasher.update(content_fingerprint(message).as_bytes());
        hasher.update([0x1f]);
    }
    hasher.update(model.as_bytes());
    hasher.update([0x1f]);
    let options_json = serde_json::to_value(options).unwrap_or(Value::Null);
    hasher.update(canonical_json(&options_json).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A thread-safe, TTL- and capacity-bounded response cache.
pub struct ResponseCache {
    config: CacheConfig,
    entries: RwLock<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    stored: AtomicU64,
    evicted: AtomicU64,
    per_source: RwLock<HashMap<String, u64>>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stored: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            per_source: RwLock::new(HashMap::new()),
        })
    }

    /// Look up a key. Expired entries are treated as a miss (and swept on
    /// the next `set`, not here).
    pub fn get(&self, key: &str) -> Option<Response> {
        let now = Instant::now();
        let hit = {
            let entries = self.entries.read().expect("response cache lock poisoned");
            entries.get(key).and_then(|entry| {
                if now.duration_since(entry.inserted_at) < self.config.ttl {
                    entry.usage_count.fetch_add(1, Ordering::Relaxed);
                    Some(entry.response.clone())
                } else {
                    None
                }
            })
        };
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    pub fn set(&self, key: impl Into<String>, response: Response, source: impl Into<String>) {
        let key = key.into();
        let source = source.into();
        {
            let mut entries = self.entries.write().expect("response cache lock poisoned");
            let usage_count = match entries.get(&key) {
                Some(existing) => existing.usage_count.load(Ordering::Relaxed) + 1,
                None => 1,
            };
            entries.insert(
                key,
                Entry {
                    response,
                    inserted_at: Instant::now(),
                    usage_count: AtomicU64::new(usage_count),
                },
            );
        }
        self.stored.fetch_add(1, Ordering::Relaxed);
        *self
            .per_source
            .write()
            .expect("response cache source lock poisoned")
            .entry(source)
            .or_insert(0) += 1;
        self.evict_if_needed();
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("response cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            size: self.len(),
            capacity: self.config.capacity,
            ttl: self.config.ttl,
            hits,
            misses,
            stored: self.stored.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            per_source: self
                .per_source
                .read()
                .expect("response cache source lock poisoned")
                .clone(),
            hit_ratio: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        }
    }

    /// Drop expired entries, then — if still over capacity — evict the
    /// least-used, oldest-remaining entries until at or under capacity.
    fn evict_if_needed(&self) {
        let mut entries = self.entries.write().expect("response cache lock poisoned");
        let now = Instant::now();
        let ttl = self.config.ttl;

        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.inserted_at) < ttl);
        let expired = before - entries.len();
        if expired > 0 {
            self.evicted.fetch_add(expired as u64, Ordering::Relaxed);
        }

        if entries.len() <= self.config.capacity {
            return;
        }

        let mut candidates: Vec<(String, u64, Instant)> = entries
            .iter()
            .map(|(key, entry)| {
                (
                    key.clone(),
                    entry.usage_count.load(Ordering::Relaxed),
                    entry.inserted_at,
                )
            })
            .collect();
        candidates.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));

        let overflow = entries.len() - self.config.capacity;
        for (key, _, _) in candidates.into_iter().take(overflow) {
            entries.remove(&key);
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
    }
}

static GLOBAL_CACHE: OnceLock<Arc<ResponseCache>> = OnceLock::new();

/// Process-wide cache shared by every `Agent` that doesn't bring its own.
pub fn global() -> Arc<ResponseCache> {
    GLOBAL_CACHE
        .get_or_init(|| {
            Arc::new(ResponseCache::new(CacheConfig::default()).expect("default cache config is valid"))
        })
        .clone()
}
