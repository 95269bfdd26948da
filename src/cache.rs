// src/cache.rs
//! Per-source TTL cache: an injected key-value store of dated snapshots plus
//! the wrapper that shields source clients behind a staleness window and
//! falls back to the last good snapshot when a fetch fails.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ingest::types::{RawItem, SourceClient, SourceKind};

/// One cached snapshot per source slot. `last_fetched_at` (epoch-ms) is only
/// ever advanced after a successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub items: Vec<RawItem>,
    pub last_fetched_at: i64,
}

/// Injected storage handle. Each source slot owns its own entry, so parallel
/// fetches never contend on the same resource.
pub trait CacheStore: Send + Sync {
    fn load(&self, slot: &str) -> Result<Option<CacheEntry>>;
    fn store(&self, slot: &str, entry: &CacheEntry) -> Result<()>;
}

/// Durable store: one JSON file per slot under a cache directory, written
/// atomically (tmp file + rename).
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.json"))
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self, slot: &str) -> Result<Option<CacheEntry>> {
        let path = self.path(slot);
        let raw = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading cache {}", path.display()))
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                // A corrupt snapshot is treated as missing; the next
                // successful fetch rewrites it.
                tracing::warn!(error = %e, slot, "discarding unreadable cache snapshot");
                Ok(None)
            }
        }
    }

    fn store(&self, slot: &str, entry: &CacheEntry) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating cache dir {}", self.dir.display()))?;
        let json = serde_json::to_string(entry).context("serializing cache entry")?;
        write_atomic(&self.path(slot), &json)
    }
}

/// Write through a sibling tmp file and rename, so a crash mid-write never
/// leaves a truncated file behind.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut f = std::fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(contents.as_bytes())
            .with_context(|| format!("writing {}", tmp.display()))?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self, slot: &str) -> Result<Option<CacheEntry>> {
        Ok(self.inner.lock().expect("cache mutex poisoned").get(slot).cloned())
    }

    fn store(&self, slot: &str, entry: &CacheEntry) -> Result<()> {
        self.inner
            .lock()
            .expect("cache mutex poisoned")
            .insert(slot.to_string(), entry.clone());
        Ok(())
    }
}

/// A source client wrapped with its cache slot, staleness window and fetch
/// timeout. Caching lives here, never inside the client.
pub struct CachedSource {
    client: Box<dyn SourceClient>,
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    fetch_timeout: Duration,
}

impl CachedSource {
    pub fn new(
        client: Box<dyn SourceClient>,
        store: Arc<dyn CacheStore>,
        ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            client,
            store,
            ttl,
            fetch_timeout,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.client.kind()
    }

    pub fn slot(&self) -> String {
        self.client.slot()
    }

    pub async fn fetch_cached(&self, limit: usize) -> Result<Vec<RawItem>> {
        self.fetch_cached_at(chrono::Utc::now().timestamp_millis(), limit)
            .await
    }

    /// Time-injected variant so tests can drive the staleness window.
    pub async fn fetch_cached_at(&self, now_ms: i64, limit: usize) -> Result<Vec<RawItem>> {
        let slot = self.slot();
        let cached = match self.store.load(&slot) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, slot, "cache read failed, treating as empty");
                None
            }
        };

        if let Some(entry) = &cached {
            let age_ms = now_ms.saturating_sub(entry.last_fetched_at);
            if age_ms < self.ttl.as_millis() as i64 {
                return Ok(take_limit(entry.items.clone(), limit));
            }
        }

        match tokio::time::timeout(self.fetch_timeout, self.client.fetch(limit)).await {
            Ok(Ok(items)) => {
                let entry = CacheEntry {
                    items: items.clone(),
                    last_fetched_at: now_ms,
                };
                if let Err(e) = self.store.store(&slot, &entry) {
                    // Caching is best-effort; the fresh items still count.
                    tracing::warn!(error = %e, slot, "cache write failed");
                }
                Ok(take_limit(items, limit))
            }
            Ok(Err(e)) => self.fall_back(cached, &slot, e, limit),
            Err(_) => self.fall_back(
                cached,
                &slot,
                anyhow!("fetch timed out after {:?}", self.fetch_timeout),
                limit,
            ),
        }
    }

    fn fall_back(
        &self,
        cached: Option<CacheEntry>,
        slot: &str,
        err: anyhow::Error,
        limit: usize,
    ) -> Result<Vec<RawItem>> {
        metrics::counter!("briefing_fetch_errors_total").increment(1);
        match cached {
            Some(entry) => {
                tracing::warn!(error = %err, slot, "fetch failed, serving stale cache");
                Ok(take_limit(entry.items, limit))
            }
            None => Err(err.context(format!("source `{slot}` failed with no cached snapshot"))),
        }
    }
}

fn take_limit(mut items: Vec<RawItem>, limit: usize) -> Vec<RawItem> {
    items.truncate(limit);
    items
}
