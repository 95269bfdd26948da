// tests/cache_fallback.rs
//
// TTL and fallback behavior of `CachedSource`, driven with injected clocks
// and scripted clients so no test touches the network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use trend_briefing::{
    CacheEntry, CacheStore, CachedSource, JsonFileStore, MemoryStore, RawItem, SourceClient,
    SourceKind,
};

fn item(n: usize) -> RawItem {
    RawItem {
        id: format!("front-page:{n}"),
        kind: SourceKind::FrontPage,
        title: format!("Story {n}"),
        link: format!("https://example.dev/{n}"),
        published_at: Some(1_787_000_000 + n as u64),
        popularity: 100 + n as u64,
        searchable_text: format!("story {n} example.dev"),
        prescore: 0.0,
    }
}

enum Script {
    Succeed(usize),
    Fail,
    Hang,
}

struct ScriptedClient {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SourceClient for ScriptedClient {
    async fn fetch(&self, limit: usize) -> Result<Vec<RawItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Succeed(n) => Ok((0..n.min(limit)).map(item).collect()),
            Script::Fail => bail!("upstream returned 503"),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(vec![])
            }
        }
    }

    fn kind(&self) -> SourceKind {
        SourceKind::FrontPage
    }
}

const MINUTE_MS: i64 = 60_000;

fn cached_source(
    script: Script,
    store: Arc<MemoryStore>,
    ttl_minutes: u64,
) -> (Arc<ScriptedClient>, CachedSource) {
    let client = Arc::new(ScriptedClient::new(script));
    let wrapper = CachedSource::new(
        Box::new(ForwardingClient(client.clone())),
        store,
        Duration::from_secs(ttl_minutes * 60),
        Duration::from_millis(100),
    );
    (client, wrapper)
}

// `CachedSource` owns its client; forward through an Arc so the test can
// still inspect the call counter.
struct ForwardingClient(Arc<ScriptedClient>);

#[async_trait]
impl SourceClient for ForwardingClient {
    async fn fetch(&self, limit: usize) -> Result<Vec<RawItem>> {
        self.0.fetch(limit).await
    }

    fn kind(&self) -> SourceKind {
        self.0.kind()
    }
}

#[tokio::test]
async fn fresh_cache_skips_the_network() {
    let store = Arc::new(MemoryStore::new());
    let now = 1_000 * MINUTE_MS;
    store
        .store(
            "front-page",
            &CacheEntry {
                items: (0..5).map(item).collect(),
                last_fetched_at: now - 10 * MINUTE_MS,
            },
        )
        .unwrap();

    let (client, source) = cached_source(Script::Succeed(9), store, 30);
    let got = source.fetch_cached_at(now, 10).await.unwrap();

    assert_eq!(got.len(), 5);
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fresh_cache_hit_is_truncated_to_limit() {
    let store = Arc::new(MemoryStore::new());
    let now = 1_000 * MINUTE_MS;
    store
        .store(
            "front-page",
            &CacheEntry {
                items: (0..8).map(item).collect(),
                last_fetched_at: now,
            },
        )
        .unwrap();

    let (_client, source) = cached_source(Script::Succeed(9), store, 30);
    let got = source.fetch_cached_at(now, 3).await.unwrap();
    assert_eq!(got.len(), 3);
    assert_eq!(got[2].id, "front-page:2");
}

#[tokio::test]
async fn expired_cache_triggers_refetch_and_stores_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let now = 1_000 * MINUTE_MS;
    store
        .store(
            "front-page",
            &CacheEntry {
                items: (0..2).map(item).collect(),
                last_fetched_at: now - 90 * MINUTE_MS,
            },
        )
        .unwrap();

    let (client, source) = cached_source(Script::Succeed(6), store.clone(), 30);
    let got = source.fetch_cached_at(now, 10).await.unwrap();

    assert_eq!(got.len(), 6);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    let entry = store.load("front-page").unwrap().unwrap();
    assert_eq!(entry.last_fetched_at, now);
    assert_eq!(entry.items.len(), 6);
}

#[tokio::test]
async fn failed_fetch_serves_stale_snapshot_without_touching_it() {
    let store = Arc::new(MemoryStore::new());
    let now = 1_000 * MINUTE_MS;
    let stale_at = now - 90 * MINUTE_MS;
    store
        .store(
            "front-page",
            &CacheEntry {
                items: (0..5).map(item).collect(),
                last_fetched_at: stale_at,
            },
        )
        .unwrap();

    let (client, source) = cached_source(Script::Fail, store.clone(), 30);
    let got = source.fetch_cached_at(now, 10).await.unwrap();

    assert_eq!(got.len(), 5);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    // The failed run never clobbers the snapshot or its timestamp.
    let entry = store.load("front-page").unwrap().unwrap();
    assert_eq!(entry.last_fetched_at, stale_at);
    assert_eq!(entry.items.len(), 5);
}

#[tokio::test]
async fn timeout_counts_as_failure_and_falls_back() {
    let store = Arc::new(MemoryStore::new());
    let now = 1_000 * MINUTE_MS;
    store
        .store(
            "front-page",
            &CacheEntry {
                items: (0..4).map(item).collect(),
                last_fetched_at: now - 90 * MINUTE_MS,
            },
        )
        .unwrap();

    let (_client, source) = cached_source(Script::Hang, store, 30);
    let got = source.fetch_cached_at(now, 10).await.unwrap();
    assert_eq!(got.len(), 4);
}

#[tokio::test]
async fn first_run_failure_with_empty_cache_is_an_error() {
    let store = Arc::new(MemoryStore::new());
    let (_client, source) = cached_source(Script::Fail, store, 30);

    let err = source.fetch_cached_at(0, 10).await.unwrap_err();
    assert!(err.to_string().contains("front-page"));
}

#[test]
fn json_file_store_round_trips_per_slot() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path());

    assert!(store.load("front-page").unwrap().is_none());

    let entry = CacheEntry {
        items: (0..3).map(item).collect(),
        last_fetched_at: 42 * MINUTE_MS,
    };
    store.store("front-page", &entry).unwrap();
    store
        .store(
            "feed-lobsters",
            &CacheEntry {
                items: vec![],
                last_fetched_at: 0,
            },
        )
        .unwrap();

    assert_eq!(store.load("front-page").unwrap().unwrap(), entry);
    assert_eq!(
        store.load("feed-lobsters").unwrap().unwrap().items.len(),
        0
    );
    assert!(dir.path().join("front-page.json").exists());
}

#[test]
fn corrupt_snapshot_reads_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("front-page.json"), "{truncated").unwrap();

    let store = JsonFileStore::new(dir.path());
    assert!(store.load("front-page").unwrap().is_none());
}
