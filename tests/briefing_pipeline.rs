// tests/briefing_pipeline.rs
//
// Briefing construction and rendering, plus full `Pipeline::run_once` runs
// against a temp output dir with a mock document generator.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use trend_briefing::briefing::{build_at, handoff_items, render_markdown};
use trend_briefing::{
    AggregateStats, Aggregator, Briefing, CachedSource, DocumentGenerator, HandoffItem,
    MemoryStore, Pipeline, RawItem, RunLimits, ScoredItem, ScoringConfig, SourceClient,
    SourceKind,
};

fn scored(kind: SourceKind, id: &str, title: &str, relevance: f64, importance: f64) -> ScoredItem {
    ScoredItem {
        item: RawItem {
            id: format!("{kind}:{id}"),
            kind,
            title: title.to_string(),
            link: format!("https://example.test/{id}"),
            published_at: None,
            popularity: importance as u64,
            searchable_text: String::new(),
            prescore: 0.0,
        },
        relevance,
        importance,
    }
}

fn stats_for(items: &[ScoredItem]) -> AggregateStats {
    let mut per_kind = BTreeMap::new();
    for s in items {
        *per_kind.entry(s.item.kind).or_insert(0) += 1;
    }
    AggregateStats {
        total: items.len(),
        per_kind,
        relevant: items.iter().filter(|s| s.relevance > 0.0).count(),
        failed: vec![],
    }
}

#[test]
fn build_groups_by_kind_in_rank_order_with_cap() {
    // Ranked list: kinds interleaved.
    let ranked = vec![
        scored(SourceKind::FrontPage, "a", "First FP", 3.0, 900.0),
        scored(SourceKind::Feed, "b", "First feed", 2.0, 500.0),
        scored(SourceKind::FrontPage, "c", "Second FP", 1.0, 400.0),
        scored(SourceKind::FrontPage, "d", "Third FP", 1.0, 300.0),
        scored(SourceKind::FrontPage, "e", "Fourth FP", 0.0, 200.0),
    ];
    let b = build_at(1_787_479_200_000, &ranked, &stats_for(&ranked), 3);

    assert_eq!(b.generated_at, 1_787_479_200_000);
    assert_eq!(b.total_count, 5);
    assert_eq!(b.per_kind_counts[&SourceKind::FrontPage], 4);

    // Highlights keep overall rank order and are capped at 3 per kind.
    let fp = &b.top_by_kind[&SourceKind::FrontPage];
    assert_eq!(fp.len(), 3);
    assert_eq!(fp[0].item.title, "First FP");
    assert_eq!(fp[2].item.title, "Third FP");
    assert_eq!(b.top_by_kind[&SourceKind::Feed].len(), 1);
}

#[test]
fn build_on_empty_input_is_empty_not_an_error() {
    let b = build_at(0, &[], &AggregateStats::default(), 3);
    assert_eq!(b.total_count, 0);
    assert!(b.top_by_kind.is_empty());
}

#[test]
fn markdown_rendering_has_headings_and_popularity() {
    let ranked = vec![
        scored(SourceKind::FrontPage, "a", "Big story", 3.0, 900.0),
        scored(SourceKind::Preprint, "p", "Quiet paper", 1.0, 0.0),
    ];
    let b = build_at(1_787_479_200_000, &ranked, &stats_for(&ranked), 3);
    let md = render_markdown(&b);

    assert!(md.starts_with("# Briefing 2026-08-23"));
    assert!(md.contains("## Front page (1)"));
    assert!(md.contains("## Preprints (1)"));
    assert!(md.contains("- [Big story](https://example.test/a) | 900"));
    // Zero popularity renders without the trailing signal.
    assert!(md.contains("- [Quiet paper](https://example.test/p)\n"));
    assert!(!md.contains("Quiet paper](https://example.test/p) | 0"));
}

#[test]
fn handoff_is_capped_and_keeps_group_order() {
    let ranked = vec![
        scored(SourceKind::FrontPage, "a", "FP one", 1.0, 3.0),
        scored(SourceKind::FrontPage, "b", "FP two", 1.0, 2.0),
        scored(SourceKind::Feed, "c", "Feed one", 1.0, 1.0),
        scored(SourceKind::Preprint, "d", "Paper one", 1.0, 1.0),
    ];
    let b = build_at(0, &ranked, &stats_for(&ranked), 3);

    let items = handoff_items(&b, 3);
    assert_eq!(items.len(), 3);
    // BTreeMap iteration: front-page group before feed, feed before preprint.
    assert_eq!(items[0].title, "FP one");
    assert_eq!(items[1].title, "FP two");
    assert_eq!(items[2].title, "Feed one");

    let all = handoff_items(&b, 50);
    assert_eq!(all.len(), 4);
}

// ---- run_once against a temp dir ----

struct StaticClient {
    kind: SourceKind,
    items: Vec<RawItem>,
}

#[async_trait]
impl SourceClient for StaticClient {
    async fn fetch(&self, limit: usize) -> Result<Vec<RawItem>> {
        let mut items = self.items.clone();
        items.truncate(limit);
        Ok(items)
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }
}

struct MockGenerator {
    reply: Option<String>,
}

#[async_trait]
impl DocumentGenerator for MockGenerator {
    async fn generate(&self, items: &[HandoffItem]) -> Result<String> {
        match &self.reply {
            Some(text) => Ok(format!("{text} ({} items)", items.len())),
            None => bail!("provider is down"),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn pipeline_with(generator: Option<Arc<dyn DocumentGenerator>>, out_dir: &std::path::Path) -> Pipeline {
    let client = StaticClient {
        kind: SourceKind::FrontPage,
        items: vec![RawItem {
            id: "front-page:1".into(),
            kind: SourceKind::FrontPage,
            title: "A Rust story".into(),
            link: "https://example.test/1".into(),
            published_at: None,
            popularity: 120,
            searchable_text: "rust".into(),
            prescore: 0.0,
        }],
    };
    let source = CachedSource::new(
        Box::new(client),
        Arc::new(MemoryStore::new()),
        Duration::from_secs(1800),
        Duration::from_secs(5),
    );
    let aggregator = Aggregator::new(vec![source], ScoringConfig::default_seed());
    Pipeline::new(
        aggregator,
        generator,
        out_dir,
        RunLimits {
            per_source: 10,
            total: 30,
            highlights_per_kind: 3,
            handoff_cap: 12,
        },
    )
}

fn files_in(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn run_once_persists_json_and_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(None, dir.path());

    let briefing = pipeline.run_once().await.unwrap();
    assert_eq!(briefing.total_count, 1);

    let names = files_in(dir.path());
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("briefing-") && names[0].ends_with(".json"));
    assert!(names[1].starts_with("briefing-") && names[1].ends_with(".md"));

    // The JSON on disk round-trips to the returned briefing.
    let json = std::fs::read_to_string(dir.path().join(&names[0])).unwrap();
    let reloaded: Briefing = serde_json::from_str(&json).unwrap();
    assert_eq!(reloaded, briefing);
}

#[tokio::test]
async fn run_once_writes_digest_when_generation_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let generator: Arc<dyn DocumentGenerator> = Arc::new(MockGenerator {
        reply: Some("Today in tech".to_string()),
    });
    let pipeline = pipeline_with(Some(generator), dir.path());

    pipeline.run_once().await.unwrap();

    let names = files_in(dir.path());
    assert_eq!(names.len(), 3);
    let digest = names.iter().find(|n| n.starts_with("digest-")).unwrap();
    let text = std::fs::read_to_string(dir.path().join(digest)).unwrap();
    assert_eq!(text, "Today in tech (1 items)");
}

#[tokio::test]
async fn generation_failure_keeps_the_briefing() {
    let dir = tempfile::tempdir().unwrap();
    let generator: Arc<dyn DocumentGenerator> = Arc::new(MockGenerator { reply: None });
    let pipeline = pipeline_with(Some(generator), dir.path());

    // The run still succeeds and the briefing files are on disk.
    pipeline.run_once().await.unwrap();
    let names = files_in(dir.path());
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|n| n.starts_with("briefing-")));
}
