// src/aggregate.rs
//! Fan-out to every registered source, merge, score, deduplicate, rank.
//!
//! The output order is fully determined by content: sources are fetched
//! concurrently but merged in registration order, and the final list is the
//! dedup-then-sort of that merge. Completion order never leaks through.

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::cache::CachedSource;
use crate::ingest::types::{RawItem, SourceKind};
use crate::scoring::{ScoredItem, ScoringConfig};

/// Titles are compared lowercase, whitespace-stripped, on this many leading
/// chars.
pub const DEDUP_KEY_PREFIX_CHARS: usize = 64;

/// One-time metrics registration (so series carry descriptions).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "briefing_items_parsed_total",
            "Items parsed from source payloads."
        );
        describe_counter!(
            "briefing_items_total",
            "Items returned by aggregation after dedup and truncation."
        );
        describe_counter!(
            "briefing_dedup_total",
            "Items dropped as cross-source duplicates."
        );
        describe_counter!(
            "briefing_fetch_errors_total",
            "Source fetch/timeout errors (including ones recovered from cache)."
        );
        describe_counter!(
            "briefing_source_failures_total",
            "Sources that contributed zero items (fetch failed, no cache)."
        );
        describe_counter!("briefing_runs_total", "Pipeline runs started.");
        describe_gauge!(
            "briefing_last_aggregate_ts",
            "Unix ts of the last completed aggregation."
        );
        describe_histogram!("briefing_parse_ms", "Source payload parse time in ms.");
    });
}

/// Per-run accounting. `per_kind` carries an explicit zero for every
/// registered source kind that contributed nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateStats {
    pub total: usize,
    pub per_kind: BTreeMap<SourceKind, usize>,
    pub relevant: usize,
    pub failed: Vec<SourceKind>,
}

enum SourceOutcome {
    Items(SourceKind, Vec<RawItem>),
    Failed(SourceKind),
}

pub struct Aggregator {
    sources: Vec<CachedSource>,
    scoring: ScoringConfig,
}

impl Aggregator {
    pub fn new(sources: Vec<CachedSource>, scoring: ScoringConfig) -> Self {
        Self { sources, scoring }
    }

    /// Normalized identity key for cross-source title dedup.
    pub fn dedup_key(title: &str) -> String {
        title
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .take(DEDUP_KEY_PREFIX_CHARS)
            .collect()
    }

    /// Fetch all sources (cached, concurrent), then merge/score/dedup/sort.
    /// Per-source failures are absorbed into stats; nothing escapes.
    pub async fn aggregate(
        &self,
        per_source_limit: usize,
        total_limit: usize,
    ) -> (Vec<ScoredItem>, AggregateStats) {
        ensure_metrics_described();

        // join_all preserves registration order, which is what makes the
        // "first source to enumerate an item wins dedup" policy deterministic.
        let outcomes = join_all(self.sources.iter().map(|source| async move {
            match source.fetch_cached(per_source_limit).await {
                Ok(items) => SourceOutcome::Items(source.kind(), items),
                Err(e) => {
                    tracing::warn!(error = %e, slot = source.slot(), "source unavailable");
                    counter!("briefing_source_failures_total").increment(1);
                    SourceOutcome::Failed(source.kind())
                }
            }
        }))
        .await;

        self.merge(outcomes, total_limit)
    }

    fn merge(
        &self,
        outcomes: Vec<SourceOutcome>,
        total_limit: usize,
    ) -> (Vec<ScoredItem>, AggregateStats) {
        let mut stats = AggregateStats::default();
        let mut merged: Vec<RawItem> = Vec::new();
        for outcome in outcomes {
            match outcome {
                SourceOutcome::Items(kind, items) => {
                    stats.per_kind.entry(kind).or_insert(0);
                    merged.extend(items);
                }
                SourceOutcome::Failed(kind) => {
                    stats.per_kind.entry(kind).or_insert(0);
                    stats.failed.push(kind);
                }
            }
        }

        // Score, then dedup by normalized title: first occurrence in merge
        // order wins, later duplicates from any source are dropped silently.
        let mut seen: HashSet<String> = HashSet::new();
        let mut kept: Vec<ScoredItem> = Vec::with_capacity(merged.len());
        let mut dropped = 0usize;
        for raw in merged {
            let scored = self.scoring.score(raw);
            if seen.insert(Self::dedup_key(&scored.item.title)) {
                kept.push(scored);
            } else {
                dropped += 1;
            }
        }
        counter!("briefing_dedup_total").increment(dropped as u64);

        for s in &kept {
            *stats.per_kind.entry(s.item.kind).or_insert(0) += 1;
            if s.relevance > 0.0 {
                stats.relevant += 1;
            }
        }
        stats.total = kept.len();

        // Two-tier stable sort: any relevance beats none, importance decides
        // within a tier. Deliberately not a blended score.
        kept.sort_by(|a, b| {
            let a_relevant = a.relevance > 0.0;
            let b_relevant = b.relevance > 0.0;
            b_relevant
                .cmp(&a_relevant)
                .then_with(|| b.importance.total_cmp(&a.importance))
        });
        kept.truncate(total_limit);

        counter!("briefing_items_total").increment(kept.len() as u64);
        gauge!("briefing_last_aggregate_ts").set(chrono::Utc::now().timestamp() as f64);

        (kept, stats)
    }
}
