// src/briefing.rs
//! Turn a ranked item list into the per-run summary structure, its
//! human-readable rendering, and the bounded handoff list for the
//! generation collaborator. Pure functions of their inputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::aggregate::AggregateStats;
use crate::ingest::types::SourceKind;
use crate::scoring::ScoredItem;

/// The grouped, ranked, size-bounded summary for one run. Serialized as the
/// per-date briefing JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Briefing {
    /// Epoch-ms.
    pub generated_at: i64,
    pub total_count: usize,
    pub per_kind_counts: BTreeMap<SourceKind, usize>,
    /// Top items per kind, in overall rank order, bounded length.
    pub top_by_kind: BTreeMap<SourceKind, Vec<ScoredItem>>,
}

/// The bounded tuple list handed to the external text-generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandoffItem {
    pub title: String,
    pub link: String,
    pub kind: SourceKind,
}

pub fn build(
    scored: &[ScoredItem],
    stats: &AggregateStats,
    highlights_per_kind: usize,
) -> Briefing {
    build_at(
        chrono::Utc::now().timestamp_millis(),
        scored,
        stats,
        highlights_per_kind,
    )
}

/// Time-injected variant; deterministic given identical input.
pub fn build_at(
    now_ms: i64,
    scored: &[ScoredItem],
    stats: &AggregateStats,
    highlights_per_kind: usize,
) -> Briefing {
    let mut top_by_kind: BTreeMap<SourceKind, Vec<ScoredItem>> = BTreeMap::new();
    for s in scored {
        let bucket = top_by_kind.entry(s.item.kind).or_default();
        if bucket.len() < highlights_per_kind {
            bucket.push(s.clone());
        }
    }
    Briefing {
        generated_at: now_ms,
        total_count: stats.total,
        per_kind_counts: stats.per_kind.clone(),
        top_by_kind,
    }
}

/// Grouped-headings rendering: one line per item with title, link and the
/// source-native popularity signal. This is builder output, not generated
/// prose.
pub fn render_markdown(briefing: &Briefing) -> String {
    let day = chrono::DateTime::from_timestamp_millis(briefing.generated_at)
        .unwrap_or_default()
        .format("%Y-%m-%d");

    let mut out = String::new();
    let _ = writeln!(out, "# Briefing {day}");
    let _ = writeln!(out);
    let _ = writeln!(out, "{} items across all sources.", briefing.total_count);
    for (kind, items) in &briefing.top_by_kind {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "## {} ({})",
            kind.label(),
            briefing.per_kind_counts.get(kind).copied().unwrap_or(0)
        );
        for s in items {
            if s.item.popularity > 0 {
                let _ = writeln!(
                    out,
                    "- [{}]({}) | {}",
                    s.item.title, s.item.link, s.item.popularity
                );
            } else {
                let _ = writeln!(out, "- [{}]({})", s.item.title, s.item.link);
            }
        }
    }
    out
}

/// Flatten the briefing's highlights into at most `cap` handoff tuples,
/// keeping rank order within each kind group.
pub fn handoff_items(briefing: &Briefing, cap: usize) -> Vec<HandoffItem> {
    let mut out = Vec::with_capacity(cap);
    for items in briefing.top_by_kind.values() {
        for s in items {
            if out.len() >= cap {
                return out;
            }
            out.push(HandoffItem {
                title: s.item.title.clone(),
                link: s.item.link.clone(),
                kind: s.item.kind,
            });
        }
    }
    out
}
