// src/scoring.rs
//! Relevance and importance scoring.
//!
//! - Relevance: sum of weighted keyword matches (case-insensitive substring)
//!   against an item's searchable text, plus any client-level pre-score.
//! - Importance: popularity scaled by a per-kind source weight, boosted when
//!   the item is relevant at all.
//!
//! The keyword table, source weights and boost are deployment configuration
//! with a built-in seed fallback; the exact tuning is not a correctness
//! property.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ingest::types::{RawItem, SourceKind};

/// A RawItem plus its derived scores. Read-only view, produced once per
/// aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: RawItem,
    pub relevance: f64,
    pub importance: f64,
}

fn default_relevance_boost() -> f64 {
    1.5
}

fn default_source_weights() -> BTreeMap<SourceKind, f64> {
    BTreeMap::from([
        (SourceKind::FrontPage, 1.0),
        (SourceKind::RepoSearch, 0.2),
        (SourceKind::Feed, 1.0),
        (SourceKind::Preprint, 1.0),
    ])
}

fn default_keywords() -> BTreeMap<String, f64> {
    let mut table = BTreeMap::new();
    for (term, weight) in [
        ("rust", 3.0),
        ("llm", 2.5),
        ("language model", 2.5),
        ("agent", 2.0),
        ("inference", 2.0),
        ("compiler", 2.0),
        ("gpt", 2.0),
        ("transformer", 1.5),
        ("open source", 1.5),
        ("database", 1.5),
        ("wasm", 1.5),
        ("distributed", 1.0),
        ("benchmark", 1.0),
        ("security", 1.0),
        ("performance", 1.0),
    ] {
        table.insert(term.to_string(), weight);
    }
    table
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Importance multiplier applied when relevance > 0.
    #[serde(default = "default_relevance_boost")]
    pub relevance_boost: f64,
    /// Per-kind multiplier applied to popularity.
    #[serde(default = "default_source_weights")]
    pub source_weights: BTreeMap<SourceKind, f64>,
    /// (term, weight) pairs; terms are matched lowercase.
    #[serde(default = "default_keywords")]
    pub keywords: BTreeMap<String, f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl ScoringConfig {
    /// Built-in seed used when no configuration is provided.
    pub fn default_seed() -> Self {
        Self {
            relevance_boost: default_relevance_boost(),
            source_weights: default_source_weights(),
            keywords: default_keywords(),
        }
    }

    pub fn source_weight(&self, kind: SourceKind) -> f64 {
        self.source_weights.get(&kind).copied().unwrap_or(1.0)
    }

    /// Weighted keyword sum over `text` (case-insensitive substring match).
    pub fn relevance_of(&self, text: &str) -> f64 {
        let hay = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|(term, _)| !term.is_empty() && hay.contains(term.to_lowercase().as_str()))
            .map(|(_, weight)| *weight)
            .sum()
    }

    pub fn score(&self, item: RawItem) -> ScoredItem {
        let relevance = item.prescore + self.relevance_of(&item.searchable_text);
        let mut importance = item.popularity as f64 * self.source_weight(item.kind);
        if relevance > 0.0 {
            importance *= self.relevance_boost;
        }
        ScoredItem {
            item,
            relevance,
            importance,
        }
    }
}
