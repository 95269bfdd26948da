// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which source client produced an item. Doubles as the default cache slot
/// name and as a JSON map key in briefing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    FrontPage,
    RepoSearch,
    Feed,
    Preprint,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::FrontPage => "front-page",
            SourceKind::RepoSearch => "repo-search",
            SourceKind::Feed => "feed",
            SourceKind::Preprint => "preprint",
        }
    }

    /// Human heading used in the rendered briefing.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::FrontPage => "Front page",
            SourceKind::RepoSearch => "Repositories",
            SourceKind::Feed => "Feeds",
            SourceKind::Preprint => "Preprints",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized, unscored entry from a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    /// Stable id, unique within the source namespace (source name + native id).
    pub id: String,
    pub kind: SourceKind,
    pub title: String,
    pub link: String,
    /// Unix seconds; absent for sources without usable timestamps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<u64>,
    /// Source-native magnitude signal (points, stars). 0 when the source has none.
    #[serde(default)]
    pub popularity: u64,
    /// Concatenated text used only for keyword scoring, never for identity.
    #[serde(default)]
    pub searchable_text: String,
    /// Client-level relevance pre-score; the aggregator adds to it, never
    /// replaces it. 0 for sources that don't compute one.
    #[serde(default)]
    pub prescore: f64,
}

#[async_trait::async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetch at most `limit` items. Every failure mode (network, rate limit,
    /// malformed payload) surfaces as one error kind; the caller's recovery
    /// is the same either way.
    async fn fetch(&self, limit: usize) -> Result<Vec<RawItem>>;

    fn kind(&self) -> SourceKind;

    /// Cache slot owned by this client. Defaults to the kind name; clients
    /// that share a kind (several feeds) override it so slots never collide.
    fn slot(&self) -> String {
        self.kind().as_str().to_string()
    }
}
