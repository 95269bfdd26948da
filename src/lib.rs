// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregate;
pub mod briefing;
pub mod cache;
pub mod config;
pub mod generate;
pub mod ingest;
pub mod scheduler;
pub mod scoring;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{AggregateStats, Aggregator};
pub use crate::briefing::{Briefing, HandoffItem};
pub use crate::cache::{CacheEntry, CacheStore, CachedSource, JsonFileStore, MemoryStore};
pub use crate::config::AppConfig;
pub use crate::generate::DocumentGenerator;
pub use crate::ingest::types::{RawItem, SourceClient, SourceKind};
pub use crate::scheduler::{DailyScheduler, Pipeline, RunLimits, RunState};
pub use crate::scoring::{ScoredItem, ScoringConfig};
