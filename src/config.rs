// src/config.rs
//! Application configuration: TOML file resolved via env var with a
//! config/ fallback, every section defaulting to a usable built-in seed.
//! API credentials stay in the environment; the file only names the
//! variables to read.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scoring::ScoringConfig;

pub const ENV_CONFIG_PATH: &str = "BRIEFING_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/briefing.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub schedule: ScheduleCfg,
    #[serde(default)]
    pub limits: LimitsCfg,
    #[serde(default)]
    pub cache: CacheCfg,
    #[serde(default)]
    pub sources: SourcesCfg,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub output: OutputCfg,
    #[serde(default)]
    pub generation: GenerationCfg,
}

impl AppConfig {
    /// Resolution order: $BRIEFING_CONFIG_PATH (must exist and parse), then
    /// config/briefing.toml if present, then built-in defaults.
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                ));
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing briefing config toml")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleCfg {
    /// Local time-of-day, "HH:MM".
    #[serde(default = "default_trigger_time")]
    pub trigger_time: String,
}

fn default_trigger_time() -> String {
    "07:30".to_string()
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            trigger_time: default_trigger_time(),
        }
    }
}

impl ScheduleCfg {
    pub fn trigger(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.trigger_time, "%H:%M")
            .with_context(|| format!("invalid trigger_time `{}`", self.trigger_time))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsCfg {
    #[serde(default = "default_per_source")]
    pub per_source: usize,
    #[serde(default = "default_total")]
    pub total: usize,
    #[serde(default = "default_highlights_per_kind")]
    pub highlights_per_kind: usize,
    #[serde(default = "default_handoff_cap")]
    pub handoff_cap: usize,
}

fn default_per_source() -> usize {
    10
}
fn default_total() -> usize {
    30
}
fn default_highlights_per_kind() -> usize {
    3
}
fn default_handoff_cap() -> usize {
    12
}

impl Default for LimitsCfg {
    fn default() -> Self {
        Self {
            per_source: default_per_source(),
            total: default_total(),
            highlights_per_kind: default_highlights_per_kind(),
            handoff_cap: default_handoff_cap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheCfg {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Per-slot staleness windows, minutes. Slots not listed fall back to
    /// per-kind defaults.
    #[serde(default)]
    pub ttl_minutes: BTreeMap<String, u64>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

impl Default for CacheCfg {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            ttl_minutes: BTreeMap::new(),
        }
    }
}

impl CacheCfg {
    pub fn ttl_for(&self, slot: &str) -> Duration {
        let minutes = self
            .ttl_minutes
            .get(slot)
            .copied()
            .unwrap_or_else(|| default_ttl_minutes(slot));
        Duration::from_secs(minutes * 60)
    }
}

/// Observed windows span 30 minutes (fast-moving front page) to 6 hours
/// (search APIs with daily-scale churn).
fn default_ttl_minutes(slot: &str) -> u64 {
    match slot {
        "front-page" => 30,
        "repo-search" => 360,
        "preprint" => 360,
        s if s.starts_with("feed") => 60,
        _ => 60,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesCfg {
    #[serde(default = "default_repo_query")]
    pub repo_query: String,
    /// Terms for the repo-search client's domain pre-score.
    #[serde(default = "default_repo_focus_terms")]
    pub repo_focus_terms: Vec<String>,
    /// Name of the env var holding the code-hosting API token, if any.
    #[serde(default = "default_repo_token_env")]
    pub repo_token_env: String,
    #[serde(default)]
    pub feeds: Vec<FeedCfg>,
    #[serde(default = "default_preprint_query")]
    pub preprint_query: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedCfg {
    pub name: String,
    pub url: String,
}

fn default_repo_query() -> String {
    "language:rust stars:>100".to_string()
}

fn default_repo_focus_terms() -> Vec<String> {
    ["rust", "llm", "agent", "compiler", "inference", "wasm"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_repo_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_preprint_query() -> String {
    "cat:cs.AI".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

impl Default for SourcesCfg {
    fn default() -> Self {
        Self {
            repo_query: default_repo_query(),
            repo_focus_terms: default_repo_focus_terms(),
            repo_token_env: default_repo_token_env(),
            feeds: Vec::new(),
            preprint_query: default_preprint_query(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputCfg {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("briefings")
}

impl Default for OutputCfg {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationCfg {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for GenerationCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_model(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.limits.per_source, 10);
        assert_eq!(cfg.limits.total, 30);
        assert!(cfg.schedule.trigger().is_ok());
        assert!(!cfg.generation.enabled);
    }

    #[test]
    fn ttl_defaults_vary_per_slot() {
        let cache = CacheCfg::default();
        assert_eq!(cache.ttl_for("front-page"), Duration::from_secs(30 * 60));
        assert_eq!(cache.ttl_for("repo-search"), Duration::from_secs(6 * 3600));
        assert_eq!(cache.ttl_for("feed-lobsters"), Duration::from_secs(3600));
    }

    #[test]
    fn ttl_override_wins() {
        let mut cache = CacheCfg::default();
        cache.ttl_minutes.insert("front-page".into(), 5);
        assert_eq!(cache.ttl_for("front-page"), Duration::from_secs(300));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
[schedule]
trigger_time = "06:00"

[[sources.feeds]]
name = "Lobsters"
url = "https://lobste.rs/rss"

[scoring.keywords]
"rust" = 4.0
"#,
        )
        .unwrap();
        assert_eq!(cfg.schedule.trigger_time, "06:00");
        assert_eq!(cfg.sources.feeds.len(), 1);
        assert_eq!(cfg.scoring.keywords.get("rust"), Some(&4.0));
        // Sections not present keep their defaults.
        assert_eq!(cfg.limits.highlights_per_kind, 3);
    }

    #[test]
    fn bad_trigger_time_is_an_error() {
        let cfg = AppConfig::from_toml_str("[schedule]\ntrigger_time = \"25:99\"\n").unwrap();
        assert!(cfg.schedule.trigger().is_err());
    }
}
