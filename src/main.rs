//! Trend Briefing — Binary Entrypoint
//! Wires the cache store, source clients, aggregator and generator from
//! configuration, then hands control to the daily scheduler loop.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_briefing::cache::{CacheStore, CachedSource, JsonFileStore};
use trend_briefing::config::AppConfig;
use trend_briefing::generate::{DocumentGenerator, OpenAiGenerator};
use trend_briefing::ingest::providers::{
    feed::FeedClient, front_page::FrontPageClient, preprint::PreprintClient,
    repo_search::RepoSearchClient,
};
use trend_briefing::ingest::types::SourceClient;
use trend_briefing::scheduler::{self, Pipeline, RunLimits};
use trend_briefing::Aggregator;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("trend-briefing/0.1")
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .context("building http client")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    let trigger = cfg.schedule.trigger()?;
    let fetch_timeout = Duration::from_secs(cfg.sources.fetch_timeout_secs);
    let http = http_client(fetch_timeout)?;

    let store: Arc<dyn CacheStore> = Arc::new(JsonFileStore::new(&cfg.cache.dir));

    let mut clients: Vec<Box<dyn SourceClient>> = vec![
        Box::new(FrontPageClient::new(http.clone())),
        Box::new(RepoSearchClient::new(
            http.clone(),
            cfg.sources.repo_query.clone(),
            std::env::var(&cfg.sources.repo_token_env).ok(),
            cfg.sources.repo_focus_terms.clone(),
        )),
        Box::new(PreprintClient::new(
            http.clone(),
            cfg.sources.preprint_query.clone(),
        )),
    ];
    for feed in &cfg.sources.feeds {
        clients.push(Box::new(FeedClient::new(
            http.clone(),
            feed.name.clone(),
            feed.url.clone(),
        )));
    }

    let sources = clients
        .into_iter()
        .map(|client| {
            let ttl = cfg.cache.ttl_for(&client.slot());
            CachedSource::new(client, store.clone(), ttl, fetch_timeout)
        })
        .collect();

    let aggregator = Aggregator::new(sources, cfg.scoring.clone());
    let generator: Option<Arc<dyn DocumentGenerator>> = if cfg.generation.enabled {
        Some(Arc::new(OpenAiGenerator::new(Some(&cfg.generation.model))))
    } else {
        None
    };
    let pipeline = Pipeline::new(
        aggregator,
        generator,
        cfg.output.dir.clone(),
        RunLimits {
            per_source: cfg.limits.per_source,
            total: cfg.limits.total,
            highlights_per_kind: cfg.limits.highlights_per_kind,
            handoff_cap: cfg.limits.handoff_cap,
        },
    );

    tracing::info!(%trigger, feeds = cfg.sources.feeds.len(), "trend briefing daemon started");
    scheduler::run(pipeline, trigger).await
}
