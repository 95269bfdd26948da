// src/ingest/providers/front_page.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::ingest::types::{RawItem, SourceClient, SourceKind};
use crate::ingest::{host_of, normalize_text};

const DEFAULT_ENDPOINT: &str = "https://hn.algolia.com/api/v1/search";

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    title: Option<String>,
    url: Option<String>,
    points: Option<u64>,
    #[serde(rename = "created_at_i")]
    created_at: Option<u64>,
}

/// Link-aggregator front page via the Algolia search API.
pub struct FrontPageClient {
    http: reqwest::Client,
    endpoint: String,
}

impl FrontPageClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_endpoint(http, DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn parse_page(body: &str, limit: usize) -> Result<Vec<RawItem>> {
        let t0 = std::time::Instant::now();
        let page: SearchPage = serde_json::from_str(body).context("parsing front page json")?;

        let mut out = Vec::with_capacity(page.hits.len().min(limit));
        for hit in page.hits {
            if out.len() >= limit {
                break;
            }
            let title = normalize_text(hit.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            // Self posts have no external URL; link to the discussion instead.
            let link = hit
                .url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| {
                    format!("https://news.ycombinator.com/item?id={}", hit.object_id)
                });
            let domain = host_of(&link).unwrap_or_default();

            out.push(RawItem {
                id: format!("front-page:{}", hit.object_id),
                kind: SourceKind::FrontPage,
                searchable_text: format!("{title} {domain}"),
                title,
                link,
                published_at: hit.created_at,
                popularity: hit.points.unwrap_or(0),
                prescore: 0.0,
            });
        }

        histogram!("briefing_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("briefing_items_parsed_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceClient for FrontPageClient {
    async fn fetch(&self, limit: usize) -> Result<Vec<RawItem>> {
        let per_page = limit.to_string();
        let body = self
            .http
            .get(&self.endpoint)
            .query(&[("tags", "front_page"), ("hitsPerPage", per_page.as_str())])
            .send()
            .await
            .context("front page http get")?
            .error_for_status()
            .context("front page http status")?
            .text()
            .await
            .context("front page body")?;
        Self::parse_page(&body, limit)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::FrontPage
    }
}
