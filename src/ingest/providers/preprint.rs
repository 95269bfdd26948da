// src/ingest/providers/preprint.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::ingest::types::{RawItem, SourceClient, SourceKind};
use crate::ingest::{normalize_text, scrub_entities_for_xml};

const DEFAULT_ENDPOINT: &str = "https://export.arxiv.org/api/query";

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
}

fn parse_rfc3339_to_unix(ts: &str) -> Option<u64> {
    OffsetDateTime::parse(ts, &Rfc3339)
        .ok()
        .and_then(|dt| u64::try_from(dt.unix_timestamp()).ok())
}

/// Academic preprint search via the arXiv Atom API.
pub struct PreprintClient {
    http: reqwest::Client,
    endpoint: String,
    query: String,
}

impl PreprintClient {
    pub fn new(http: reqwest::Client, query: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            query: query.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn parse_feed(xml: &str, limit: usize) -> Result<Vec<RawItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_entities_for_xml(xml);
        let feed: AtomFeed = from_str(&xml_clean).context("parsing preprint atom xml")?;

        let mut out = Vec::with_capacity(feed.entries.len().min(limit));
        for entry in feed.entries {
            if out.len() >= limit {
                break;
            }
            // The Atom id is an absolute abstract URL; it is both the native
            // id and the canonical link.
            let link = match entry.id {
                Some(id) if !id.trim().is_empty() => id.trim().to_string(),
                _ => continue,
            };
            let title = normalize_text(entry.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            let summary = normalize_text(entry.summary.as_deref().unwrap_or_default());

            out.push(RawItem {
                id: format!("preprint:{link}"),
                kind: SourceKind::Preprint,
                searchable_text: format!("{title} {summary}"),
                title,
                link,
                published_at: entry.published.as_deref().and_then(parse_rfc3339_to_unix),
                popularity: 0,
                prescore: 0.0,
            });
        }

        histogram!("briefing_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("briefing_items_parsed_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceClient for PreprintClient {
    async fn fetch(&self, limit: usize) -> Result<Vec<RawItem>> {
        let max_results = limit.to_string();
        let body = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("search_query", self.query.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
                ("max_results", max_results.as_str()),
            ])
            .send()
            .await
            .context("preprint http get")?
            .error_for_status()
            .context("preprint http status")?
            .text()
            .await
            .context("preprint body")?;
        Self::parse_feed(&body, limit)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Preprint
    }
}
