// src/ingest/providers/repo_search.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::ingest::normalize_text;
use crate::ingest::types::{RawItem, SourceClient, SourceKind};

const DEFAULT_ENDPOINT: &str = "https://api.github.com/search/repositories";

#[derive(Debug, Deserialize)]
struct SearchResp {
    #[serde(default)]
    items: Vec<Repo>,
}

#[derive(Debug, Deserialize)]
struct Repo {
    full_name: String,
    html_url: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    language: Option<String>,
    created_at: Option<String>,
}

fn parse_rfc3339_to_unix(ts: &str) -> Option<u64> {
    OffsetDateTime::parse(ts, &Rfc3339)
        .ok()
        .and_then(|dt| u64::try_from(dt.unix_timestamp()).ok())
}

/// Code-hosting repository search. Unlike the other clients it computes a
/// crude domain-relevance pre-score from description + language; the
/// aggregator's keyword relevance adds on top of it.
pub struct RepoSearchClient {
    http: reqwest::Client,
    endpoint: String,
    query: String,
    token: Option<String>,
    focus_terms: Vec<String>,
}

impl RepoSearchClient {
    pub fn new(
        http: reqwest::Client,
        query: impl Into<String>,
        token: Option<String>,
        focus_terms: Vec<String>,
    ) -> Self {
        Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            query: query.into(),
            token,
            focus_terms,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// One point per focus term found in description + language.
    fn prescore(focus_terms: &[String], haystack: &str) -> f64 {
        let hay = haystack.to_lowercase();
        focus_terms
            .iter()
            .filter(|t| !t.is_empty() && hay.contains(t.to_lowercase().as_str()))
            .count() as f64
    }

    pub fn parse_results(body: &str, limit: usize, focus_terms: &[String]) -> Result<Vec<RawItem>> {
        let t0 = std::time::Instant::now();
        let resp: SearchResp = serde_json::from_str(body).context("parsing repo search json")?;

        let mut out = Vec::with_capacity(resp.items.len().min(limit));
        for repo in resp.items {
            if out.len() >= limit {
                break;
            }
            let title = normalize_text(&repo.full_name);
            if title.is_empty() {
                continue;
            }
            let description = normalize_text(repo.description.as_deref().unwrap_or_default());
            let language = repo.language.as_deref().unwrap_or_default();
            let searchable_text = format!("{title} {description} {language}");

            out.push(RawItem {
                id: format!("repo-search:{}", repo.full_name),
                kind: SourceKind::RepoSearch,
                title,
                link: repo.html_url,
                published_at: repo.created_at.as_deref().and_then(parse_rfc3339_to_unix),
                popularity: repo.stargazers_count,
                prescore: Self::prescore(focus_terms, &format!("{description} {language}")),
                searchable_text,
            });
        }

        histogram!("briefing_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("briefing_items_parsed_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceClient for RepoSearchClient {
    async fn fetch(&self, limit: usize) -> Result<Vec<RawItem>> {
        let per_page = limit.to_string();
        let mut req = self
            .http
            .get(&self.endpoint)
            .header("Accept", "application/vnd.github+json")
            .query(&[
                ("q", self.query.as_str()),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ]);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let body = req
            .send()
            .await
            .context("repo search http get")?
            .error_for_status()
            .context("repo search http status")?
            .text()
            .await
            .context("repo search body")?;
        Self::parse_results(&body, limit, &self.focus_terms)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::RepoSearch
    }
}
