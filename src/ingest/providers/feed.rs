// src/ingest/providers/feed.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::ingest::types::{RawItem, SourceClient, SourceKind};
use crate::ingest::{normalize_text, scrub_entities_for_xml, slug};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<u64> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
}

/// Generic RSS 2.0 client. One instance per configured feed; the feed name
/// namespaces both item ids and the cache slot.
pub struct FeedClient {
    http: reqwest::Client,
    name: String,
    url: String,
}

impl FeedClient {
    pub fn new(http: reqwest::Client, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            http,
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn parse_feed(name: &str, xml: &str, limit: usize) -> Result<Vec<RawItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).with_context(|| format!("parsing rss for `{name}`"))?;

        let mut out = Vec::with_capacity(rss.channel.items.len().min(limit));
        for it in rss.channel.items {
            if out.len() >= limit {
                break;
            }
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            let link = match it.link {
                Some(l) if !l.trim().is_empty() => l.trim().to_string(),
                _ => continue,
            };
            if title.is_empty() {
                continue;
            }
            let description = normalize_text(it.description.as_deref().unwrap_or_default());

            out.push(RawItem {
                id: format!("feed:{name}:{link}"),
                kind: SourceKind::Feed,
                searchable_text: format!("{title} {description}"),
                title,
                link,
                published_at: it.pub_date.as_deref().and_then(parse_rfc2822_to_unix),
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
impl SourceClient for FeedClient {
    async fn fetch(&self, limit: usize) -> Result<Vec<RawItem>> {
        let body = self
            .http
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("feed `{}` http get", self.name))?
            .error_for_status()
            .with_context(|| format!("feed `{}` http status", self.name))?
            .text()
            .await
            .with_context(|| format!("feed `{}` body", self.name))?;
        Self::parse_feed(&self.name, &body, limit)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    fn slot(&self) -> String {
        format!("feed-{}", slug(&self.name))
    }
}
