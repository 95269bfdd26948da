// src/generate.rs
//! The external text-generation collaborator, consumed as a black box: it
//! receives a bounded list of {title, link, kind} tuples and returns one
//! text blob, which the pipeline writes verbatim to a dated file.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::briefing::HandoffItem;

#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate(&self, items: &[HandoffItem]) -> Result<String>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Chat-completions backed generator. Requires `OPENAI_API_KEY`.
pub struct OpenAiGenerator {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(model_override: Option<&str>) -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent("trend-briefing/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client");
        Self {
            http,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key,
            model: model_override.unwrap_or("gpt-4o-mini").to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn prompt(items: &[HandoffItem]) -> String {
        let mut out = String::from(
            "Write a short daily tech briefing in Markdown from the items below. \
             Group related items, keep one paragraph per theme, link every item \
             you mention. Output only the document.\n\n",
        );
        for it in items {
            out.push_str(&format!("- [{}] {} ({})\n", it.kind, it.title, it.link));
        }
        out
    }
}

#[async_trait]
impl DocumentGenerator for OpenAiGenerator {
    async fn generate(&self, items: &[HandoffItem]) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("OPENAI_API_KEY is not set");
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let prompt = Self::prompt(items);
        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
            temperature: 0.4,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("generation http post")?
            .error_for_status()
            .context("generation http status")?;

        let body: Resp = resp.json().await.context("generation response json")?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.trim())
            .unwrap_or_default();
        if content.is_empty() {
            bail!("generation returned an empty document");
        }
        Ok(content.to_string())
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
