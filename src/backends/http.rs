// src/backends/http.rs
//! HTTP model backends speaking the Hugging Face inference JSON shapes.
//!
//! NER:       POST {"inputs": text, "parameters": {"aggregation_strategy": "simple"}}
//!            -> [{"entity_group", "word", "score", ...}]
//! Zero-shot: POST {"inputs": text, "parameters": {"candidate_labels": [...], "multi_label": true}}
//!            -> {"labels": [...], "scores": [...]}
//!
//! Timeouts here are transport-level; the adapters put their own per-call deadline on top.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{EntityModel, LabelScore, RawEntity, ZeroShotModel};

const USER_AGENT: &str = concat!("triage-analyzer/", env!("CARGO_PKG_VERSION"));

pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(30))
        .build()
        .context("building reqwest client")
}

pub struct HttpNer {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpNer {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl EntityModel for HttpNer {
    async fn recognize(&self, text: &str) -> Result<Vec<RawEntity>> {
        #[derive(Serialize)]
        struct Params<'a> {
            aggregation_strategy: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            inputs: &'a str,
            parameters: Params<'a>,
        }

        let req = Req {
            inputs: text,
            parameters: Params {
                aggregation_strategy: "simple",
            },
        };
        let mut call = self.http.post(&self.url).json(&req);
        if let Some(t) = &self.token {
            call = call.bearer_auth(t);
        }
        let resp = call.send().await.context("NER request")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("NER backend returned {status}");
        }
        resp.json::<Vec<RawEntity>>()
            .await
            .context("decoding NER response")
    }

    fn name(&self) -> &'static str {
        "http-ner"
    }
}

pub struct HttpZeroShot {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpZeroShot {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            url: url.into(),
            token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ZeroShotResp {
    labels: Vec<String>,
    scores: Vec<f64>,
}

impl ZeroShotResp {
    fn into_scores(self) -> Result<Vec<LabelScore>> {
        if self.labels.len() != self.scores.len() {
            bail!(
                "zero-shot response has {} labels but {} scores",
                self.labels.len(),
                self.scores.len()
            );
        }
        Ok(self
            .labels
            .into_iter()
            .zip(self.scores)
            .map(|(label, score)| LabelScore { label, score })
            .collect())
    }
}

#[async_trait]
impl ZeroShotModel for HttpZeroShot {
    async fn classify(&self, text: &str, labels: &[String]) -> Result<Vec<LabelScore>> {
        #[derive(Serialize)]
        struct Params<'a> {
            candidate_labels: &'a [String],
            multi_label: bool,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            inputs: &'a str,
            parameters: Params<'a>,
        }

        let req = Req {
            inputs: text,
            parameters: Params {
                candidate_labels: labels,
                multi_label: true,
            },
        };
        let mut call = self.http.post(&self.url).json(&req);
        if let Some(t) = &self.token {
            call = call.bearer_auth(t);
        }
        let resp = call.send().await.context("zero-shot request")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("zero-shot backend returned {status}");
        }
        let body: ZeroShotResp = resp.json().await.context("decoding zero-shot response")?;
        body.into_scores()
    }

    fn name(&self) -> &'static str {
        "http-zero-shot"
    }
}
