// src/backends/mod.rs
//! Model-serving capability traits and their implementations.
//!
//! The adapters in `analyze` only see `EntityModel` / `ZeroShotModel`; swapping a
//! backend never touches merging, risk or recommendations.
//!
//! - `lexicon`: deterministic, offline vocabulary matching (default)
//! - `http`:    Hugging Face inference style JSON endpoints
//! - `mock`:    fixed / failing / stalling models for tests and local runs

pub mod http;
pub mod lexicon;
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{BackendKind, BackendSettings};

/// One span as reported by an NER model, before category mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    /// Surface form.
    #[serde(alias = "text")]
    pub word: String,
    /// Model-native label, e.g. `Sign_symptom`.
    #[serde(alias = "label", alias = "entity")]
    pub entity_group: String,
    pub score: f64,
}

/// Label/score pair from a zero-shot model. Scores need not be normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

#[async_trait]
pub trait EntityModel: Send + Sync {
    async fn recognize(&self, text: &str) -> Result<Vec<RawEntity>>;
    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait ZeroShotModel: Send + Sync {
    async fn classify(&self, text: &str, labels: &[String]) -> Result<Vec<LabelScore>>;
    fn name(&self) -> &'static str;
}

pub type DynEntityModel = Arc<dyn EntityModel>;
pub type DynZeroShotModel = Arc<dyn ZeroShotModel>;

/// Build both models according to settings.
pub fn build_models(settings: &BackendSettings) -> Result<(DynEntityModel, DynZeroShotModel)> {
    let needs_lexicon =
        settings.ner == BackendKind::Lexicon || settings.classifier == BackendKind::Lexicon;
    let lexicon = if needs_lexicon {
        Some(Arc::new(lexicon::Lexicon::load_default(
            settings.lexicon_path.as_deref(),
        )?))
    } else {
        None
    };

    let ner: DynEntityModel = match (settings.ner, &lexicon) {
        (BackendKind::Lexicon, Some(lx)) => Arc::new(lexicon::LexiconNer::new(lx.clone())),
        _ => Arc::new(http::HttpNer::new(
            settings.ner_url.clone().unwrap_or_default(),
            settings.api_token.clone(),
        )?),
    };
    let classifier: DynZeroShotModel = match (settings.classifier, &lexicon) {
        (BackendKind::Lexicon, Some(lx)) => {
            Arc::new(lexicon::KeywordZeroShot::new(lx.clone()))
        }
        _ => Arc::new(http::HttpZeroShot::new(
            settings.zero_shot_url.clone().unwrap_or_default(),
            settings.api_token.clone(),
        )?),
    };
    Ok((ner, classifier))
}
