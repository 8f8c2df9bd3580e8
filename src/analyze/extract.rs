// src/analyze/extract.rs
//! Entity extractor adapter: NER model call -> typed `MedicalEntity` list.
//!
//! Steps per call:
//! 1) blank text short-circuits to an empty list (no model call)
//! 2) model call under the per-call deadline; failure or timeout -> empty + degraded
//! 3) drop spans below the confidence cutoff or shorter than `min_entity_chars`
//! 4) fold model labels into categories via the configured label map
//! 5) collapse repeated identities (first position, max confidence)

use metrics::counter;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use crate::backends::{DynEntityModel, RawEntity};
use crate::config::clinical::EntityConfig;
use crate::config::PipelineSettings;
use crate::privacy::truncate_chars;
use crate::types::{MedicalEntity, SourceTag};

/// Output of one extraction. `degraded` means the model could not answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub entities: Vec<MedicalEntity>,
    pub degraded: bool,
}

impl Extraction {
    fn degraded() -> Self {
        Self {
            entities: Vec::new(),
            degraded: true,
        }
    }
}

pub struct EntityExtractor {
    model: DynEntityModel,
    labels: EntityConfig,
    min_confidence: f64,
    min_chars: usize,
    max_chars: usize,
    timeout: Duration,
}

impl EntityExtractor {
    pub fn new(model: DynEntityModel, labels: EntityConfig, settings: &PipelineSettings) -> Self {
        Self {
            model,
            labels,
            min_confidence: settings.min_entity_confidence,
            min_chars: settings.min_entity_chars,
            max_chars: settings.max_extraction_chars,
            timeout: settings.model_timeout,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.model.name()
    }

    pub async fn extract(&self, text: &str, source: SourceTag) -> Extraction {
        if text.trim().is_empty() {
            return Extraction::default();
        }
        let input = truncate_chars(text, self.max_chars);

        let raw = match timeout(self.timeout, self.model.recognize(input)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(
                    target: "analysis",
                    backend = self.model.name(),
                    source = source.as_str(),
                    error = %e,
                    "entity extraction failed; continuing without entities"
                );
                counter!("analysis_degraded_total", "stage" => "extraction").increment(1);
                return Extraction::degraded();
            }
            Err(_) => {
                warn!(
                    target: "analysis",
                    backend = self.model.name(),
                    source = source.as_str(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "entity extraction timed out; continuing without entities"
                );
                counter!("analysis_degraded_total", "stage" => "extraction").increment(1);
                return Extraction::degraded();
            }
        };

        Extraction {
            entities: self.normalize(raw, source),
            degraded: false,
        }
    }

    /// Filter, map and collapse raw model spans.
    pub fn normalize(&self, raw: Vec<RawEntity>, source: SourceTag) -> Vec<MedicalEntity> {
        let mut out: Vec<MedicalEntity> = Vec::with_capacity(raw.len());
        let mut index: HashMap<_, usize> = HashMap::new();

        for r in raw {
            if !r.score.is_finite() || r.score < self.min_confidence {
                continue;
            }
            // Word-piece markers from token classification pipelines.
            let word = r.word.trim().trim_start_matches("##").trim();
            if word.chars().count() < self.min_chars {
                continue;
            }

            let entity = MedicalEntity::new(
                word,
                self.labels.category_for(&r.entity_group),
                source,
                r.score,
            );
            match index.get(&entity.identity()) {
                Some(&i) => {
                    if entity.confidence > out[i].confidence {
                        out[i].confidence = entity.confidence;
                    }
                }
                None => {
                    index.insert(entity.identity(), out.len());
                    out.push(entity);
                }
            }
        }
        out
    }
}
