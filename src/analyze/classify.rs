// src/analyze/classify.rs
//! Condition classifier adapter: zero-shot call against the fixed taxonomy,
//! normalized into a full, sorted probability distribution.
//!
//! Fallbacks (both uniform over the taxonomy):
//! - blank text or an all-zero answer -> `LowConfidence`
//! - model error or deadline hit      -> `DegradedClassification`

use metrics::counter;
use std::cmp::Ordering;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

use crate::backends::{DynZeroShotModel, LabelScore};
use crate::config::PipelineSettings;
use crate::types::{AnalysisFlag, ConditionPrediction};

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Every taxonomy label, descending by score, summing to 1.
    pub predictions: Vec<ConditionPrediction>,
    pub flag: Option<AnalysisFlag>,
}

pub struct ConditionClassifier {
    model: DynZeroShotModel,
    taxonomy: Vec<String>,
    timeout: Duration,
}

impl ConditionClassifier {
    /// `taxonomy` must be non-empty (enforced by config validation).
    pub fn new(model: DynZeroShotModel, taxonomy: Vec<String>, settings: &PipelineSettings) -> Self {
        Self {
            model,
            taxonomy,
            timeout: settings.model_timeout,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.model.name()
    }

    pub async fn classify(&self, text: &str) -> Classification {
        if text.trim().is_empty() {
            return self.uniform(AnalysisFlag::LowConfidence);
        }

        match timeout(self.timeout, self.model.classify(text, &self.taxonomy)).await {
            Ok(Ok(scores)) => self.normalize(scores),
            Ok(Err(e)) => {
                warn!(
                    target: "analysis",
                    backend = self.model.name(),
                    error = %e,
                    "condition classification failed; using uniform distribution"
                );
                counter!("analysis_degraded_total", "stage" => "classification").increment(1);
                self.uniform(AnalysisFlag::DegradedClassification)
            }
            Err(_) => {
                warn!(
                    target: "analysis",
                    backend = self.model.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "condition classification timed out; using uniform distribution"
                );
                counter!("analysis_degraded_total", "stage" => "classification").increment(1);
                self.uniform(AnalysisFlag::DegradedClassification)
            }
        }
    }

    /// Align model output with the taxonomy and renormalize.
    /// Unknown labels are ignored, missing ones score 0, repeats keep the max.
    pub fn normalize(&self, raw: Vec<LabelScore>) -> Classification {
        let mut weights = vec![0.0f64; self.taxonomy.len()];
        for s in raw {
            let Some(i) = self.taxonomy.iter().position(|l| *l == s.label) else {
                continue;
            };
            let v = if s.score.is_finite() { s.score.max(0.0) } else { 0.0 };
            weights[i] = weights[i].max(v);
        }

        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return self.uniform(AnalysisFlag::LowConfidence);
        }

        let mut predictions: Vec<ConditionPrediction> = self
            .taxonomy
            .iter()
            .zip(weights)
            .map(|(label, w)| ConditionPrediction::new(label.clone(), w / total))
            .collect();
        // Stable: equal scores stay in taxonomy order.
        predictions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        Classification {
            predictions,
            flag: None,
        }
    }

    fn uniform(&self, flag: AnalysisFlag) -> Classification {
        let p = 1.0 / self.taxonomy.len().max(1) as f64;
        Classification {
            predictions: self
                .taxonomy
                .iter()
                .map(|label| ConditionPrediction::new(label.clone(), p))
                .collect(),
            flag: Some(flag),
        }
    }
}
