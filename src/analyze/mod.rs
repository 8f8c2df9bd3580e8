// src/analyze/mod.rs
//! Analysis pipeline entry: validate, fan out to the model adapters, then
//! merge -> assess -> generate into one `AnalysisResult`.
//!
//! Order:
//! 1) request validation (the only failure path)
//! 2) concurrently: extract(symptoms), extract(document), classify(combined text)
//! 3) merge entities, assess risk against the top condition, generate recommendations
//! 4) assemble flags, truncate predictions to `output.top_k`

pub mod classify;
pub mod extract;
pub mod merge;
pub mod recommend;
pub mod risk;

use anyhow::Result;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::backends::lexicon::{KeywordZeroShot, Lexicon, LexiconNer};
use crate::backends::{DynEntityModel, DynZeroShotModel};
use crate::config::{ClinicalConfig, PipelineSettings};
use crate::error::AnalysisError;
use crate::privacy::{anon_hash, truncate_chars};
use crate::types::{AnalysisFlag, AnalysisRequest, AnalysisResult, SourceTag, DISCLAIMER};

pub use classify::{Classification, ConditionClassifier};
pub use extract::{EntityExtractor, Extraction};
pub use merge::{merge, MergePolicy};
pub use recommend::{generate, RecommendationCatalog};
pub use risk::{assess, RiskPolicy};

/// Separates symptom text from document text in the classifier input.
pub const DOCUMENT_BOUNDARY: &str = "\n\n[document]\n";

pub const MAX_AGE: u32 = 120;

/// Stateless across requests; share behind an `Arc`.
pub struct Analyzer {
    config: ClinicalConfig,
    settings: PipelineSettings,
    extractor: EntityExtractor,
    classifier: ConditionClassifier,
}

impl Analyzer {
    pub fn new(
        config: ClinicalConfig,
        ner: DynEntityModel,
        zero_shot: DynZeroShotModel,
        settings: PipelineSettings,
    ) -> Self {
        let extractor = EntityExtractor::new(ner, config.entities.clone(), &settings);
        let classifier =
            ConditionClassifier::new(zero_shot, config.taxonomy.conditions.clone(), &settings);
        Self {
            config,
            settings,
            extractor,
            classifier,
        }
    }

    /// Offline analyzer over the embedded vocabulary.
    pub fn with_lexicon_backends(config: ClinicalConfig, settings: PipelineSettings) -> Result<Self> {
        let lexicon = Arc::new(Lexicon::embedded()?);
        Ok(Self::new(
            config,
            Arc::new(LexiconNer::new(lexicon.clone())),
            Arc::new(KeywordZeroShot::new(lexicon)),
            settings,
        ))
    }

    pub fn config(&self) -> &ClinicalConfig {
        &self.config
    }

    /// (entity model, zero-shot model) backend names.
    pub fn backend_names(&self) -> (&'static str, &'static str) {
        (self.extractor.backend_name(), self.classifier.backend_name())
    }

    /// Entities in a standalone document, as the upload route reports them.
    pub async fn extract_document(&self, text: &str) -> Extraction {
        self.extractor.extract(text, SourceTag::Document).await
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        counter!("analysis_requests_total").increment(1);
        if let Err(e) = validate(request) {
            counter!("analysis_invalid_total").increment(1);
            debug!(target: "analysis", error = %e, "rejected analysis request");
            return Err(e);
        }
        let started = Instant::now();

        let symptoms = request.symptoms();
        let document = request.document();
        let combined =
            combined_classifier_input(symptoms, document, self.settings.max_classifier_chars);

        let (from_symptoms, from_document, classification) = tokio::join!(
            self.extractor
                .extract(symptoms.unwrap_or_default(), SourceTag::Symptoms),
            self.extractor
                .extract(document.unwrap_or_default(), SourceTag::Document),
            self.classifier.classify(&combined),
        );

        let mut flags = Vec::new();
        if from_symptoms.degraded {
            flags.push(AnalysisFlag::DegradedExtraction {
                source: SourceTag::Symptoms,
            });
        }
        if from_document.degraded {
            flags.push(AnalysisFlag::DegradedExtraction {
                source: SourceTag::Document,
            });
        }
        flags.extend(classification.flag);

        let entities = merge(
            &from_symptoms.entities,
            &from_document.entities,
            &self.config.merge,
        );
        let mut predictions = classification.predictions;
        let top = predictions.first();
        let risk = assess(request, &entities, top, &self.config.risk);
        let recommendations = generate(
            &risk,
            &entities,
            top,
            request,
            &self.config.recommendations,
        );
        let overall_confidence = top.map(|p| p.score).unwrap_or(0.0);
        if let Some(k) = self.config.output.top_k {
            predictions.truncate(k);
        }

        let latency_ms = started.elapsed().as_millis() as u64;
        histogram!("analysis_latency_ms").record(latency_ms as f64);
        info!(
            target: "analysis",
            input = %anon_hash(&combined),
            has_document = document.is_some(),
            entities = entities.len(),
            risk_level = risk.level.as_str(),
            degraded = flags.len(),
            latency_ms,
            "analysis complete"
        );

        Ok(AnalysisResult {
            entities,
            predicted_conditions: predictions,
            risk_level: risk.level,
            risk_factors: risk.factors,
            risk_score: request.include_risk_score.then_some(risk.score),
            recommendations,
            overall_confidence,
            flags,
            disclaimer: DISCLAIMER,
        })
    }
}

/// Reject requests with no usable text or an impossible age.
pub fn validate(request: &AnalysisRequest) -> Result<(), AnalysisError> {
    if request.symptoms().is_none() && request.document().is_none() {
        return Err(AnalysisError::InvalidRequest(
            "symptoms_text or document_text must contain text".into(),
        ));
    }
    if let Some(age) = request.age.filter(|a| *a > MAX_AGE) {
        return Err(AnalysisError::InvalidRequest(format!(
            "age {age} is outside 0..={MAX_AGE}"
        )));
    }
    Ok(())
}

/// Symptom text, boundary, document text; capped at `max_chars`.
pub fn combined_classifier_input(
    symptoms: Option<&str>,
    document: Option<&str>,
    max_chars: usize,
) -> String {
    let joined = match (symptoms, document) {
        (Some(s), Some(d)) => format!("{s}{DOCUMENT_BOUNDARY}{d}"),
        (Some(s), None) => s.to_string(),
        (None, Some(d)) => d.to_string(),
        (None, None) => String::new(),
    };
    truncate_chars(&joined, max_chars).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::{FailingModel, FixedEntities, FixedScores};
    use crate::backends::{LabelScore, RawEntity};
    use crate::types::{EntityCategory, RiskLevel, Severity};

    fn config() -> ClinicalConfig {
        ClinicalConfig::embedded().unwrap()
    }

    #[test]
    fn validation_rules() {
        assert!(validate(&AnalysisRequest::from_symptoms("  ")).is_err());
        assert!(validate(&AnalysisRequest::from_symptoms("").with_document("lab report")).is_ok());
        assert!(validate(&AnalysisRequest::from_symptoms("fever").with_age(120)).is_ok());
        assert!(matches!(
            validate(&AnalysisRequest::from_symptoms("fever").with_age(121)),
            Err(AnalysisError::InvalidRequest(_))
        ));
    }

    #[test]
    fn combined_input_joins_and_truncates() {
        assert_eq!(
            combined_classifier_input(Some("cough"), Some("X-ray"), 100),
            "cough\n\n[document]\nX-ray"
        );
        assert_eq!(combined_classifier_input(None, Some("X-ray"), 100), "X-ray");
        assert_eq!(combined_classifier_input(Some("abcdef"), Some("zz"), 4), "abcd");
    }

    #[tokio::test]
    async fn pipeline_wires_mock_models() {
        let cfg = config();
        let top_label = cfg.taxonomy.conditions[1].clone();
        let ner = FixedEntities {
            fixed: vec![RawEntity {
                word: "chest pain".into(),
                entity_group: "Sign_symptom".into(),
                score: 0.9,
            }],
        };
        let zs = FixedScores {
            fixed: vec![LabelScore {
                label: top_label.clone(),
                score: 1.0,
            }],
        };
        let analyzer = Analyzer::new(cfg, Arc::new(ner), Arc::new(zs), PipelineSettings::default());

        let mut req = AnalysisRequest::from_symptoms("crushing chest pain")
            .with_age(60)
            .with_severity(Severity::Severe)
            .with_document("ECG: ST elevation. chest pain on exertion");
        req.include_risk_score = true;
        let out = analyzer.analyze(&req).await.unwrap();

        // same identity from both sources -> one corroborated entity
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].category, EntityCategory::Symptom);
        assert_eq!(out.entities[0].source, SourceTag::Symptoms);
        assert!((out.entities[0].confidence - 1.0).abs() < 1e-12);

        assert_eq!(out.predicted_conditions[0].label, top_label);
        assert_eq!(out.overall_confidence, 1.0);
        assert_eq!(out.risk_level, RiskLevel::Critical);
        assert!(out.risk_score.is_some());
        assert!(out.flags.is_empty());
    }

    #[tokio::test]
    async fn failing_models_still_produce_a_result() {
        let analyzer = Analyzer::new(
            config(),
            Arc::new(FailingModel),
            Arc::new(FailingModel),
            PipelineSettings::default(),
        );
        let req = AnalysisRequest::from_symptoms("fever").with_document("CBC normal");
        let out = analyzer.analyze(&req).await.unwrap();
        assert!(out.entities.is_empty());
        assert!(out.is_degraded());
        assert_eq!(
            out.flags,
            vec![
                AnalysisFlag::DegradedExtraction {
                    source: SourceTag::Symptoms
                },
                AnalysisFlag::DegradedExtraction {
                    source: SourceTag::Document
                },
                AnalysisFlag::DegradedClassification,
            ]
        );
        assert!(out.risk_score.is_none());
    }

    #[tokio::test]
    async fn top_k_truncates_predictions() {
        let mut cfg = config();
        cfg.output.top_k = Some(3);
        let analyzer = Analyzer::with_lexicon_backends(cfg, PipelineSettings::default()).unwrap();
        let out = analyzer
            .analyze(&AnalysisRequest::from_symptoms("headache and dizziness"))
            .await
            .unwrap();
        assert_eq!(out.predicted_conditions.len(), 3);
    }
}
