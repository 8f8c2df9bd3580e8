// tests/degraded_paths.rs
//
// Model failures and deadlines never fail an analysis: the result comes back
// complete, with flags saying which stage fell back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use triage_analyzer::backends::lexicon::{KeywordZeroShot, Lexicon, LexiconNer};
use triage_analyzer::backends::mock::{FailingModel, StallingModel};
use triage_analyzer::config::{ClinicalConfig, PipelineSettings};
use triage_analyzer::types::{AnalysisFlag, AnalysisRequest, Severity, SourceTag};
use triage_analyzer::Analyzer;

fn lexicon() -> Arc<Lexicon> {
    Arc::new(Lexicon::embedded().expect("embedded lexicon"))
}

fn settings() -> PipelineSettings {
    PipelineSettings::default().with_timeout(Duration::from_millis(100))
}

#[tokio::test]
async fn classifier_timeout_yields_uniform_distribution() {
    let cfg = ClinicalConfig::embedded().unwrap();
    let taxonomy = cfg.taxonomy.conditions.clone();
    let analyzer = Analyzer::new(
        cfg,
        Arc::new(LexiconNer::new(lexicon())),
        Arc::new(StallingModel {
            delay: Duration::from_secs(30),
        }),
        settings(),
    );

    let req = AnalysisRequest::from_symptoms("Severe chest pain radiating to my left arm")
        .with_age(55)
        .with_severity(Severity::Severe);
    let started = Instant::now();
    let out = analyzer.analyze(&req).await.expect("result despite timeout");
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(out.flags, vec![AnalysisFlag::DegradedClassification]);
    assert!(out.is_degraded());
    let expected = 1.0 / taxonomy.len() as f64;
    assert!(out
        .predicted_conditions
        .iter()
        .all(|p| (p.score - expected).abs() < 1e-12));
    let labels: Vec<&String> = out.predicted_conditions.iter().map(|p| &p.label).collect();
    assert_eq!(labels, taxonomy.iter().collect::<Vec<_>>());

    // entities still extracted, emergency sign still counted
    assert!(out.entities.iter().any(|e| e.text == "chest pain"));
    assert!(out.risk_factors.iter().any(|f| f.contains("chest pain")));
}

#[tokio::test]
async fn extraction_failure_flags_each_source() {
    let analyzer = Analyzer::new(
        ClinicalConfig::embedded().unwrap(),
        Arc::new(FailingModel),
        Arc::new(KeywordZeroShot::new(lexicon())),
        settings(),
    );
    let req = AnalysisRequest::from_symptoms("fever and chills").with_document("CRP elevated, infection suspected");
    let out = analyzer.analyze(&req).await.unwrap();

    assert!(out.entities.is_empty());
    assert_eq!(
        out.flags,
        vec![
            AnalysisFlag::DegradedExtraction {
                source: SourceTag::Symptoms
            },
            AnalysisFlag::DegradedExtraction {
                source: SourceTag::Document
            },
        ]
    );
    // classifier still answered
    assert!(out.predicted_conditions[0].label.starts_with("Infectious"));
}

#[tokio::test]
async fn symptom_only_request_never_calls_the_model_for_the_document() {
    let analyzer = Analyzer::new(
        ClinicalConfig::embedded().unwrap(),
        Arc::new(FailingModel),
        Arc::new(KeywordZeroShot::new(lexicon())),
        settings(),
    );
    let out = analyzer
        .analyze(&AnalysisRequest::from_symptoms("headache"))
        .await
        .unwrap();
    assert_eq!(
        out.flags,
        vec![AnalysisFlag::DegradedExtraction {
            source: SourceTag::Symptoms
        }]
    );
}

#[tokio::test]
async fn degraded_flags_serialize_for_clients() {
    let analyzer = Analyzer::new(
        ClinicalConfig::embedded().unwrap(),
        Arc::new(FailingModel),
        Arc::new(FailingModel),
        settings(),
    );
    let out = analyzer
        .analyze(&AnalysisRequest::from_symptoms("dizziness"))
        .await
        .unwrap();
    let v = serde_json::to_value(&out).unwrap();
    let kinds: Vec<&str> = v["flags"]
        .as_array()
        .expect("flags array")
        .iter()
        .filter_map(|f| f["kind"].as_str())
        .collect();
    assert_eq!(kinds, vec!["degraded_extraction", "degraded_classification"]);
}
