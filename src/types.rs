// src/types.rs
//! Request, entity, prediction, risk and result shapes.
//!
//! Everything here is built fresh for one analysis and dropped once the response is
//! serialized. Field names are the stable contract with the transport layer.

use serde::{Deserialize, Deserializer, Serialize};

/// Fixed category set every model-native NER label is folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    Disease,
    Symptom,
    Medication,
    Treatment,
    Other,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 5] = [
        EntityCategory::Disease,
        EntityCategory::Symptom,
        EntityCategory::Medication,
        EntityCategory::Treatment,
        EntityCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Disease => "disease",
            EntityCategory::Symptom => "symptom",
            EntityCategory::Medication => "medication",
            EntityCategory::Treatment => "treatment",
            EntityCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
    }
}

/// Which input text an entity was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Symptoms,
    Document,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Symptoms => "symptoms",
            SourceTag::Document => "document",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalEntity {
    /// Surface form as it appeared in the source text.
    pub text: String,
    pub category: EntityCategory,
    pub source: SourceTag,
    /// Model confidence in [0,1].
    pub confidence: f64,
}

impl MedicalEntity {
    pub fn new(
        text: impl Into<String>,
        category: EntityCategory,
        source: SourceTag,
        confidence: f64,
    ) -> Self {
        Self {
            text: text.into(),
            category,
            source,
            confidence: clamp01(confidence),
        }
    }

    /// Deduplication key: normalized text + category.
    pub fn identity(&self) -> (String, EntityCategory) {
        (normalize_identity_text(&self.text), self.category)
    }
}

/// Lowercase and collapse runs of whitespace.
pub fn normalize_identity_text(input: &str) -> String {
    input
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Self-reported severity. Missing or unrecognized values read as `Moderate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    #[default]
    Moderate,
    Severe,
}

impl Severity {
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "mild" => Severity::Mild,
            "severe" => Severity::Severe,
            _ => Severity::Moderate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(raw
            .as_str()
            .map(Severity::parse_lenient)
            .unwrap_or_default())
    }
}

/// Inbound analysis request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub symptoms_text: String,
    #[serde(default)]
    pub document_text: Option<String>,
    /// Years, 0..=120.
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub symptom_duration_days: u32,
    /// Expose the internal risk score in the result.
    #[serde(default)]
    pub include_risk_score: bool,
}

impl AnalysisRequest {
    pub fn from_symptoms(text: impl Into<String>) -> Self {
        Self {
            symptoms_text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_document(mut self, text: impl Into<String>) -> Self {
        self.document_text = Some(text.into());
        self
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_duration_days(mut self, days: u32) -> Self {
        self.symptom_duration_days = days;
        self
    }

    /// Symptom text if it has any non-whitespace content.
    pub fn symptoms(&self) -> Option<&str> {
        non_blank(&self.symptoms_text)
    }

    /// Document text if present and non-blank.
    pub fn document(&self) -> Option<&str> {
        self.document_text.as_deref().and_then(non_blank)
    }
}

fn non_blank(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionPrediction {
    pub label: String,
    pub score: f64,
    /// Short human-readable explanation of the score band.
    pub reasoning: String,
}

impl ConditionPrediction {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        let label = label.into();
        let reasoning = reasoning_for(&label, score);
        Self {
            label,
            score,
            reasoning,
        }
    }
}

fn reasoning_for(label: &str, score: f64) -> String {
    let band = if score > 0.7 {
        "high"
    } else if score > 0.4 {
        "moderate"
    } else {
        "low"
    };
    let short = label.split('(').next().unwrap_or(label).trim();
    format!(
        "There is {band} confidence ({:.1}%) that the description aligns with {short}.",
        score * 100.0
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Moderate,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Contributing signals, largest contribution first.
    pub factors: Vec<String>,
    pub score: f64,
}

/// What produced a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecommendationTrigger {
    RiskLevel(RiskLevel),
    Category(EntityCategory),
    Condition(String),
    Severity(Severity),
    Document,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub text: String,
    pub trigger: RecommendationTrigger,
}

impl Recommendation {
    pub fn new(text: impl Into<String>, trigger: RecommendationTrigger) -> Self {
        Self {
            text: text.into(),
            trigger,
        }
    }
}

/// Reduced-confidence markers. Never failures: the result is still complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisFlag {
    DegradedExtraction { source: SourceTag },
    DegradedClassification,
    LowConfidence,
}

pub const DISCLAIMER: &str =
    "Automated analysis for informational purposes only. It is not a diagnosis; consult a healthcare professional.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub entities: Vec<MedicalEntity>,
    pub predicted_conditions: Vec<ConditionPrediction>,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    pub recommendations: Vec<Recommendation>,
    /// Score of the top prediction.
    pub overall_confidence: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<AnalysisFlag>,
    pub disclaimer: &'static str,
}

impl AnalysisResult {
    pub fn is_degraded(&self) -> bool {
        self.flags.iter().any(|f| {
            matches!(
                f,
                AnalysisFlag::DegradedExtraction { .. } | AnalysisFlag::DegradedClassification
            )
        })
    }
}

pub(crate) fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
