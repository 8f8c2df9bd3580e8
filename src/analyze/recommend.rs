// src/analyze/recommend.rs
//! Recommendation generator. Ordered, deduplicated advisory list from the risk level,
//! entity categories, top condition and request context.
//!
//! Output order: base set for the level, severe-severity advisory, one line per present
//! high-signal category, condition-keyword advice, document note, closing line.
//! A text already emitted is skipped (first trigger wins).

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

use crate::config::clinical::invalid;
use crate::error::ConfigurationError;
use crate::types::{
    AnalysisRequest, ConditionPrediction, EntityCategory, MedicalEntity, Recommendation,
    RecommendationTrigger, RiskAssessment, RiskLevel, Severity,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationCatalog {
    /// Risk level name -> base recommendations. All four levels are required.
    pub base: BTreeMap<String, Vec<String>>,
    /// Category name -> targeted recommendation.
    #[serde(default)]
    pub categories: BTreeMap<String, String>,
    /// Categories that earn a targeted line when present, in emission order.
    #[serde(default)]
    pub high_signal_categories: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<ConditionAdvice>,
    /// Top condition must score at least this to pull in its advice.
    #[serde(default)]
    pub min_condition_score: f64,
    #[serde(default)]
    pub severe_advisory: Option<String>,
    #[serde(default)]
    pub document_note: Option<String>,
    #[serde(default)]
    pub closing: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionAdvice {
    /// Case-insensitive substring of the condition label.
    pub keyword: String,
    pub advice: Vec<String>,
}

impl RecommendationCatalog {
    pub fn validate(&mut self) -> Result<(), ConfigurationError> {
        self.base = std::mem::take(&mut self.base)
            .into_iter()
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v))
            .collect();
        for level in RiskLevel::ALL {
            match self.base.get(level.as_str()) {
                Some(v) if v.iter().any(|t| !t.trim().is_empty()) => {}
                _ => {
                    return Err(invalid(format!(
                        "recommendations.base.{} is missing or empty",
                        level.as_str()
                    )))
                }
            }
        }
        if let Some(unknown) = self
            .base
            .keys()
            .find(|k| !RiskLevel::ALL.iter().any(|l| l.as_str() == k.as_str()))
        {
            return Err(invalid(format!("unknown risk level '{unknown}' in recommendations.base")));
        }

        self.categories = std::mem::take(&mut self.categories)
            .into_iter()
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v))
            .collect();
        for key in self.categories.keys() {
            if EntityCategory::parse(key).is_none() {
                return Err(invalid(format!("unknown entity category '{key}' in recommendations.categories")));
            }
        }
        for name in &mut self.high_signal_categories {
            *name = name.trim().to_ascii_lowercase();
            if EntityCategory::parse(name).is_none() {
                return Err(invalid(format!("unknown high-signal category '{name}'")));
            }
            if !self.categories.contains_key(name.as_str()) {
                return Err(invalid(format!(
                    "high-signal category '{name}' has no entry in recommendations.categories"
                )));
            }
        }

        for c in &mut self.conditions {
            c.keyword = c.keyword.trim().to_lowercase();
            if c.keyword.is_empty() {
                return Err(invalid("recommendations.conditions has a blank keyword"));
            }
        }
        if !(0.0..=1.0).contains(&self.min_condition_score) {
            return Err(invalid("recommendations.min_condition_score must be within [0, 1]"));
        }
        Ok(())
    }

    pub fn base_for(&self, level: RiskLevel) -> &[String] {
        self.base
            .get(level.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

struct Builder {
    out: Vec<Recommendation>,
    seen: HashSet<String>,
}

impl Builder {
    fn push(&mut self, text: &str, trigger: RecommendationTrigger) {
        let text = text.trim();
        if text.is_empty() || !self.seen.insert(text.to_string()) {
            return;
        }
        self.out.push(Recommendation::new(text, trigger));
    }
}

pub fn generate(
    risk: &RiskAssessment,
    entities: &[MedicalEntity],
    top_condition: Option<&ConditionPrediction>,
    request: &AnalysisRequest,
    catalog: &RecommendationCatalog,
) -> Vec<Recommendation> {
    let mut b = Builder {
        out: Vec::new(),
        seen: HashSet::new(),
    };

    for text in catalog.base_for(risk.level) {
        b.push(text, RecommendationTrigger::RiskLevel(risk.level));
    }

    if request.severity == Severity::Severe {
        if let Some(text) = &catalog.severe_advisory {
            b.push(text, RecommendationTrigger::Severity(Severity::Severe));
        }
    }

    for name in &catalog.high_signal_categories {
        let Some(category) = EntityCategory::parse(name) else {
            continue;
        };
        if !entities.iter().any(|e| e.category == category) {
            continue;
        }
        if let Some(text) = catalog.categories.get(name) {
            b.push(text, RecommendationTrigger::Category(category));
        }
    }

    if let Some(top) = top_condition.filter(|t| t.score >= catalog.min_condition_score) {
        let label = top.label.to_lowercase();
        for entry in catalog
            .conditions
            .iter()
            .filter(|c| label.contains(c.keyword.as_str()))
        {
            for text in &entry.advice {
                b.push(text, RecommendationTrigger::Condition(top.label.clone()));
            }
        }
    }

    if request.document().is_some() {
        if let Some(text) = &catalog.document_note {
            b.push(text, RecommendationTrigger::Document);
        }
    }

    if let Some(text) = &catalog.closing {
        b.push(text, RecommendationTrigger::General);
    }

    b.out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClinicalConfig;
    use crate::types::SourceTag;

    fn catalog() -> RecommendationCatalog {
        ClinicalConfig::embedded().unwrap().recommendations
    }

    fn risk(level: RiskLevel) -> RiskAssessment {
        RiskAssessment {
            level,
            factors: vec![],
            score: 0.0,
        }
    }

    fn entity(text: &str, category: EntityCategory) -> MedicalEntity {
        MedicalEntity::new(text, category, SourceTag::Symptoms, 0.9)
    }

    #[test]
    fn critical_case_leads_with_urgent_advice() {
        let req = AnalysisRequest::from_symptoms("chest pain").with_severity(Severity::Severe);
        let top = ConditionPrediction::new("Cardiovascular disease (hypertension, heart disease)", 0.78);
        let recs = generate(
            &risk(RiskLevel::Critical),
            &[entity("chest pain", EntityCategory::Symptom)],
            Some(&top),
            &req,
            &catalog(),
        );
        assert!(recs[0].text.starts_with("URGENT"));
        assert_eq!(recs[0].trigger, RecommendationTrigger::RiskLevel(RiskLevel::Critical));
        assert!(recs.iter().any(|r| r.trigger == RecommendationTrigger::Severity(Severity::Severe)));
        assert!(recs.iter().any(|r| r.trigger == RecommendationTrigger::Category(EntityCategory::Symptom)));
        assert!(recs
            .iter()
            .any(|r| matches!(&r.trigger, RecommendationTrigger::Condition(l) if l.starts_with("Cardiovascular"))));
        assert_eq!(recs.last().unwrap().trigger, RecommendationTrigger::General);
    }

    #[test]
    fn weak_condition_and_missing_document_add_nothing() {
        let req = AnalysisRequest::from_symptoms("sneezing");
        let top = ConditionPrediction::new("Respiratory infection (cold, flu, COVID-19, pneumonia)", 0.2);
        let recs = generate(&risk(RiskLevel::Low), &[], Some(&top), &req, &catalog());
        assert!(recs.iter().all(|r| !matches!(
            r.trigger,
            RecommendationTrigger::Condition(_) | RecommendationTrigger::Document
        )));
        // three base lines + closing
        assert_eq!(recs.len(), 4);
    }

    #[test]
    fn document_note_needs_document_text() {
        let req = AnalysisRequest::from_symptoms("cough").with_document("Chest X-ray: clear");
        let recs = generate(&risk(RiskLevel::Moderate), &[], None, &req, &catalog());
        assert!(recs.iter().any(|r| r.trigger == RecommendationTrigger::Document));
    }

    #[test]
    fn duplicate_texts_keep_the_first_trigger() {
        let mut cat = catalog();
        let dup = cat.base_for(RiskLevel::High)[0].clone();
        cat.categories.insert("disease".into(), dup.clone());
        let recs = generate(
            &risk(RiskLevel::High),
            &[entity("asthma", EntityCategory::Disease)],
            None,
            &AnalysisRequest::from_symptoms("x"),
            &cat,
        );
        let hits: Vec<_> = recs.iter().filter(|r| r.text == dup).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].trigger, RecommendationTrigger::RiskLevel(RiskLevel::High));
    }

    #[test]
    fn high_signal_category_without_text_is_rejected() {
        let mut cat = catalog();
        cat.categories.remove("treatment");
        let err = cat.validate().unwrap_err();
        assert!(err.to_string().contains("treatment"), "{err}");
    }
}
