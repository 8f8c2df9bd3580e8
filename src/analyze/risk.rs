// src/analyze/risk.rs
//! Risk stratifier: additive, bounded score over weighted signals -> risk level.
//!
//! Signals (each weight comes from `RiskPolicy`, loaded from `[risk]` in clinical.toml):
//! - reported severity
//! - age band
//! - duration bucket (highest bucket reached)
//! - emergency warning signs among merged entities
//! - presence of weighted entity categories
//! - entity volume bucket
//! - top condition score x (high-risk | default) weight
//!
//! Score = sum clamped to [0, max_score]; level from ascending thresholds.
//! Every weight is non-negative and bucket weights never decrease, so raising any one
//! signal never lowers the level.

use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::clinical::invalid;
use crate::error::ConfigurationError;
use crate::types::{
    normalize_identity_text, AnalysisRequest, ConditionPrediction, EntityCategory,
    MedicalEntity, RiskAssessment, RiskLevel, Severity,
};

#[derive(Debug, Clone, Deserialize)]
pub struct RiskPolicy {
    pub max_score: f64,
    /// Contributions below this are left out of `factors`.
    #[serde(default = "default_min_factor_contribution")]
    pub min_factor_contribution: f64,
    pub thresholds: Thresholds,
    pub severity: SeverityWeights,
    #[serde(default)]
    pub age_bands: Vec<AgeBand>,
    #[serde(default)]
    pub duration_buckets: Vec<DurationBucket>,
    #[serde(default)]
    pub emergency: EmergencyPatterns,
    /// Category name -> weight added when any entity of that category is present.
    #[serde(default)]
    pub category_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub entity_volume: Vec<VolumeBucket>,
    pub classifier: ClassifierWeights,
}

fn default_min_factor_contribution() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    pub moderate: f64,
    pub high: f64,
    pub critical: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeverityWeights {
    pub mild: f64,
    pub moderate: f64,
    pub severe: f64,
}

impl SeverityWeights {
    fn weight(&self, s: Severity) -> f64 {
        match s {
            Severity::Mild => self.mild,
            Severity::Moderate => self.moderate,
            Severity::Severe => self.severe,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgeBand {
    pub label: String,
    pub min: u32,
    pub max: u32,
    pub weight: f64,
}

/// Reached once the reported duration is at least `min_days`.
#[derive(Debug, Clone, Deserialize)]
pub struct DurationBucket {
    pub label: String,
    pub min_days: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeBucket {
    pub label: String,
    pub min_count: usize,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmergencyPatterns {
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierWeights {
    /// Lowercase substrings marking a high-risk condition label.
    #[serde(default)]
    pub high_risk_keywords: Vec<String>,
    pub high_risk_weight: f64,
    pub default_weight: f64,
}

impl RiskPolicy {
    pub fn validate(&mut self) -> Result<(), ConfigurationError> {
        let mut weights: Vec<(&str, f64)> = vec![
            ("risk.max_score", self.max_score),
            ("risk.min_factor_contribution", self.min_factor_contribution),
            ("risk.severity.mild", self.severity.mild),
            ("risk.severity.moderate", self.severity.moderate),
            ("risk.severity.severe", self.severity.severe),
            ("risk.emergency.weight", self.emergency.weight),
            ("risk.classifier.high_risk_weight", self.classifier.high_risk_weight),
            ("risk.classifier.default_weight", self.classifier.default_weight),
        ];
        weights.extend(self.age_bands.iter().map(|b| ("risk.age_bands", b.weight)));
        weights.extend(self.duration_buckets.iter().map(|b| ("risk.duration_buckets", b.weight)));
        weights.extend(self.entity_volume.iter().map(|b| ("risk.entity_volume", b.weight)));
        weights.extend(self.category_weights.values().map(|w| ("risk.category_weights", *w)));
        for (name, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(invalid(format!("{name} must be a non-negative number")));
            }
        }

        let t = &self.thresholds;
        if !(0.0 < t.moderate && t.moderate < t.high && t.high < t.critical && t.critical <= self.max_score)
        {
            return Err(invalid(
                "risk.thresholds must satisfy 0 < moderate < high < critical <= max_score",
            ));
        }

        let s = &self.severity;
        if !(s.mild <= s.moderate && s.moderate <= s.severe) {
            return Err(invalid("risk.severity weights must not decrease from mild to severe"));
        }

        let mut bands: Vec<&AgeBand> = self.age_bands.iter().collect();
        bands.sort_by_key(|b| b.min);
        for b in &bands {
            if b.min > b.max {
                return Err(invalid(format!("age band '{}' has min > max", b.label)));
            }
        }
        for pair in bands.windows(2) {
            if pair[1].min <= pair[0].max {
                return Err(invalid(format!(
                    "age bands '{}' and '{}' overlap",
                    pair[0].label, pair[1].label
                )));
            }
        }

        self.duration_buckets.sort_by_key(|b| b.min_days);
        for pair in self.duration_buckets.windows(2) {
            if pair[0].min_days == pair[1].min_days || pair[1].weight < pair[0].weight {
                return Err(invalid(
                    "risk.duration_buckets need distinct min_days and non-decreasing weights",
                ));
            }
        }

        self.entity_volume.sort_by_key(|b| b.min_count);
        for pair in self.entity_volume.windows(2) {
            if pair[0].min_count == pair[1].min_count || pair[1].weight < pair[0].weight {
                return Err(invalid(
                    "risk.entity_volume needs distinct min_count and non-decreasing weights",
                ));
            }
        }

        for key in self.category_weights.keys() {
            if EntityCategory::parse(key).is_none() {
                return Err(invalid(format!("unknown entity category '{key}' in risk.category_weights")));
            }
        }

        self.emergency.patterns = self
            .emergency
            .patterns
            .iter()
            .map(|p| normalize_identity_text(p))
            .filter(|p| !p.is_empty())
            .collect();
        self.classifier.high_risk_keywords = self
            .classifier
            .high_risk_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Ok(())
    }

    fn category_weight(&self, c: EntityCategory) -> f64 {
        self.category_weights
            .iter()
            .find(|(k, _)| EntityCategory::parse(k) == Some(c))
            .map(|(_, w)| *w)
            .unwrap_or(0.0)
    }

    fn level_for(&self, score: f64) -> RiskLevel {
        let t = &self.thresholds;
        if score >= t.critical {
            RiskLevel::Critical
        } else if score >= t.high {
            RiskLevel::High
        } else if score >= t.moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

/// Score the request. Never fails.
pub fn assess(
    request: &AnalysisRequest,
    entities: &[MedicalEntity],
    top_condition: Option<&ConditionPrediction>,
    policy: &RiskPolicy,
) -> RiskAssessment {
    let mut contributions: Vec<(f64, String)> = Vec::new();

    let sev = request.severity;
    contributions.push((
        policy.severity.weight(sev),
        format!("{} severity reported", sev.as_str()),
    ));

    if let Some(age) = request.age {
        if let Some(band) = policy
            .age_bands
            .iter()
            .find(|b| (b.min..=b.max).contains(&age))
        {
            contributions.push((band.weight, format!("age {age}: {}", band.label)));
        }
    }

    let days = request.symptom_duration_days;
    if let Some(bucket) = policy
        .duration_buckets
        .iter()
        .rev()
        .find(|b| days >= b.min_days)
    {
        contributions.push((bucket.weight, format!("{} ({days} days)", bucket.label)));
    }

    let mut warning_signs: Vec<&str> = Vec::new();
    for e in entities {
        let text = normalize_identity_text(&e.text);
        for p in &policy.emergency.patterns {
            if text.contains(p.as_str()) && !warning_signs.contains(&p.as_str()) {
                warning_signs.push(p.as_str());
            }
        }
    }
    if !warning_signs.is_empty() {
        contributions.push((
            policy.emergency.weight,
            format!("emergency warning signs: {}", warning_signs.join(", ")),
        ));
    }

    for c in EntityCategory::ALL {
        let w = policy.category_weight(c);
        if w > 0.0 && entities.iter().any(|e| e.category == c) {
            contributions.push((w, format!("{} entities present", c.as_str())));
        }
    }

    let distinct = entities.len();
    if let Some(bucket) = policy
        .entity_volume
        .iter()
        .rev()
        .find(|b| distinct >= b.min_count)
    {
        contributions.push((bucket.weight, format!("{} ({distinct} entities)", bucket.label)));
    }

    if let Some(top) = top_condition {
        let label = top.label.to_lowercase();
        let high_risk = policy
            .classifier
            .high_risk_keywords
            .iter()
            .any(|k| label.contains(k.as_str()));
        let weight = if high_risk {
            policy.classifier.high_risk_weight
        } else {
            policy.classifier.default_weight
        };
        let short = top.label.split('(').next().unwrap_or(&top.label).trim();
        contributions.push((
            top.score.clamp(0.0, 1.0) * weight,
            format!(
                "{}condition match: {short} ({:.0}%)",
                if high_risk { "high-risk " } else { "" },
                top.score * 100.0
            ),
        ));
    }

    let raw: f64 = contributions.iter().map(|(c, _)| *c).sum();
    let score = raw.clamp(0.0, policy.max_score);
    let level = policy.level_for(score);

    // Stable: equal contributions keep signal order.
    contributions.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    let factors = contributions
        .into_iter()
        .filter(|(c, _)| *c >= policy.min_factor_contribution)
        .map(|(_, f)| f)
        .collect();

    RiskAssessment {
        level,
        factors,
        score,
    }
}
