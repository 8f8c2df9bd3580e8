// src/analyze/merge.rs
//! Entity merger: reconcile symptom-text and document-text entities.
//!
//! Policy:
//! - identity = normalized text + category; repeats inside one list collapse first
//!   (first position, max confidence)
//! - an identity present in both lists keeps the symptom entry, takes the higher
//!   confidence and adds `corroboration_bonus`, capped at 1.0
//! - order: symptom list in extraction order, then document-only entities by
//!   descending confidence (extraction order on ties)
//!
//! Pure and total.

use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::config::clinical::invalid;
use crate::error::ConfigurationError;
use crate::types::{EntityCategory, MedicalEntity};

#[derive(Debug, Clone, Deserialize)]
pub struct MergePolicy {
    #[serde(default = "default_corroboration_bonus")]
    pub corroboration_bonus: f64,
}

fn default_corroboration_bonus() -> f64 {
    0.1
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            corroboration_bonus: default_corroboration_bonus(),
        }
    }
}

impl MergePolicy {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(0.0..=1.0).contains(&self.corroboration_bonus) {
            return Err(invalid("merge.corroboration_bonus must be within [0, 1]"));
        }
        Ok(())
    }
}

type Identity = (String, EntityCategory);

/// Collapse repeated identities, keeping first position and max confidence.
fn collapse(entities: &[MedicalEntity]) -> Vec<(Identity, MedicalEntity)> {
    let mut out: Vec<(Identity, MedicalEntity)> = Vec::with_capacity(entities.len());
    let mut index: HashMap<Identity, usize> = HashMap::new();
    for e in entities {
        let id = e.identity();
        match index.get(&id) {
            Some(&i) => {
                if e.confidence > out[i].1.confidence {
                    out[i].1.confidence = e.confidence;
                }
            }
            None => {
                index.insert(id.clone(), out.len());
                out.push((id, e.clone()));
            }
        }
    }
    out
}

pub fn merge(
    symptom_entities: &[MedicalEntity],
    document_entities: &[MedicalEntity],
    policy: &MergePolicy,
) -> Vec<MedicalEntity> {
    let symptoms = collapse(symptom_entities);
    let documents = collapse(document_entities);

    let doc_conf: HashMap<&Identity, f64> =
        documents.iter().map(|(id, e)| (id, e.confidence)).collect();

    let mut merged = Vec::with_capacity(symptoms.len() + documents.len());
    for (id, mut e) in symptoms.iter().cloned() {
        if let Some(&dc) = doc_conf.get(&id) {
            e.confidence = (e.confidence.max(dc) + policy.corroboration_bonus).min(1.0);
        }
        merged.push(e);
    }

    let symptom_ids: HashSet<&Identity> = symptoms.iter().map(|(id, _)| id).collect();
    let mut document_only: Vec<MedicalEntity> = documents
        .iter()
        .filter(|(id, _)| !symptom_ids.contains(id))
        .map(|(_, e)| e.clone())
        .collect();
    document_only.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    merged.extend(document_only);
    merged
}
