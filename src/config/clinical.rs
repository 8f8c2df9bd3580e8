// src/config/clinical.rs
//! Clinical reference data: condition taxonomy, NER label map, recommendation
//! catalog and risk policy.
//!
//! Resolution order (first hit wins):
//! 1) `$CLINICAL_CONFIG_PATH` (must exist when set)
//! 2) `config/clinical.toml` relative to the working directory
//! 3) the copy embedded at build time
//!
//! Every load runs `validate()`; an incomplete file is a `ConfigurationError`, so
//! problems surface at boot rather than on a request.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analyze::merge::MergePolicy;
use crate::analyze::recommend::RecommendationCatalog;
use crate::analyze::risk::RiskPolicy;
use crate::error::ConfigurationError;
use crate::types::EntityCategory;

pub const DEFAULT_CLINICAL_CONFIG_PATH: &str = "config/clinical.toml";
pub const ENV_CLINICAL_CONFIG_PATH: &str = "CLINICAL_CONFIG_PATH";

const EMBEDDED_CLINICAL_CONFIG: &str = include_str!("../../config/clinical.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct ClinicalConfig {
    pub taxonomy: Taxonomy,
    pub entities: EntityConfig,
    #[serde(default)]
    pub merge: MergePolicy,
    pub recommendations: RecommendationCatalog,
    pub risk: RiskPolicy,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Taxonomy {
    /// Candidate condition labels; declaration order breaks score ties.
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    /// Model-native label -> category. Keys are lowercased on load.
    pub label_map: BTreeMap<String, EntityCategory>,
}

impl EntityConfig {
    /// Unmapped labels fall into `Other`.
    pub fn category_for(&self, model_label: &str) -> EntityCategory {
        self.label_map
            .get(&model_label.trim().to_ascii_lowercase())
            .copied()
            .unwrap_or(EntityCategory::Other)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// How many predictions to return. `None` returns the full distribution.
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl ClinicalConfig {
    /// Parse and validate a TOML document. `what` names the origin in errors.
    pub fn from_toml_str(raw: &str, what: &str) -> Result<Self, ConfigurationError> {
        let mut cfg: ClinicalConfig =
            toml::from_str(raw).map_err(|source| ConfigurationError::Parse {
                what: what.to_string(),
                source,
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigurationError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, &path.display().to_string())
    }

    /// The repository copy compiled into the binary.
    pub fn embedded() -> Result<Self, ConfigurationError> {
        Self::from_toml_str(EMBEDDED_CLINICAL_CONFIG, "embedded clinical config")
    }

    pub fn load_default() -> Result<Self, ConfigurationError> {
        if let Ok(p) = std::env::var(ENV_CLINICAL_CONFIG_PATH) {
            return Self::load_from(&PathBuf::from(p));
        }
        let default = PathBuf::from(DEFAULT_CLINICAL_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Self::embedded()
    }

    /// Check completeness and normalize lookup keys.
    pub fn validate(&mut self) -> Result<(), ConfigurationError> {
        let labels = &self.taxonomy.conditions;
        if labels.is_empty() {
            return Err(invalid("taxonomy.conditions is empty"));
        }
        let mut seen = BTreeSet::new();
        for label in labels {
            if label.trim().is_empty() {
                return Err(invalid("taxonomy.conditions contains a blank label"));
            }
            if !seen.insert(label.as_str()) {
                return Err(invalid(format!("duplicate condition label '{label}'")));
            }
        }

        if self.entities.label_map.is_empty() {
            return Err(invalid("entities.label_map is empty"));
        }
        self.entities.label_map = std::mem::take(&mut self.entities.label_map)
            .into_iter()
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v))
            .collect();

        if let Some(0) = self.output.top_k {
            return Err(invalid("output.top_k must be at least 1"));
        }

        self.merge.validate()?;
        self.recommendations.validate()?;
        self.risk.validate()?;
        Ok(())
    }
}

pub(crate) fn invalid(msg: impl Into<String>) -> ConfigurationError {
    ConfigurationError::Invalid(msg.into())
}
