// src/config/settings.rs
//! Runtime knobs read from the environment (after `.env` is loaded).
//!
//! - `MODEL_TIMEOUT_MS`        per model call, default 10000
//! - `MIN_ENTITY_CONFIDENCE`   NER cutoff in [0,1], default 0.5
//! - `NER_BACKEND`             "lexicon" | "http" (default lexicon)
//! - `CLASSIFIER_BACKEND`      "lexicon" | "http" (default lexicon)
//! - `NER_URL` / `ZERO_SHOT_URL` required for the http backends
//! - `HF_API_TOKEN`            bearer token for the http backends ("" = none)
//! - `LEXICON_CONFIG_PATH`     vocabulary for the lexicon backends
//! - `OCR_URL`                 optional OCR service for pdf/image uploads
//! - `METRICS_ENABLED=1`       expose /metrics

use anyhow::{bail, Result};
use std::time::Duration;

pub const ENV_MODEL_TIMEOUT_MS: &str = "MODEL_TIMEOUT_MS";
pub const ENV_MIN_ENTITY_CONFIDENCE: &str = "MIN_ENTITY_CONFIDENCE";

/// Per-analysis limits and cutoffs.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model_timeout: Duration,
    pub min_entity_confidence: f64,
    /// Surface forms shorter than this are dropped.
    pub min_entity_chars: usize,
    pub max_extraction_chars: usize,
    pub max_classifier_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_millis(10_000),
            min_entity_confidence: 0.5,
            min_entity_chars: 3,
            max_extraction_chars: 8_000,
            max_classifier_chars: 4_000,
        }
    }
}

impl PipelineSettings {
    pub fn from_env() -> Self {
        let mut s = Self::default();
        if let Some(ms) = parse_env::<u64>(ENV_MODEL_TIMEOUT_MS).filter(|ms| *ms > 0) {
            s.model_timeout = Duration::from_millis(ms);
        }
        if let Some(c) = parse_env::<f64>(ENV_MIN_ENTITY_CONFIDENCE).filter(|c| c.is_finite()) {
            s.min_entity_confidence = c.clamp(0.0, 1.0);
        }
        s
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Lexicon,
    Http,
}

impl BackendKind {
    fn parse(var: &str, raw: Option<String>) -> Result<Self> {
        match raw.as_deref().map(|s| s.trim().to_ascii_lowercase()) {
            None => Ok(BackendKind::Lexicon),
            Some(v) if v.is_empty() || v == "lexicon" => Ok(BackendKind::Lexicon),
            Some(v) if v == "http" => Ok(BackendKind::Http),
            Some(other) => bail!("Unsupported {var}: {other}"),
        }
    }
}

/// Which model/OCR backends to build and where they live.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub ner: BackendKind,
    pub classifier: BackendKind,
    pub ner_url: Option<String>,
    pub zero_shot_url: Option<String>,
    pub api_token: Option<String>,
    pub lexicon_path: Option<String>,
    pub ocr_url: Option<String>,
    pub metrics_enabled: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            ner: BackendKind::Lexicon,
            classifier: BackendKind::Lexicon,
            ner_url: None,
            zero_shot_url: None,
            api_token: None,
            lexicon_path: None,
            ocr_url: None,
            metrics_enabled: false,
        }
    }
}

impl BackendSettings {
    pub fn from_env() -> Result<Self> {
        let cfg = Self {
            ner: BackendKind::parse("NER_BACKEND", env_opt("NER_BACKEND"))?,
            classifier: BackendKind::parse("CLASSIFIER_BACKEND", env_opt("CLASSIFIER_BACKEND"))?,
            ner_url: env_opt("NER_URL"),
            zero_shot_url: env_opt("ZERO_SHOT_URL"),
            api_token: env_opt("HF_API_TOKEN"),
            lexicon_path: env_opt("LEXICON_CONFIG_PATH"),
            ocr_url: env_opt("OCR_URL"),
            metrics_enabled: env_opt("METRICS_ENABLED").is_some_and(|v| v == "1"),
        };
        if cfg.ner == BackendKind::Http && cfg.ner_url.is_none() {
            bail!("NER_BACKEND=http requires NER_URL");
        }
        if cfg.classifier == BackendKind::Http && cfg.zero_shot_url.is_none() {
            bail!("CLASSIFIER_BACKEND=http requires ZERO_SHOT_URL");
        }
        Ok(cfg)
    }
}

/// Non-empty, trimmed env value.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear() {
        for k in [
            "NER_BACKEND",
            "CLASSIFIER_BACKEND",
            "NER_URL",
            "ZERO_SHOT_URL",
            ENV_MODEL_TIMEOUT_MS,
            ENV_MIN_ENTITY_CONFIDENCE,
        ] {
            env::remove_var(k);
        }
    }

    #[serial_test::serial]
    #[test]
    fn defaults_without_env() {
        clear();
        let b = BackendSettings::from_env().unwrap();
        assert_eq!(b.ner, BackendKind::Lexicon);
        assert_eq!(b.classifier, BackendKind::Lexicon);
        let p = PipelineSettings::from_env();
        assert_eq!(p.model_timeout, Duration::from_millis(10_000));
        assert!((p.min_entity_confidence - 0.5).abs() < 1e-12);
    }

    #[serial_test::serial]
    #[test]
    fn http_backend_needs_url() {
        clear();
        env::set_var("NER_BACKEND", "HTTP");
        assert!(BackendSettings::from_env().is_err());
        env::set_var("NER_URL", "http://localhost:9000/ner");
        let b = BackendSettings::from_env().unwrap();
        assert_eq!(b.ner, BackendKind::Http);
        clear();
    }

    #[serial_test::serial]
    #[test]
    fn pipeline_env_is_clamped_and_filtered() {
        clear();
        env::set_var(ENV_MIN_ENTITY_CONFIDENCE, "1.7");
        env::set_var(ENV_MODEL_TIMEOUT_MS, "0");
        let p = PipelineSettings::from_env();
        assert_eq!(p.min_entity_confidence, 1.0);
        assert_eq!(p.model_timeout, Duration::from_millis(10_000));
        clear();
    }

    #[serial_test::serial]
    #[test]
    fn unknown_backend_is_rejected() {
        clear();
        env::set_var("CLASSIFIER_BACKEND", "onnx");
        assert!(BackendSettings::from_env().is_err());
        clear();
    }
}
