// src/backends/lexicon.rs
//! Offline vocabulary backends.
//!
//! `config/lexicon.toml` (or `$LEXICON_CONFIG_PATH`, or the embedded copy) holds:
//! - `[[ner]]` groups: `{ label, confidence, terms }`; every whole-word, case-insensitive
//!   term hit becomes a span labeled `label` with that confidence. Overlaps resolve
//!   leftmost-longest.
//! - `[classifier]`: per taxonomy label keyword lists. Score = (hits + smoothing) /
//!   (total hits + smoothing * labels); no hits at all yields an all-zero answer.
//!
//! Both are pure functions of the input text, which keeps analyses reproducible.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use super::{EntityModel, LabelScore, RawEntity, ZeroShotModel};

const DEFAULT_LEXICON_PATH: &str = "config/lexicon.toml";
const EMBEDDED_LEXICON: &str = include_str!("../../config/lexicon.toml");

#[derive(Debug, Deserialize)]
struct LexiconFile {
    #[serde(default)]
    ner: Vec<NerGroup>,
    #[serde(default)]
    classifier: ClassifierVocab,
}

#[derive(Debug, Deserialize)]
struct NerGroup {
    label: String,
    confidence: f64,
    terms: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierVocab {
    #[serde(default = "default_smoothing")]
    smoothing: f64,
    #[serde(default)]
    conditions: Vec<ConditionVocab>,
}

#[derive(Debug, Deserialize)]
struct ConditionVocab {
    label: String,
    keywords: Vec<String>,
}

fn default_smoothing() -> f64 {
    0.1
}

#[derive(Debug)]
struct Term {
    label: String,
    confidence: f64,
    re: Regex,
}

/// Compiled vocabulary shared by both lexicon backends.
#[derive(Debug)]
pub struct Lexicon {
    terms: Vec<Term>,
    conditions: Vec<(String, Vec<Regex>)>,
    smoothing: f64,
}

impl Lexicon {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: LexiconFile = toml::from_str(raw).context("parsing lexicon")?;

        let mut terms = Vec::new();
        for group in file.ner {
            for term in group.terms {
                terms.push(Term {
                    label: group.label.clone(),
                    confidence: group.confidence.clamp(0.0, 1.0),
                    re: word_regex(&term)?,
                });
            }
        }

        let mut conditions = Vec::with_capacity(file.classifier.conditions.len());
        for c in file.classifier.conditions {
            let res = c
                .keywords
                .iter()
                .map(|k| word_regex(k))
                .collect::<Result<Vec<_>>>()?;
            conditions.push((c.label, res));
        }

        Ok(Self {
            terms,
            conditions,
            smoothing: file.classifier.smoothing.max(0.0),
        })
    }

    /// Explicit path, else `config/lexicon.toml` if present, else the embedded copy.
    pub fn load_default(path: Option<&str>) -> Result<Self> {
        if let Some(p) = path {
            let raw = fs::read_to_string(p).with_context(|| format!("reading lexicon from {p}"))?;
            return Self::from_toml_str(&raw);
        }
        let default = PathBuf::from(DEFAULT_LEXICON_PATH);
        if default.exists() {
            let raw = fs::read_to_string(&default)
                .with_context(|| format!("reading lexicon from {}", default.display()))?;
            return Self::from_toml_str(&raw);
        }
        Self::from_toml_str(EMBEDDED_LEXICON)
    }

    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(EMBEDDED_LEXICON)
    }

    fn spans(&self, text: &str) -> Vec<RawEntity> {
        struct Hit {
            start: usize,
            end: usize,
            term: usize,
        }

        let mut hits = Vec::new();
        for (i, t) in self.terms.iter().enumerate() {
            for m in t.re.find_iter(text) {
                hits.push(Hit {
                    start: m.start(),
                    end: m.end(),
                    term: i,
                });
            }
        }
        // Leftmost first, longest first, then vocabulary order.
        hits.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then((b.end - b.start).cmp(&(a.end - a.start)))
                .then(a.term.cmp(&b.term))
        });

        let mut out = Vec::new();
        let mut cursor = 0usize;
        for h in hits {
            if h.start < cursor {
                continue;
            }
            cursor = h.end;
            let t = &self.terms[h.term];
            out.push(RawEntity {
                word: text[h.start..h.end].to_string(),
                entity_group: t.label.clone(),
                score: t.confidence,
            });
        }
        out
    }

    fn score_labels(&self, text: &str, labels: &[String]) -> Vec<LabelScore> {
        let hits: Vec<usize> = labels
            .iter()
            .map(|label| {
                self.conditions
                    .iter()
                    .find(|(l, _)| l == label)
                    .map(|(_, kws)| kws.iter().filter(|re| re.is_match(text)).count())
                    .unwrap_or(0)
            })
            .collect();

        let total: usize = hits.iter().sum();
        let denom = total as f64 + self.smoothing * labels.len() as f64;
        labels
            .iter()
            .zip(hits)
            .map(|(label, h)| LabelScore {
                label: label.clone(),
                score: if total == 0 {
                    0.0
                } else {
                    (h as f64 + self.smoothing) / denom
                },
            })
            .collect()
    }
}

fn word_regex(term: &str) -> Result<Regex> {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(term.trim()));
    Regex::new(&pattern).with_context(|| format!("compiling lexicon term '{term}'"))
}

pub struct LexiconNer {
    lexicon: Arc<Lexicon>,
}

impl LexiconNer {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }
}

#[async_trait]
impl EntityModel for LexiconNer {
    async fn recognize(&self, text: &str) -> Result<Vec<RawEntity>> {
        Ok(self.lexicon.spans(text))
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

pub struct KeywordZeroShot {
    lexicon: Arc<Lexicon>,
}

impl KeywordZeroShot {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self { lexicon }
    }
}

#[async_trait]
impl ZeroShotModel for KeywordZeroShot {
    async fn classify(&self, text: &str, labels: &[String]) -> Result<Vec<LabelScore>> {
        Ok(self.lexicon.score_labels(text, labels))
    }

    fn name(&self) -> &'static str {
        "lexicon-zero-shot"
    }
}
