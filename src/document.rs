// src/document.rs
//! Document-to-text boundary for uploaded medical files.
//!
//! Accepted uploads: pdf, jpg, jpeg, png, txt up to 10 MB.
//! - `.txt` is decoded locally (UTF-8, BOM tolerated)
//! - pdf and images go to an OCR service when `OCR_URL` is set, otherwise they are
//!   rejected with `OcrUnavailable`
//!
//! Extracted text is cleaned (HTML entities decoded, known HTML tags stripped, whitespace
//! collapsed per line, blank lines dropped). Comparators such as `<LOD` or `>5` are text
//! and survive cleaning. The document id is derived from the content hash so
//! the same upload always yields the same id.

use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backends::http::http_client;
use crate::config::BackendSettings;
use crate::error::DocumentExtractionError;
use crate::privacy::{anon_hash, truncate_chars};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Image,
    Text,
}

impl FileKind {
    /// Extension (case-insensitive, without the dot) -> kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "jpg" | "jpeg" | "png" => Some(FileKind::Image),
            "txt" => Some(FileKind::Text),
            _ => None,
        }
    }

    fn mime(&self, ext: &str) -> &'static str {
        match self {
            FileKind::Pdf => "application/pdf",
            FileKind::Text => "text/plain",
            FileKind::Image if ext.eq_ignore_ascii_case("png") => "image/png",
            FileKind::Image => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedDocument {
    /// `DOC-` + first 8 hex digits of the content SHA-256.
    pub document_id: String,
    pub file_name: String,
    /// Lowercased extension.
    pub file_type: String,
    pub kind: FileKind,
    pub size: usize,
    pub text: String,
    pub preview: String,
}

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(
        &self,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<ExtractedDocument, DocumentExtractionError>;

    fn name(&self) -> &'static str;
}

pub type DynDocumentExtractor = Arc<dyn DocumentExtractor>;

/// Check type and size before any decoding. Returns (kind, lowercased extension).
pub fn validate_upload(
    bytes: &[u8],
    file_name: &str,
) -> Result<(FileKind, String), DocumentExtractionError> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.trim().to_ascii_lowercase())
        .unwrap_or_default();
    let kind = FileKind::from_extension(&ext).ok_or_else(|| {
        DocumentExtractionError::UnsupportedType(if ext.is_empty() {
            file_name.to_string()
        } else {
            ext.clone()
        })
    })?;
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(DocumentExtractionError::TooLarge {
            size: bytes.len(),
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok((kind, ext))
}

pub fn document_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut id = String::from("DOC-");
    for b in digest.iter().take(4) {
        let _ = write!(&mut id, "{:02X}", b);
    }
    id
}

/// Formatting tags OCR services and exported reports wrap text in.
const HTML_TAG_PATTERN: &str = concat!(
    r"(?i)</?(?:a|abbr|b|blockquote|body|br|center|code|div|em|font|h[1-6]|head|hr|html|i|",
    r"li|ol|p|pre|s|small|span|strong|sub|sup|table|tbody|td|tfoot|th|thead|title|tr|u|ul)",
    r#"(?:\s+[a-z][a-z0-9-]*(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s<>"']+))?)*\s*/?>"#,
);

/// Decode entities, strip HTML tags, collapse whitespace within lines, drop blank lines.
pub fn clean_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);

    static RE_TAGS: OnceCell<Option<Regex>> = OnceCell::new();
    let stripped = match RE_TAGS.get_or_init(|| Regex::new(HTML_TAG_PATTERN).ok()) {
        Some(re) => re.replace_all(&decoded, " ").into_owned(),
        None => decoded.into_owned(),
    };

    stripped
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_plain_text(bytes: &[u8]) -> Result<String, DocumentExtractionError> {
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(body)
        .map(str::to_string)
        .map_err(|_| DocumentExtractionError::NotUtf8)
}

/// First `PREVIEW_CHARS` characters, with `...` appended when the text is longer.
pub fn preview(text: &str) -> String {
    let head = truncate_chars(text, PREVIEW_CHARS);
    if head.len() < text.len() {
        format!("{head}...")
    } else {
        head.to_string()
    }
}

fn finish(
    raw_text: &str,
    bytes: &[u8],
    file_name: &str,
    kind: FileKind,
    ext: String,
) -> Result<ExtractedDocument, DocumentExtractionError> {
    let text = clean_text(raw_text);
    if text.is_empty() {
        return Err(DocumentExtractionError::EmptyText);
    }
    let doc = ExtractedDocument {
        document_id: document_id(bytes),
        file_name: file_name.to_string(),
        file_type: ext,
        kind,
        size: bytes.len(),
        preview: preview(&text),
        text,
    };
    counter!("documents_processed_total", "kind" => doc.file_type.clone()).increment(1);
    info!(
        target: "document",
        document_id = %doc.document_id,
        file_type = %doc.file_type,
        size = doc.size,
        chars = doc.text.chars().count(),
        content = %anon_hash(&doc.text),
        "document text extracted"
    );
    Ok(doc)
}

/// Plain-text uploads only; pdf and images are reported as `OcrUnavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract(
        &self,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<ExtractedDocument, DocumentExtractionError> {
        let (kind, ext) = validate_upload(bytes, file_name)?;
        if kind != FileKind::Text {
            return Err(DocumentExtractionError::OcrUnavailable(ext));
        }
        let raw = decode_plain_text(bytes)?;
        finish(&raw, bytes, file_name, kind, ext)
    }

    fn name(&self) -> &'static str {
        "plain-text"
    }
}

/// Sends pdf/image bytes to an OCR endpoint that answers `{"text": "..."}`.
/// Text files never leave the process.
pub struct RemoteOcrExtractor {
    http: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct OcrResp {
    #[serde(default)]
    text: String,
}

impl RemoteOcrExtractor {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            url: url.into(),
        })
    }

    async fn ocr(&self, bytes: &[u8], mime: &str, file_name: &str) -> Result<String, DocumentExtractionError> {
        let backend = |e: reqwest::Error| DocumentExtractionError::Backend(e.to_string());
        let resp = self
            .http
            .post(&self.url)
            .query(&[("filename", file_name)])
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(backend)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DocumentExtractionError::Backend(format!("OCR service returned {status}")));
        }
        let body: OcrResp = resp.json().await.map_err(backend)?;
        Ok(body.text)
    }
}

#[async_trait]
impl DocumentExtractor for RemoteOcrExtractor {
    async fn extract(
        &self,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<ExtractedDocument, DocumentExtractionError> {
        let (kind, ext) = validate_upload(bytes, file_name)?;
        let raw = match kind {
            FileKind::Text => decode_plain_text(bytes)?,
            _ => self.ocr(bytes, kind.mime(&ext), file_name).await.inspect_err(|e| {
                warn!(target: "document", file_type = %ext, error = %e, "OCR call failed");
            })?,
        };
        finish(&raw, bytes, file_name, kind, ext)
    }

    fn name(&self) -> &'static str {
        "remote-ocr"
    }
}

/// OCR-backed when `OCR_URL` is configured, plain text otherwise.
pub fn build_extractor(settings: &BackendSettings) -> Result<DynDocumentExtractor> {
    Ok(match &settings.ocr_url {
        Some(url) => Arc::new(RemoteOcrExtractor::new(url.clone())?),
        None => Arc::new(PlainTextExtractor),
    })
}
