// src/api.rs
//! HTTP transport over the analysis pipeline.
//!
//! Routes:
//! - GET  /health
//! - POST /api/analyze                 AnalysisRequest -> AnalysisResult
//! - POST /api/analyze-with-documents  same, plus `document_texts`, `previous_diagnoses`
//!                                     and `current_medications` folded into the document
//! - POST /api/upload-document         multipart `file` -> extracted text, preview, entities
//!
//! Domain errors and body rejections map to a JSON `{ "error": ... }` body with a
//! 4xx/5xx status.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, FromRequest,
        Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::analyze::Analyzer;
use crate::backends::build_models;
use crate::config::{BackendSettings, ClinicalConfig, PipelineSettings};
use crate::document::{
    build_extractor, DynDocumentExtractor, ExtractedDocument, PlainTextExtractor, MAX_UPLOAD_BYTES,
};
use crate::error::{AnalysisError, DocumentExtractionError};
use crate::types::{AnalysisFlag, AnalysisRequest, AnalysisResult, MedicalEntity, SourceTag};

/// Multipart framing on top of the file itself.
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub documents: DynDocumentExtractor,
}

impl AppState {
    pub fn new(analyzer: Analyzer, documents: DynDocumentExtractor) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            documents,
        }
    }

    /// Wire everything from the environment and the clinical config on disk.
    pub fn from_env() -> Result<Self> {
        let config = ClinicalConfig::load_default().context("loading clinical config")?;
        let backends = BackendSettings::from_env()?;
        let (ner, zero_shot) = build_models(&backends).context("building model backends")?;
        let documents = build_extractor(&backends).context("building document extractor")?;
        Ok(Self::new(
            Analyzer::new(config, ner, zero_shot, PipelineSettings::from_env()),
            documents,
        ))
    }

    /// Embedded config, lexicon models, plain-text documents. No env, no network.
    pub fn offline() -> Result<Self> {
        let config = ClinicalConfig::embedded()?;
        let analyzer = Analyzer::with_lexicon_backends(config, PipelineSettings::default())?;
        Ok(Self::new(analyzer, Arc::new(PlainTextExtractor)))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/analyze-with-documents", post(analyze_with_documents))
        .route("/api/upload-document", post(upload_document))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + UPLOAD_BODY_SLACK))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    Analysis(AnalysisError),
    Document(DocumentExtractionError),
    Multipart(MultipartError),
    Json(JsonRejection),
    MissingFile,
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        ApiError::Analysis(e)
    }
}

impl From<DocumentExtractionError> for ApiError {
    fn from(e: DocumentExtractionError) -> Self {
        ApiError::Document(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Multipart(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Json(e)
    }
}

/// `Json` whose rejections answer with the `{ "error": ... }` body.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
struct AppJson<T>(T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Analysis(e @ AnalysisError::InvalidRequest(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Document(e) => {
                let status = match &e {
                    DocumentExtractionError::UnsupportedType(_)
                    | DocumentExtractionError::OcrUnavailable(_) => {
                        StatusCode::UNSUPPORTED_MEDIA_TYPE
                    }
                    DocumentExtractionError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    DocumentExtractionError::EmptyText | DocumentExtractionError::NotUtf8 => {
                        StatusCode::BAD_REQUEST
                    }
                    DocumentExtractionError::Backend(_) => StatusCode::BAD_GATEWAY,
                };
                (status, e.to_string())
            }
            ApiError::Multipart(e) => (e.status(), e.body_text()),
            ApiError::Json(e) => (e.status(), e.body_text()),
            ApiError::MissingFile => (
                StatusCode::BAD_REQUEST,
                "multipart field 'file' is required".to_string(),
            ),
        };
        warn!(target: "api", status = status.as_u16(), error = %message, "request failed");
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (ner, classifier) = state.analyzer.backend_names();
    Json(json!({
        "status": "ok",
        "ner_backend": ner,
        "classifier_backend": classifier,
        "document_backend": state.documents.name(),
        "conditions": state.analyzer.config().taxonomy.conditions.len(),
    }))
}

async fn analyze(
    State(state): State<AppState>,
    AppJson(request): AppJson<AnalysisRequest>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let result = state.analyzer.analyze(&request).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct AnalyzeWithDocumentsReq {
    #[serde(flatten)]
    request: AnalysisRequest,
    /// Texts of previously uploaded documents, appended to `document_text`.
    #[serde(default)]
    document_texts: Vec<String>,
    #[serde(default)]
    previous_diagnoses: Option<Vec<String>>,
    #[serde(default)]
    current_medications: Option<Vec<String>>,
}

/// `"{heading}: a, b"` over the non-blank items, `None` when nothing is left.
fn history_line(heading: &str, items: Option<Vec<String>>) -> Option<String> {
    let items: Vec<String> = items
        .unwrap_or_default()
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    (!items.is_empty()).then(|| format!("{heading}: {}", items.join(", ")))
}

impl AnalyzeWithDocumentsReq {
    fn into_request(self) -> AnalysisRequest {
        let mut request = self.request;
        let history = history_line("Previous diagnoses", self.previous_diagnoses)
            .into_iter()
            .chain(history_line("Current medications", self.current_medications));
        let parts: Vec<String> = request
            .document_text
            .take()
            .into_iter()
            .chain(self.document_texts)
            .filter(|t| !t.trim().is_empty())
            .chain(history)
            .collect();
        if !parts.is_empty() {
            request.document_text = Some(parts.join("\n\n"));
        }
        request
    }
}

async fn analyze_with_documents(
    State(state): State<AppState>,
    AppJson(body): AppJson<AnalyzeWithDocumentsReq>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let request = body.into_request();
    let result = state.analyzer.analyze(&request).await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
struct UploadResp {
    #[serde(flatten)]
    document: ExtractedDocument,
    text_length: usize,
    entities: Vec<MedicalEntity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    flags: Vec<AnalysisFlag>,
    message: String,
}

async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResp>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await?;
        let document = state.documents.extract(&bytes, &file_name).await?;
        let extraction = state.analyzer.extract_document(&document.text).await;
        let flags = if extraction.degraded {
            vec![AnalysisFlag::DegradedExtraction {
                source: SourceTag::Document,
            }]
        } else {
            Vec::new()
        };
        info!(
            target: "api",
            document_id = %document.document_id,
            file_type = %document.file_type,
            entities = extraction.entities.len(),
            degraded = extraction.degraded,
            "document uploaded"
        );
        return Ok(Json(UploadResp {
            text_length: document.text.chars().count(),
            message: format!(
                "Document processed. Extracted {} medical entities.",
                extraction.entities.len()
            ),
            entities: extraction.entities,
            flags,
            document,
        }));
    }
    Err(ApiError::MissingFile)
}
