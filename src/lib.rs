// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analyze;
pub mod api;
pub mod backends;
pub mod config;
pub mod document;
pub mod error;
pub mod metrics;
pub mod privacy;
pub mod types;

pub use crate::analyze::Analyzer;
pub use crate::api::{router, AppState};
pub use crate::error::{AnalysisError, ConfigurationError, DocumentExtractionError};
pub use crate::types::{AnalysisRequest, AnalysisResult};

use axum::Router;
use tracing::info;

use crate::config::BackendSettings;

/// Full application router as the server runs it: state from env + clinical config,
/// plus `/metrics` when `METRICS_ENABLED=1`.
pub async fn app() -> anyhow::Result<Router> {
    let state = AppState::from_env()?;
    let mut app = router(state.clone());

    if BackendSettings::from_env()?.metrics_enabled {
        let m = crate::metrics::Metrics::init(state.analyzer.config().taxonomy.conditions.len())?;
        app = app.merge(m.router());
    }

    let (ner, classifier) = state.analyzer.backend_names();
    info!(
        target: "api",
        ner_backend = ner,
        classifier_backend = classifier,
        document_backend = state.documents.name(),
        "router ready"
    );
    Ok(app)
}
