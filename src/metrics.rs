// src/metrics.rs
//! Prometheus exposition for the pipeline counters.
//!
//! Series: analysis_requests_total, analysis_invalid_total, analysis_degraded_total{stage},
//! analysis_latency_ms (histogram), documents_processed_total{kind},
//! analysis_taxonomy_conditions (gauge).

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

const LATENCY_BUCKETS_MS: &[f64] = &[5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 10000.0];

/// The recorder is process-global; later `init` calls reuse it.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the taxonomy size gauge.
    pub fn init(taxonomy_size: usize) -> Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                PrometheusBuilder::new()
                    .set_buckets_for_metric(
                        Matcher::Full("analysis_latency_ms".to_string()),
                        LATENCY_BUCKETS_MS,
                    )
                    .context("configuring latency buckets")?
                    .install_recorder()
                    .context("installing prometheus recorder")
            })?
            .clone();

        gauge!("analysis_taxonomy_conditions").set(taxonomy_size as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
