//! Analyze one JSON request offline and print the JSON result.
//!
//! Usage: analyze-file <request.json | ->
//! Uses the embedded clinical config and the lexicon backends; no network.

use anyhow::{bail, Context, Result};
use std::io::Read;
use triage_analyzer::config::{ClinicalConfig, PipelineSettings};
use triage_analyzer::{AnalysisRequest, Analyzer};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: analyze-file <request.json | ->");
    };
    let raw = if path == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?
    };
    let request: AnalysisRequest = serde_json::from_str(&raw).context("parsing request JSON")?;

    let config = ClinicalConfig::embedded()?;
    let analyzer = Analyzer::with_lexicon_backends(config, PipelineSettings::default())?;
    let result = analyzer.analyze(&request).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
