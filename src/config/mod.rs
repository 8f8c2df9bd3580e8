// src/config/mod.rs
//! Configuration: clinical reference data (TOML, validated at startup) and
//! env-driven runtime settings.

pub mod clinical;
pub mod settings;

pub use clinical::{ClinicalConfig, OutputConfig};
pub use settings::{BackendKind, BackendSettings, PipelineSettings};
