// tests/config_files.rs
//
// Loading clinical reference data and lexicon vocabularies from disk.
// Env-mutating tests run serially.

use std::io::Write as _;

use tempfile::NamedTempFile;
use triage_analyzer::backends::lexicon::Lexicon;
use triage_analyzer::config::clinical::ENV_CLINICAL_CONFIG_PATH;
use triage_analyzer::config::ClinicalConfig;
use triage_analyzer::ConfigurationError;

const REPO_CONFIG: &str = include_str!("../config/clinical.toml");

fn write_tmp(contents: &str) -> NamedTempFile {
    let mut f = NamedTempFile::new().expect("tempfile");
    f.write_all(contents.as_bytes()).expect("write tempfile");
    f
}

#[serial_test::serial]
#[test]
fn env_path_overrides_repo_config() {
    let custom = REPO_CONFIG.replace("critical = 80.0", "critical = 90.0");
    let f = write_tmp(&custom);
    std::env::set_var(ENV_CLINICAL_CONFIG_PATH, f.path());

    let cfg = ClinicalConfig::load_default().expect("custom config loads");
    assert_eq!(cfg.risk.thresholds.critical, 90.0);

    std::env::remove_var(ENV_CLINICAL_CONFIG_PATH);
}

#[serial_test::serial]
#[test]
fn env_path_to_missing_file_is_an_error() {
    std::env::set_var(ENV_CLINICAL_CONFIG_PATH, "/nonexistent/clinical.toml");
    let err = ClinicalConfig::load_default().unwrap_err();
    assert!(matches!(err, ConfigurationError::Read { .. }));
    std::env::remove_var(ENV_CLINICAL_CONFIG_PATH);
}

#[test]
fn thresholds_must_ascend() {
    let broken = REPO_CONFIG.replace("high = 60.0", "high = 20.0");
    let f = write_tmp(&broken);
    let err = ClinicalConfig::load_from(f.path()).unwrap_err();
    assert!(err.to_string().contains("thresholds"), "{err}");
}

#[test]
fn negative_weights_are_rejected() {
    let broken = REPO_CONFIG.replace("disease = 5.0", "disease = -5.0");
    let err = ClinicalConfig::from_toml_str(&broken, "test").unwrap_err();
    assert!(err.to_string().contains("non-negative"), "{err}");
}

#[test]
fn unknown_category_keys_are_rejected() {
    let broken = REPO_CONFIG.replace("treatment = 3.0", "procedure = 3.0");
    let err = ClinicalConfig::from_toml_str(&broken, "test").unwrap_err();
    assert!(err.to_string().contains("procedure"), "{err}");
}

#[test]
fn lexicon_loads_from_explicit_path() {
    let f = write_tmp(
        r#"
        [[ner]]
        label = "Sign_symptom"
        confidence = 0.9
        terms = ["tinnitus"]
        "#,
    );
    let path = f.path().to_str().expect("utf8 path");
    assert!(Lexicon::load_default(Some(path)).is_ok());
    assert!(Lexicon::load_default(Some("/nonexistent/lexicon.toml")).is_err());
}
