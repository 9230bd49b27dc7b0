use jsbox::pipeline::{Pipeline, PipelineConfig};
use jsbox::transform::TransformOptions;
use serde_json::Value;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn saved_config_loads_back() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("jsbox.json");

    let mut config = PipelineConfig::default();
    config.limits.timeout = Duration::from_millis(1500);
    config.limits.max_output_lines = 3;
    config.transform = TransformOptions::disabled();
    config.random_seed = 42;
    config.save(&path).unwrap();

    let raw: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert_eq!(raw["limits"]["timeout_ms"], 1500);
    assert_eq!(raw["transform"]["instrument_output"], false);

    assert_eq!(PipelineConfig::load(&path).unwrap(), config);
}

#[test]
fn loaded_limits_apply_to_submissions() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("limits.json");
    fs::write(&path, r#"{ "limits": { "max_output_lines": 2 }, "include_ast": false }"#).unwrap();

    let pipeline = Pipeline::new(PipelineConfig::load(&path).unwrap());
    let response = pipeline.submit("print(1); print(2); print(3);");
    let report = response.report().unwrap();
    assert!(!report.execution_success);
    assert_eq!(report.logs, ["1", "2"]);
}

#[test]
fn unreadable_files_are_reported_with_context() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing.json");
    let err = PipelineConfig::load(&missing).unwrap_err();
    assert!(err.to_string().contains("Failed to read config"));

    let broken = temp.path().join("broken.json");
    fs::write(&broken, "{ not json").unwrap();
    let err = PipelineConfig::load(&broken).unwrap_err();
    assert!(err.to_string().contains("Failed to deserialize config"));
}
