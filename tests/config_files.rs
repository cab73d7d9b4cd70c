// Loading interpreter configuration from disk

use std::fs;

use mensural_interpreter::{ConfigError, InterpreterConfig, Stage};
use tempfile::TempDir;

#[test]
fn test_yaml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("interpreter.yaml");
    fs::write(&path, "stage: blocks\nplace_bar_lines: false\n").unwrap();

    let config = InterpreterConfig::from_path(&path).unwrap();
    assert_eq!(config.stage, Stage::Blocks);
    assert!(!config.place_bar_lines);
    assert!(config.annotate_beat_positions);
    assert!(!config.runs_context_free());
}

#[test]
fn test_json_file_with_uppercase_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("interpreter.JSON");
    fs::write(&path, r#"{"sweep_cap": 12, "annotate_beat_positions": false}"#).unwrap();

    let config = InterpreterConfig::from_path(&path).unwrap();
    assert_eq!(config.sweep_cap, Some(12));
    assert!(!config.annotate_beat_positions);
    assert_eq!(config.stage, Stage::Full);
}

#[test]
fn test_empty_yml_file_is_default() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.yml");
    fs::write(&path, "").unwrap();
    assert_eq!(InterpreterConfig::from_path(&path).unwrap(), InterpreterConfig::default());
}

#[test]
fn test_load_errors() {
    let dir = TempDir::new().unwrap();

    let toml = dir.path().join("interpreter.toml");
    fs::write(&toml, "stage = \"full\"").unwrap();
    assert!(matches!(
        InterpreterConfig::from_path(&toml),
        Err(ConfigError::UnsupportedExtension(ext)) if ext == "toml"
    ));

    let missing = dir.path().join("missing.yaml");
    assert!(matches!(InterpreterConfig::from_path(&missing), Err(ConfigError::Io(_))));

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{\"stage\": ").unwrap();
    assert!(matches!(InterpreterConfig::from_path(&broken), Err(ConfigError::Json(_))));
}
