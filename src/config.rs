//! Interpreter configuration
//!
//! Every field has a default, so an empty YAML or JSON document is a valid
//! configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How far the pipeline runs
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Blockify only
    Blocks,
    /// Blocks plus the context-free rules
    ContextFree,
    /// Everything, including the beat-dependent fixpoint
    #[default]
    Full,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct InterpreterConfig {
    pub stage: Stage,
    pub place_bar_lines: bool,
    /// Maximum beat-dependent sweeps; `None` allows one more than the
    /// number of events
    pub sweep_cap: Option<usize>,
    /// Write start offsets and beat positions when annotating MEI
    pub annotate_beat_positions: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            stage: Stage::Full,
            place_bar_lines: true,
            sweep_cap: None,
            annotate_beat_positions: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported config file extension: {0}")]
    UnsupportedExtension(String),
}

impl InterpreterConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(text)?)
    }

    /// Load from a `.yaml`/`.yml` or `.json` file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&text),
            "json" => Self::from_json_str(&text),
            other => Err(ConfigError::UnsupportedExtension(other.to_string())),
        }
    }

    pub fn runs_context_free(&self) -> bool {
        self.stage >= Stage::ContextFree
    }

    pub fn runs_beat_dependent(&self) -> bool {
        self.stage == Stage::Full
    }
}
