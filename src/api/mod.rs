//! Mensural interpreter WASM API
//!
//! Thin JavaScript-facing wrappers. Each exported function has a native
//! twin returning Rust errors, which is what the wrappers call and what
//! native tests exercise.
//!
//! - `interpretMei(text, configJson?)`: annotated MEI
//! - `interpretMeiReport(text, configJson?)`: JSON report
//! - `interpretMeiObject(text)`: the same report as a JavaScript object
//! - `blockTable(text)`: JSON table of mensural blocks

pub mod helpers;

use wasm_bindgen::prelude::*;

use crate::config::InterpreterConfig;
use crate::interpreter::pipeline::InterpretationReport;
use crate::interpreter::InterpretError;
use crate::mei;
use helpers::{js_error, serialize};

fn config_from(config_json: Option<&str>) -> Result<InterpreterConfig, InterpretError> {
    match config_json {
        Some(text) => Ok(InterpreterConfig::from_json_str(text)?),
        None => Ok(InterpreterConfig::default()),
    }
}

/// Annotated MEI for `text`
pub fn interpret_mei_native(text: &str, config_json: Option<&str>) -> Result<String, InterpretError> {
    let config = config_from(config_json)?;
    let (annotated, _, _) = mei::interpret_str(text, &config)?;
    Ok(annotated)
}

pub fn report_native(text: &str, config_json: Option<&str>) -> Result<InterpretationReport, InterpretError> {
    let config = config_from(config_json)?;
    let (_, document, interpretation) = mei::interpret_str(text, &config)?;
    Ok(interpretation.report(&document))
}

pub fn block_table_native(text: &str) -> Result<String, InterpretError> {
    let (_, _, interpretation) = mei::interpret_str(text, &InterpreterConfig::default())?;
    Ok(interpretation.block_table_json()?)
}

#[wasm_bindgen(js_name = interpretMei)]
pub fn interpret_mei(text: &str, config_json: Option<String>) -> Result<String, JsValue> {
    log::info!("interpretMei called ({} bytes)", text.len());
    interpret_mei_native(text, config_json.as_deref()).map_err(|e| js_error(e.to_string()))
}

#[wasm_bindgen(js_name = interpretMeiReport)]
pub fn interpret_mei_report(text: &str, config_json: Option<String>) -> Result<String, JsValue> {
    let report = report_native(text, config_json.as_deref()).map_err(|e| js_error(e.to_string()))?;
    serde_json::to_string(&report).map_err(|e| js_error(format!("Report serialization failed: {}", e)))
}

#[wasm_bindgen(js_name = interpretMeiObject)]
pub fn interpret_mei_object(text: &str) -> Result<JsValue, JsValue> {
    let report = report_native(text, None).map_err(|e| js_error(e.to_string()))?;
    serialize(&report, "Report conversion failed")
}

#[wasm_bindgen(js_name = blockTable)]
pub fn block_table(text: &str) -> Result<String, JsValue> {
    block_table_native(text).map_err(|e| js_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"<mei><music><section><staff n="1"><layer>
<mensur tempus="3" prolatio="2"/>
<note dur="brevis"/><note dur="brevis"/><rest dur="brevis"/>
</layer></staff></section></music></mei>"#;

    #[test]
    fn test_native_report() {
        let report = report_native(SOURCE, None).unwrap();
        assert_eq!(report.events.len(), 3);
        assert!(report.events.iter().all(|e| e.duration == Some(6.0)));
        assert_eq!(report.blocks.len(), 1);
    }

    #[test]
    fn test_native_config_errors_surface() {
        let err = interpret_mei_native(SOURCE, Some("{not json")).unwrap_err();
        assert!(matches!(err, InterpretError::Config(_)));
        let err = interpret_mei_native("<mei/>", None).unwrap_err();
        assert!(matches!(err, InterpretError::Mei(_)));
    }

    #[test]
    fn test_block_table_json() {
        let json = block_table_native(SOURCE).unwrap();
        let rows: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(rows[0]["mensuration"][1], 3);
        assert_eq!(rows[0]["duration"], 18.0);
    }
}
