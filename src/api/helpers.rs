//! Shared helpers for the WASM API
//!
//! Serialization to JavaScript values and error conversion.

use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Serialize a value to JavaScript with automatic error handling
pub fn serialize<T: Serialize>(value: &T, error_context: &str) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| js_error(format!("{}: {}", error_context, e)))
}

/// Log a failure and turn it into a JavaScript `Error`
pub fn js_error(msg: impl Into<String>) -> JsValue {
    let msg = msg.into();
    log::error!("{}", msg);
    js_sys::Error::new(&msg).into()
}
