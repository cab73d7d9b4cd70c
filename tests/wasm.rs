//! WASM API test
//!
//! Exercises the exported functions in a browser.

#![cfg(target_arch = "wasm32")]

use mensural_interpreter::api::{block_table, interpret_mei, interpret_mei_object, interpret_mei_report};
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const SOURCE: &str = r#"<mei><music><section><staff n="1"><layer>
<mensur tempus="3" prolatio="2"/>
<note xml:id="a" dur="brevis"/><note xml:id="b" dur="brevis"/>
</layer></staff></section></music></mei>"#;

#[wasm_bindgen_test]
fn test_interpret_mei() {
    let annotated = interpret_mei(SOURCE, None).unwrap();
    assert!(annotated.contains(r#"dur.intermediate="6b""#));
    assert!(annotated.contains("<barLine"));
}

#[wasm_bindgen_test]
fn test_report_and_object() {
    let json = interpret_mei_report(SOURCE, Some(r#"{"stage": "context_free"}"#.to_string())).unwrap();
    assert!(json.contains(r#""stage":"context_free""#));
    let object = interpret_mei_object(SOURCE).unwrap();
    assert!(object.is_object());
}

#[wasm_bindgen_test]
fn test_errors_become_js_values() {
    assert!(interpret_mei("<mei>", None).is_err());
    assert!(block_table("<mei/>").is_err());
}
