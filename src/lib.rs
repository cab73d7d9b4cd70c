//! Mensural Interpreter WASM Module
//!
//! Infers the durations of notes and rests in mensural notation:
//! perfection and imperfection, alteration, coloration, dots and
//! proportions. Works natively on a [`models::Document`] or, through the
//! [`mei`] adapter and the [`api`] surface, on MEI text in the browser.

pub mod api;
pub mod config;
pub mod diagnostics;
pub mod interpreter;
pub mod mei;
pub mod models;

// Re-export commonly used types
pub use config::{ConfigError, InterpreterConfig, Stage};
pub use diagnostics::{DiagnosticMark, DiagnosticSeverity, Diagnostics};
pub use interpreter::{InterpretError, Interpretation, Interpreter, Ledger, Rule};
pub use models::{Document, Element, ElementId, Level, Mensuration, Minims, Proportion, Section, Voice, VoiceBuilder};

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    init_logging();

    log::info!("Mensural interpreter WASM module initialized");
}

#[cfg(feature = "console_log")]
fn init_logging() {
    if console_log::init_with_level(log::Level::Debug).is_err() {
        log::warn!("Logger was already initialized");
    }
}

#[cfg(not(feature = "console_log"))]
fn init_logging() {}
