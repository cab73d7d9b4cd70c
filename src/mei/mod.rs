//! MEI host adapter
//!
//! The reader builds a [`Document`] from mensural MEI; the writer re-emits
//! the source with the interpretation attached as attributes and with the
//! inserted bar lines. Elements are matched between the two by their
//! document-order ordinal, so sources without `xml:id`s work too.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::MeiError;
pub use reader::read_document;
pub use writer::annotate;

use crate::config::InterpreterConfig;
use crate::interpreter::{InterpretError, Interpretation, Interpreter};
use crate::models::Document;

/// Read, interpret and annotate in one go
pub fn interpret_str(
    source: &str,
    config: &InterpreterConfig,
) -> Result<(String, Document, Interpretation), InterpretError> {
    let mut document = read_document(source)?;
    let interpretation = Interpreter::new(config.clone()).run(&mut document)?;
    let annotated = annotate(source, &document, &interpretation, config)?;
    Ok((annotated, document, interpretation))
}
