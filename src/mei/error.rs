//! Error types for MEI reading and annotation

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeiError {
    /// Source is not well-formed XML
    #[error("invalid XML: {0}")]
    InvalidXml(#[from] roxmltree::Error),

    #[error("XML write error: {0}")]
    Write(#[from] quick_xml::Error),

    #[error("invalid XML attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// Required structural element is missing
    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("invalid value '{value}' for {element}@{attribute}")]
    InvalidValue {
        element: String,
        attribute: String,
        value: String,
    },

    #[error("annotated output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
