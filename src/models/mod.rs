//! Models module for the mensural interpreter
//!
//! This module contains the document model the interpreter reads: levels,
//! mensuration and proportion signs, voice elements and the section tree.
//! Inferred values never live here; they go to the duration ledger.

pub mod document;
pub mod element;
pub mod level;
pub mod mensuration;
pub mod minims;

// Re-export commonly used types
pub use document::{Document, Section, Voice, VoiceBuilder};
pub use element::*;
pub use level::Level;
pub use mensuration::{Division, Mensuration, Proportion};
pub use minims::Minims;
