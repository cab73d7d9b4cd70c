//! Diagnostics for interpretation problems
//!
//! Rule failures never abort a run. Anything the interpreter could not
//! decide, or had to assume, is reported here so that a reviewer can look
//! at the affected element.

use serde::{Deserialize, Serialize};

use crate::models::ElementId;

/// Kind identifiers used by the interpreter
pub mod kinds {
    pub const MISSING_MENSURATION_DIGIT: &str = "missing_mensuration_digit";
    pub const UNRESOLVED_WINDOW: &str = "unresolved_window";
    pub const NOT_ALTERABLE_OR_IMPERFECTABLE: &str = "not_alterable_or_imperfectable";
    pub const LEDGER_CONFLICT: &str = "ledger_conflict";
    pub const IRRESOLVABLE: &str = "irresolvable";
    pub const EMPTY_BLOCK: &str = "empty_block";
    pub const INCOMPLETE_PROPORTION: &str = "incomplete_proportion";
}

/// Severity level for diagnostic marks
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// A diagnostic mark attached to an element (or to the document as a whole)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DiagnosticMark {
    /// Element the mark refers to, if any
    pub element: Option<ElementId>,
    pub severity: DiagnosticSeverity,
    /// Kind identifier (see [`kinds`])
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl DiagnosticMark {
    /// Create a new diagnostic mark
    pub fn new(
        element: Option<ElementId>,
        severity: DiagnosticSeverity,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            element,
            severity,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn warning(element: ElementId, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Some(element), DiagnosticSeverity::Warning, kind, message)
    }
}

/// Collection of diagnostic marks for an entire document
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Diagnostics {
    /// All diagnostic marks
    pub marks: Vec<DiagnosticMark>,
}

impl Diagnostics {
    /// Create empty diagnostics
    pub fn new() -> Self {
        Self { marks: Vec::new() }
    }

    /// Add a mark
    pub fn add(&mut self, mark: DiagnosticMark) {
        self.marks.push(mark);
    }

    /// Extend with multiple marks
    pub fn extend(&mut self, marks: impl IntoIterator<Item = DiagnosticMark>) {
        self.marks.extend(marks);
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.marks
            .iter()
            .any(|m| m.severity == DiagnosticSeverity::Error)
    }

    /// Check if there are any diagnostics
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Add a mark unless one of the same kind is already attached to the
    /// same element
    pub fn add_once(&mut self, mark: DiagnosticMark) {
        let seen = self
            .marks
            .iter()
            .any(|m| m.element == mark.element && m.kind == mark.kind);
        if !seen {
            self.marks.push(mark);
        }
    }

    /// Marks of one kind
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a DiagnosticMark> + 'a {
        self.marks.iter().filter(move |m| m.kind == kind)
    }

    /// Marks attached to one element
    pub fn for_element(&self, element: ElementId) -> impl Iterator<Item = &DiagnosticMark> + '_ {
        self.marks.iter().filter(move |m| m.element == Some(element))
    }
}
