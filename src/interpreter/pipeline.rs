//! Running the passes in order
//!
//! ```text
//! given durations -> blockify -> context-free -> beat-dependent fixpoint
//!                 -> proportion scaling -> bar lines
//! ```
//!
//! The configured stage decides how far the run goes. Scaling always
//! happens last, over whatever was resolved.

use serde::{Deserialize, Serialize};

use super::beat_dependent::{self, FixpointReport};
use super::blockify::{BlockIndex, BlockRow};
use super::context_free;
use super::error::InterpretError;
use super::ledger::{DurationQuality, Ledger};
use super::postprocess::{apply_bar_lines, place_all_bar_lines, BarLinePlacement};
use super::proportion::scale_all;
use super::start_times::{add_all_start_times, update_blocks};
use crate::config::{InterpreterConfig, Stage};
use crate::diagnostics::{kinds, DiagnosticMark, DiagnosticSeverity, Diagnostics};
use crate::models::minims::{format_beats, to_f64};
use crate::models::{Document, Element, ElementId};

pub struct Interpreter {
    config: InterpreterConfig,
}

/// Everything a run produced
#[derive(Clone, Debug)]
pub struct Interpretation {
    pub stage: Stage,
    pub ledger: Ledger,
    pub blocks: BlockIndex,
    pub report: FixpointReport,
    pub diagnostics: Diagnostics,
    pub bar_lines: Vec<BarLinePlacement>,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Interpret `document`, inserting bar lines into it when configured
    pub fn run(&self, document: &mut Document) -> Result<Interpretation, InterpretError> {
        let mut diagnostics = Diagnostics::new();
        let mut ledger = Ledger::new();
        let seeded = seed_given_durations(document, &mut ledger);
        if seeded > 0 {
            log::debug!("Seeded {} given durations", seeded);
        }

        let mut blocks = BlockIndex::build(document, &mut diagnostics);
        let mut report = FixpointReport::default();

        if self.config.runs_context_free() {
            let written = context_free::run(&blocks, &mut ledger);
            log::info!("Context-free pass resolved {} events", written);
        }
        if self.config.runs_beat_dependent() {
            report = beat_dependent::run(&mut blocks, &mut ledger, &mut diagnostics, self.config.sweep_cap)?;
        } else {
            add_all_start_times(&blocks, &mut ledger);
            update_blocks(&mut blocks, &ledger);
        }
        scale_all(&blocks, &mut ledger);

        let mut bar_lines = Vec::new();
        if self.config.place_bar_lines && self.config.runs_beat_dependent() {
            bar_lines = place_all_bar_lines(document, &ledger);
            apply_bar_lines(document, &bar_lines);
        }

        for conflict in ledger.conflicts() {
            diagnostics.add(DiagnosticMark::new(
                Some(conflict.element),
                DiagnosticSeverity::Error,
                kinds::LEDGER_CONFLICT,
                format!(
                    "Kept {} over {} ({})",
                    format_beats(conflict.existing),
                    format_beats(conflict.attempted),
                    conflict.rule.map_or("no rule", |r| r.code())
                ),
            ));
        }

        Ok(Interpretation {
            stage: self.config.stage,
            ledger,
            blocks,
            report,
            diagnostics,
            bar_lines,
        })
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(InterpreterConfig::default())
    }
}

/// Durations the document already carries are taken as given
fn seed_given_durations(document: &Document, ledger: &mut Ledger) -> usize {
    let mut seeded = 0;
    for voice in document.voices() {
        for item in &voice.items {
            let given = match &item.element {
                Element::Note(note) => note.given_duration.as_ref(),
                Element::Rest(rest) => rest.given_duration.as_ref(),
                _ => None,
            };
            if let Some(given) = given {
                if ledger.write_given(item.id, given).is_written() {
                    seeded += 1;
                }
            }
        }
    }
    seeded
}

/// One event of the JSON report
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventRow {
    pub element: ElementId,
    pub xml_id: Option<String>,
    pub duration: Option<f64>,
    pub scaled: Option<f64>,
    pub quality: DurationQuality,
    pub rule: Option<String>,
    pub starts_at: Option<f64>,
    pub block_from: Option<f64>,
    pub beat_position: Option<String>,
    pub on_the_breve_beat: bool,
    pub crossed_a_breve_beat: bool,
    pub comment: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InterpretationReport {
    pub stage: Stage,
    pub events: Vec<EventRow>,
    pub blocks: Vec<BlockRow>,
    pub fixpoint: FixpointReport,
    pub bar_lines: Vec<BarLinePlacement>,
    pub diagnostics: Diagnostics,
}

impl Interpretation {
    /// Flat report of every note, rest and dot in document order
    pub fn report(&self, document: &Document) -> InterpretationReport {
        let events = document
            .voices()
            .into_iter()
            .flat_map(|voice| voice.items.iter())
            .filter(|item| item.element.is_event())
            .map(|item| {
                let record = self.ledger.record(item.id).cloned().unwrap_or_default();
                EventRow {
                    element: item.id,
                    xml_id: item.xml_id.clone(),
                    duration: record.duration.map(to_f64),
                    scaled: record.scaled.map(to_f64),
                    quality: record.quality_class(),
                    rule: record.rule.map(|r| r.code().to_string()),
                    starts_at: record.starts_at.map(to_f64),
                    block_from: record.block_from.map(to_f64),
                    beat_position: record.beat_position.map(|p| p.to_attribute()),
                    on_the_breve_beat: record.on_the_breve_beat,
                    crossed_a_breve_beat: record.crossed_a_breve_beat,
                    comment: record.comment,
                }
            })
            .collect();
        InterpretationReport {
            stage: self.stage,
            events,
            blocks: self.blocks.table(),
            fixpoint: self.report.clone(),
            bar_lines: self.bar_lines.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }

    pub fn report_json(&self, document: &Document) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.report(document))
    }

    pub fn block_table_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.blocks.table())
    }

    /// Every note and rest has a duration
    pub fn is_complete(&self) -> bool {
        self.blocks
            .blocks
            .iter()
            .flat_map(|b| b.notes_and_rests())
            .all(|e| self.ledger.is_resolved(e.id))
    }
}
