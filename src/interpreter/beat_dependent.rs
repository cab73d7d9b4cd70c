//! Beat-dependent pass
//!
//! Each sweep walks every block: notes whose block offset is known are
//! dispatched to the imperfection and alteration rules by the beat they
//! fall on; notes directly after a longer note are assumed to start their
//! unit. Start times are recomputed as durations appear, and sweeps repeat
//! until one makes no progress.

use serde::{Deserialize, Serialize};

use super::blockify::BlockIndex;
use super::error::InterpretError;
use super::ledger::Ledger;
use super::mensuration::{beat_unit_structure, first_perfect_level, is_alterable};
use super::start_times::{add_all_start_times, add_start_times_for_block, next_voice_offset, update_blocks};
use super::{alteration, imperfection, BlockContext};
use crate::diagnostics::{kinds, DiagnosticMark, Diagnostics};
use crate::models::minims::whole;
use crate::models::{ElementId, Event, Level};

/// Counts after one sweep
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SweepReport {
    pub sweep: usize,
    /// Notes resolved during this sweep
    pub resolved: usize,
    /// Notes still unresolved after it
    pub remaining: usize,
}

/// A note or rest the fixpoint left without a duration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IrresolvableEvent {
    pub element: ElementId,
    pub level: Option<Level>,
    pub block: usize,
    pub reason: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FixpointReport {
    pub sweeps: Vec<SweepReport>,
    pub irresolvable: Vec<IrresolvableEvent>,
}

impl FixpointReport {
    pub fn remaining(&self) -> usize {
        self.sweeps.last().map_or(0, |s| s.remaining)
    }

    pub fn is_complete(&self) -> bool {
        self.irresolvable.is_empty()
    }
}

/// Iterate sweeps to a fixpoint, then report what is left and fill in the
/// block aggregates.
///
/// `sweep_cap` defaults to one more than the number of events. Reaching
/// it while sweeps still make progress is an error.
pub fn run(
    index: &mut BlockIndex,
    ledger: &mut Ledger,
    diagnostics: &mut Diagnostics,
    sweep_cap: Option<usize>,
) -> Result<FixpointReport, InterpretError> {
    let cap = sweep_cap.unwrap_or(index.event_count() + 1);
    let mut report = FixpointReport::default();

    add_all_start_times(index, ledger);
    let mut previous = unresolved_notes(index, ledger);

    while previous > 0 {
        if report.sweeps.len() >= cap {
            return Err(InterpretError::FixpointCapExceeded {
                sweeps: report.sweeps.len(),
                remaining: previous,
            });
        }
        let remaining = sweep(index, ledger, diagnostics);
        let sweep_number = report.sweeps.len() + 1;
        log::info!("Sweep {}: {} unresolved (was {})", sweep_number, remaining, previous);
        report.sweeps.push(SweepReport {
            sweep: sweep_number,
            resolved: previous.saturating_sub(remaining),
            remaining,
        });
        if remaining == previous {
            break;
        }
        previous = remaining;
    }

    report.irresolvable = collect_irresolvable(index, ledger, diagnostics);
    update_blocks(index, ledger);
    Ok(report)
}

/// One pass over every block. Returns the number of notes still unresolved.
pub fn sweep(index: &BlockIndex, ledger: &mut Ledger, diagnostics: &mut Diagnostics) -> usize {
    let mut unresolved = 0;
    let mut next_start = Some(whole(0));
    let mut current_voice = None;

    for (b, block) in index.blocks.iter().enumerate() {
        if current_voice != Some(block.voice) {
            next_start = Some(whole(0));
            current_voice = Some(block.voice);
        }
        let mens = index.mensuration(block);
        let ctx = BlockContext { block: b, events: &block.events, mens };
        let first_perfect = first_perfect_level(mens);

        for (e, event) in block.events.iter().enumerate() {
            if !event.is_note() || ledger.is_resolved(event.id) {
                continue;
            }
            let Some(level) = event.level() else {
                continue;
            };
            let previous = e.checked_sub(1).map(|p| &block.events[p]);

            if let Some(from) = ledger.block_from(event.id) {
                let beats = beat_unit_structure(from, mens);
                if level.index() > first_perfect {
                    let beat = if previous.map_or(false, Event::is_division_dot) {
                        Some(0)
                    } else {
                        beats.beat_at(level, 0)
                    };
                    imperfection::dispatch(beat, &ctx, e, ledger, diagnostics);
                }
                if !ledger.is_resolved(event.id) && is_alterable(event, mens) {
                    alteration::dispatch(beats.beat_at(level, 1), &ctx, e, ledger);
                }
                if ledger.is_resolved(event.id) {
                    add_start_times_for_block(block, mens, ledger, next_start);
                }
            } else if previous.map_or(false, |p| p.is_note() && p.is_longer_than(level)) {
                if level.index() > first_perfect {
                    imperfection::first_beat_imperfection(&ctx, e, ledger, diagnostics);
                } else if is_alterable(event, mens) {
                    alteration::first_beat_alteration(&ctx, e, ledger);
                } else {
                    log::warn!("{:?} is neither alterable nor imperfectable", event.id);
                    diagnostics.add_once(DiagnosticMark::warning(
                        event.id,
                        kinds::NOT_ALTERABLE_OR_IMPERFECTABLE,
                        format!("{:?} after a longer note is neither alterable nor imperfectable", level),
                    ));
                }
            }

            if !ledger.is_resolved(event.id) {
                unresolved += 1;
            }
        }

        let end = add_start_times_for_block(block, mens, ledger, next_start);
        next_start = next_voice_offset(next_start, end);
    }
    unresolved
}

fn unresolved_notes(index: &BlockIndex, ledger: &Ledger) -> usize {
    ledger.unresolved_count(index.events().filter(|e| e.is_note()).map(|e| e.id))
}

fn collect_irresolvable(
    index: &BlockIndex,
    ledger: &Ledger,
    diagnostics: &mut Diagnostics,
) -> Vec<IrresolvableEvent> {
    let mut out = Vec::new();
    for (b, block) in index.blocks.iter().enumerate() {
        for event in block.notes_and_rests() {
            if ledger.is_resolved(event.id) {
                continue;
            }
            let reason = match ledger.beat_position(event.id) {
                None => "start offset unknown".to_string(),
                Some(position) => format!("no rule applies at beat position {}", position.to_attribute()),
            };
            log::warn!("{:?} left without a duration: {}", event.id, reason);
            diagnostics.add_once(DiagnosticMark::warning(
                event.id,
                kinds::IRRESOLVABLE,
                format!("No duration could be inferred ({})", reason),
            ));
            out.push(IrresolvableEvent { element: event.id, level: event.level(), block: b, reason });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::context_free;
    use crate::interpreter::ledger::Rule;
    use crate::models::{Document, Voice};

    fn analyse(doc: &Document) -> (BlockIndex, Ledger, Diagnostics, FixpointReport) {
        let mut diagnostics = Diagnostics::new();
        let mut index = BlockIndex::build(doc, &mut diagnostics);
        let mut ledger = Ledger::new();
        context_free::run(&index, &mut ledger);
        let report = run(&mut index, &mut ledger, &mut diagnostics, None).unwrap();
        (index, ledger, diagnostics, report)
    }

    #[test]
    fn test_semibreve_then_minim_is_imperfect() {
        let mut doc = Document::new();
        doc.push_voice(
            Voice::builder(1)
                .mensur_digits([3, 2, 2, 2])
                .note(Level::Semibrevis)
                .note(Level::Minima),
        );
        let (index, ledger, _, report) = analyse(&doc);
        let ids = doc.event_ids(0);
        assert_eq!(ledger.read_duration(ids[0]), Some(whole(2)));
        assert_eq!(ledger.read_duration(ids[1]), Some(whole(1)));
        assert!(report.is_complete());
        assert_eq!(index.blocks[0].cumulative_duration, Some(whole(3)));
    }

    #[test]
    fn test_breve_before_single_semibreve_is_imperfect() {
        let mut doc = Document::new();
        doc.push_voice(
            Voice::builder(1)
                .mensur_digits([2, 3, 2, 2])
                .note(Level::Brevis)
                .note(Level::Brevis)
                .note(Level::Semibrevis)
                .note(Level::Brevis)
                .note(Level::Brevis),
        );
        let (_, ledger, _, report) = analyse(&doc);
        let ids = doc.event_ids(0);
        assert_eq!(ledger.read_duration(ids[0]), Some(whole(6)));
        assert_eq!(ledger.read_duration(ids[1]), Some(whole(4)));
        assert_eq!(ledger.rule(ids[2]), Some(Rule::UnalteredImperfectAfterLarger));
        assert!(report.sweeps.len() >= 1);
    }

    #[test]
    fn test_unresolved_count_never_increases() {
        let mut doc = Document::new();
        doc.push_voice(
            Voice::builder(1)
                .mensur_digits([3, 3, 2, 2])
                .note(Level::Brevis)
                .note(Level::Semibrevis)
                .note(Level::Minima)
                .note(Level::Semibrevis)
                .note(Level::Brevis)
                .note(Level::Minima)
                .note(Level::Brevis),
        );
        let (index, _, _, report) = analyse(&doc);
        let counts: Vec<usize> = report.sweeps.iter().map(|s| s.remaining).collect();
        assert!(counts.windows(2).all(|w| w[1] <= w[0]));
        assert!(report.sweeps.len() <= index.event_count() + 1);
    }

    #[test]
    fn test_cap_exceeded_is_an_error() {
        let mut doc = Document::new();
        doc.push_voice(
            Voice::builder(1)
                .mensur_digits([2, 3, 2, 2])
                .note(Level::Brevis)
                .note(Level::Semibrevis)
                .note(Level::Brevis),
        );
        let mut diagnostics = Diagnostics::new();
        let mut index = BlockIndex::build(&doc, &mut diagnostics);
        let mut ledger = Ledger::new();
        let err = run(&mut index, &mut ledger, &mut diagnostics, Some(0)).unwrap_err();
        assert!(matches!(err, InterpretError::FixpointCapExceeded { sweeps: 0, .. }));
    }

    #[test]
    fn test_irresolvable_events_are_reported() {
        // all-binary and no context-free pass: no beat rule can apply
        let mut doc = Document::new();
        doc.push_voice(
            Voice::builder(1)
                .mensur_digits([2, 2, 2, 2])
                .note(Level::Brevis)
                .note(Level::Semibrevis)
                .note(Level::Semibrevis),
        );
        let mut diagnostics = Diagnostics::new();
        let mut index = BlockIndex::build(&doc, &mut diagnostics);
        let mut ledger = Ledger::new();
        let report = run(&mut index, &mut ledger, &mut diagnostics, None).unwrap();
        let ids = doc.event_ids(0);

        assert_eq!(report.sweeps.len(), 1);
        assert_eq!(report.remaining(), 3);
        let lost: Vec<ElementId> = report.irresolvable.iter().map(|l| l.element).collect();
        assert_eq!(lost, ids);
        assert!(report.irresolvable[0].reason.starts_with("no rule applies at beat position"));
        assert_eq!(report.irresolvable[1].reason, "start offset unknown");
        assert_eq!(report.irresolvable[2].level, Some(Level::Semibrevis));
        for id in &ids {
            assert!(diagnostics.for_element(*id).any(|m| m.kind == kinds::IRRESOLVABLE));
        }
        assert!(diagnostics
            .for_element(ids[1])
            .any(|m| m.kind == kinds::NOT_ALTERABLE_OR_IMPERFECTABLE));
    }

    #[test]
    fn test_note_after_longer_note_resolves_without_offset() {
        // the unlabelled rest hides every later offset
        let mut doc = Document::new();
        doc.push_voice(
            Voice::builder(1)
                .mensur_digits([2, 3, 2, 2])
                .rest(Level::Semibrevis)
                .note(Level::Longa)
                .note(Level::Brevis)
                .note(Level::Semibrevis)
                .note(Level::Brevis),
        );
        let mut diagnostics = Diagnostics::new();
        let index = BlockIndex::build(&doc, &mut diagnostics);
        let mut ledger = Ledger::new();
        add_all_start_times(&index, &mut ledger);
        let ids = doc.event_ids(0);
        assert_eq!(ledger.block_from(ids[2]), None);

        sweep(&index, &mut ledger, &mut diagnostics);
        assert_eq!(ledger.read_duration(ids[2]), Some(whole(4)));
        assert_eq!(ledger.rule(ids[2]), Some(Rule::ImperfectionByUnit));
        assert!(!ledger.is_resolved(ids[0]));
        assert!(!ledger.is_resolved(ids[1]));
        assert_eq!(ledger.block_from(ids[2]), None);
    }
}
