//! Context-free pass
//!
//! Resolves everything that needs no knowledge of beat position, in a
//! fixed order: rests, coloration, explicitly notated qualities, dots of
//! augmentation, unalterable notes, pattern-local alterations and ante
//! simile. Each step only writes to events that are still unresolved, so
//! running the pass again changes nothing.

use super::blockify::BlockIndex;
use super::ledger::{Ledger, Rule, WriteOutcome};
use super::mensuration::{is_alterable, minim_count, note_perfect_as_whole, regularly_perfect};
use crate::models::minims::whole;
use crate::models::{Event, Level, Mensuration, NotatedQuality};

type Step = fn(&[Event], &Mensuration, &mut Ledger) -> usize;

const STEPS: [(&str, Step); 7] = [
    ("rests", label_rests),
    ("coloration", act_on_coloration),
    ("explicit quality", act_on_notated_quality),
    ("dots", act_on_dots),
    ("unalterable", all_unalterable_imperfect_levels),
    ("simplest alterations", simplest_alterations),
    ("ante simile", ante_simile),
];

/// Run every step over every block. Returns the number of durations written.
pub fn run(index: &BlockIndex, ledger: &mut Ledger) -> usize {
    let mut written = 0;
    for (name, step) in STEPS {
        let mut step_written = 0;
        for block in &index.blocks {
            step_written += step(&block.events, index.mensuration(block), ledger);
        }
        log::debug!("Context-free step '{}' resolved {} events", name, step_written);
        written += step_written;
    }
    written
}

fn count(outcome: WriteOutcome) -> usize {
    usize::from(outcome.is_written())
}

fn followed_by_aug_dot(events: &[Event], index: usize) -> bool {
    events.get(index + 1).map_or(false, Event::is_aug_dot)
}

fn unresolved_note<'a>(event: &'a Event, ledger: &Ledger) -> Option<&'a Event> {
    (event.is_note() && !ledger.is_resolved(event.id)).then_some(event)
}

/// Rests cannot be imperfected or altered
fn label_rests(events: &[Event], mens: &Mensuration, ledger: &mut Ledger) -> usize {
    let mut written = 0;
    for (i, event) in events.iter().enumerate() {
        if event.is_rest() && !ledger.is_resolved(event.id) {
            let dot = followed_by_aug_dot(events, i);
            written += count(ledger.write_with_rule(event, mens, Rule::Rest, dot, 1, 1));
        }
    }
    written
}

/// Colored notes are taken as simple duple: two thirds of face value
fn act_on_coloration(events: &[Event], mens: &Mensuration, ledger: &mut Ledger) -> usize {
    let mut written = 0;
    for (i, event) in events.iter().enumerate() {
        if event.is_colored() && !ledger.is_resolved(event.id) {
            let dot = followed_by_aug_dot(events, i);
            written += count(ledger.write_with_rule(event, mens, Rule::Coloration, dot, 2, 3));
        }
    }
    written
}

fn act_on_notated_quality(events: &[Event], mens: &Mensuration, ledger: &mut Ledger) -> usize {
    let mut written = 0;
    for event in events {
        let Some(note) = unresolved_note(event, ledger) else {
            continue;
        };
        let outcome = match note.notated_quality() {
            Some(NotatedQuality::Perfect) => ledger.write_perfection(note, mens, Rule::Explicit, false),
            Some(NotatedQuality::Imperfect) => {
                ledger.write_simple_imperfection(note, mens, Rule::Explicit)
            }
            Some(NotatedQuality::Altered) => ledger.write_alteration(note, mens, Rule::Explicit),
            None => continue,
        };
        written += count(outcome);
    }
    written
}

/// A dot after a note that is perfect as a whole is a sign of perfection;
/// anywhere else it adds half the face value
fn act_on_dots(events: &[Event], mens: &Mensuration, ledger: &mut Ledger) -> usize {
    let mut written = 0;
    for (i, event) in events.iter().enumerate().skip(1) {
        if !event.is_aug_dot() {
            continue;
        }
        let prev = &events[i - 1];
        if !prev.is_note_or_rest() || ledger.is_resolved(prev.id) {
            continue;
        }
        let outcome = if note_perfect_as_whole(prev, mens) {
            ledger.write_perfection(prev, mens, Rule::PerfectionByDot, false)
        } else {
            ledger.write_with_rule(prev, mens, Rule::SimpleDot, true, 1, 1)
        };
        written += count(outcome);
    }
    written
}

/// A note that is neither perfect as a whole nor a direct part of a
/// ternary note can only take its face value
fn all_unalterable_imperfect_levels(events: &[Event], mens: &Mensuration, ledger: &mut Ledger) -> usize {
    let mut written = 0;
    for event in events {
        let Some(note) = unresolved_note(event, ledger) else {
            continue;
        };
        if !note_perfect_as_whole(note, mens) && !is_alterable(note, mens) {
            written += count(ledger.write_with_rule(note, mens, Rule::UnalterableImperfect, false, 1, 1));
        }
    }
    written
}

/// Alterations that follow from the local note pattern alone.
///
/// Only an alterable note directly followed by a note or rest one level up
/// can be altered. Counting back from it, if the resolved values before it
/// add up to exactly its own face value and the run starts after a longer
/// note, a division dot or the start of the block, it is altered (A.2b).
fn simplest_alterations(events: &[Event], mens: &Mensuration, ledger: &mut Ledger) -> usize {
    let mut written = 0;
    for (e, event) in events.iter().enumerate() {
        let Some(note) = unresolved_note(event, ledger) else {
            continue;
        };
        let Some(level) = note.level() else {
            continue;
        };
        if !is_alterable(note, mens) {
            continue;
        }
        let next_is_larger = events
            .get(e + 1)
            .and_then(Event::level)
            .map_or(false, |next| Some(next) == level.next_longer());

        let outcome = if next_is_larger {
            let after_larger = e == 0 || events[e - 1].is_longer_than(level);
            if after_larger && !note_perfect_as_whole(note, mens) {
                // would need syncopation to be altered, and cannot be imperfected
                ledger.write_with_rule(note, mens, Rule::UnalteredImperfectAfterLarger, false, 1, 1)
            } else if fills_unit_before(events, e, level, mens, ledger) {
                ledger.write_alteration(note, mens, Rule::AlterationBeforeLarger)
            } else {
                continue;
            }
        } else if !note_perfect_as_whole(note, mens) {
            let dot = followed_by_aug_dot(events, e);
            ledger.write_with_rule(note, mens, Rule::UnalteredImperfect, dot, 1, 1)
        } else {
            continue;
        };
        written += count(outcome);
    }
    written
}

fn fills_unit_before(
    events: &[Event],
    e: usize,
    level: Level,
    mens: &Mensuration,
    ledger: &Ledger,
) -> bool {
    let mut target = minim_count(level, mens, 0);
    for i in (0..e).rev() {
        let Some(duration) = ledger.read_duration(events[i].id) else {
            return false;
        };
        target -= duration;
        if target == whole(0) {
            return i == 0 || events[i - 1].is_longer_than(level) || events[i - 1].is_division_dot();
        }
        if target < whole(0) {
            return false;
        }
    }
    false
}

/// A regularly perfect note followed by a note or rest of the same value
/// cannot be imperfected from behind
fn ante_simile(events: &[Event], mens: &Mensuration, ledger: &mut Ledger) -> usize {
    let mut written = 0;
    for (e, event) in events.iter().enumerate() {
        let Some(note) = unresolved_note(event, ledger) else {
            continue;
        };
        let Some(level) = note.level() else {
            continue;
        };
        let same_follows = events
            .get(e + 1)
            .map_or(false, |next| next.is_note_or_rest() && next.level() == Some(level));
        if same_follows && regularly_perfect(level, mens) {
            written += count(ledger.write_perfection(note, mens, Rule::AnteSimile, false));
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::interpreter::ledger::DurationQuality;
    use crate::models::{Document, ElementId, Minims, Voice, VoiceBuilder};

    fn setup(builder: VoiceBuilder) -> (Vec<ElementId>, BlockIndex, Ledger) {
        let mut doc = Document::new();
        doc.push_voice(builder);
        let index = BlockIndex::build(&doc, &mut Diagnostics::new());
        let mut ledger = Ledger::new();
        run(&index, &mut ledger);
        (doc.event_ids(0), index, ledger)
    }

    #[test]
    fn test_rests_and_dotted_rests() {
        let (ids, _, ledger) = setup(
            Voice::builder(1)
                .mensur_digits([2, 3, 2, 2])
                .rest(Level::Brevis)
                .rest(Level::Semibrevis)
                .aug_dot(),
        );
        assert_eq!(ledger.read_duration(ids[0]), Some(whole(6)));
        assert_eq!(ledger.read_duration(ids[1]), Some(whole(3)));
        assert_eq!(ledger.rule(ids[0]), Some(Rule::Rest));
    }

    #[test]
    fn test_coloration_is_two_thirds() {
        let (ids, _, ledger) = setup(
            Voice::builder(1)
                .mensur_digits([3, 3, 2, 2])
                .colored(Level::Semibrevis)
                .colored(Level::Brevis),
        );
        assert_eq!(ledger.read_duration(ids[0]), Some(whole(2)));
        assert_eq!(ledger.read_duration(ids[1]), Some(whole(6)));
        assert_eq!(ledger.quality(ids[0]), DurationQuality::Colored);
    }

    #[test]
    fn test_dot_after_perfect_note_is_perfection() {
        let (ids, _, ledger) = setup(
            Voice::builder(1)
                .mensur_digits([2, 3, 2, 2])
                .note(Level::Brevis)
                .aug_dot()
                .note(Level::Semibrevis)
                .aug_dot(),
        );
        assert_eq!(ledger.read_duration(ids[0]), Some(whole(6)));
        assert_eq!(ledger.rule(ids[0]), Some(Rule::PerfectionByDot));
        // the semibreve is not perfect as a whole in minor prolation
        assert_eq!(ledger.read_duration(ids[2]), Some(whole(3)));
        assert_eq!(ledger.rule(ids[2]), Some(Rule::SimpleDot));
    }

    #[test]
    fn test_unalterable_notes_take_face_value() {
        let (ids, _, ledger) = setup(
            Voice::builder(1)
                .mensur_digits([2, 3, 2, 2])
                .note(Level::Minima)
                .note(Level::Semiminima)
                .note(Level::Longa),
        );
        assert_eq!(ledger.read_duration(ids[0]), Some(whole(1)));
        assert_eq!(ledger.read_duration(ids[1]), Some(Minims::new(1, 2)));
        assert_eq!(ledger.read_duration(ids[2]), Some(whole(12)));
        assert_eq!(ledger.rule(ids[0]), Some(Rule::UnalterableImperfect));
    }

    #[test]
    fn test_alteration_before_larger_rest() {
        let (ids, _, ledger) = setup(
            Voice::builder(1)
                .mensur_digits([3, 2, 2, 2])
                .note(Level::Minima)
                .note(Level::Minima)
                .rest(Level::Semibrevis),
        );
        assert_eq!(ledger.read_duration(ids[0]), Some(whole(1)));
        assert_eq!(ledger.rule(ids[0]), Some(Rule::UnalteredImperfect));
        assert_eq!(ledger.read_duration(ids[1]), Some(whole(2)));
        assert_eq!(ledger.rule(ids[1]), Some(Rule::AlterationBeforeLarger));
        assert_eq!(ledger.read_duration(ids[2]), Some(whole(3)));
    }

    #[test]
    fn test_alteration_of_semibreves_in_perfect_tempus() {
        let (ids, _, ledger) = setup(
            Voice::builder(1)
                .mensur_digits([2, 3, 2, 2])
                .note(Level::Semibrevis)
                .note(Level::Semibrevis)
                .rest(Level::Brevis),
        );
        assert_eq!(ledger.read_duration(ids[0]), Some(whole(2)));
        assert_eq!(ledger.read_duration(ids[1]), Some(whole(4)));
        assert_eq!(ledger.quality(ids[1]), DurationQuality::Altered);
    }

    #[test]
    fn test_alterable_note_after_larger_is_plain() {
        let (ids, _, ledger) = setup(
            Voice::builder(1)
                .mensur_digits([2, 3, 2, 2])
                .note(Level::Longa)
                .note(Level::Semibrevis)
                .note(Level::Brevis),
        );
        assert_eq!(ledger.read_duration(ids[1]), Some(whole(2)));
        assert_eq!(ledger.rule(ids[1]), Some(Rule::UnalteredImperfectAfterLarger));
        // the breve is left for the beat-dependent pass
        assert!(!ledger.is_resolved(ids[2]));
    }

    #[test]
    fn test_ante_simile() {
        let (ids, _, ledger) = setup(
            Voice::builder(1)
                .mensur_digits([2, 3, 2, 2])
                .note(Level::Brevis)
                .note(Level::Brevis)
                .rest(Level::Brevis),
        );
        assert_eq!(ledger.read_duration(ids[0]), Some(whole(6)));
        assert_eq!(ledger.rule(ids[0]), Some(Rule::AnteSimile));
        assert_eq!(ledger.read_duration(ids[1]), Some(whole(6)));
    }

    #[test]
    fn test_explicit_quality_wins_over_dot() {
        let mut doc = Document::new();
        let mut builder = Voice::builder(1).mensur_digits([2, 3, 2, 2]);
        builder.push_source(
            crate::models::Element::Note(crate::models::Note {
                level: Level::Brevis,
                colored: false,
                quality: Some(NotatedQuality::Imperfect),
                given_duration: None,
            }),
            None,
            0,
        );
        doc.push_voice(builder.aug_dot());
        let index = BlockIndex::build(&doc, &mut Diagnostics::new());
        let mut ledger = Ledger::new();
        run(&index, &mut ledger);
        let ids = doc.event_ids(0);
        assert_eq!(ledger.read_duration(ids[0]), Some(whole(4)));
        assert_eq!(ledger.rule(ids[0]), Some(Rule::Explicit));
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let mut doc = Document::new();
        doc.push_voice(
            Voice::builder(1)
                .mensur_digits([2, 3, 2, 2])
                .note(Level::Brevis)
                .note(Level::Semibrevis)
                .note(Level::Minima)
                .aug_dot()
                .colored(Level::Brevis)
                .rest(Level::Longa),
        );
        let index = BlockIndex::build(&doc, &mut Diagnostics::new());
        let mut ledger = Ledger::new();
        assert!(run(&index, &mut ledger) > 0);
        let before = serde_json::to_string(&ledger).unwrap();
        assert_eq!(run(&index, &mut ledger), 0);
        assert_eq!(serde_json::to_string(&ledger).unwrap(), before);
        assert!(ledger.conflicts().is_empty());
    }
}
