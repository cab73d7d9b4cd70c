//! Bar lines from resolved beat positions
//!
//! Placement is computed from the ledger's breve flags alone and then
//! applied to the document as a separate step.

use serde::{Deserialize, Serialize};

use super::ledger::Ledger;
use crate::models::{BarLine, BarLineForm, Document, Element, ElementId, Voice, VoiceItem};

/// A bar line to insert before an existing element
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarLinePlacement {
    pub before: ElementId,
    pub form: BarLineForm,
}

/// Bar lines for one voice.
///
/// An event on a breve boundary gets a dotted bar line when it directly
/// follows a note, rest or dot. When it follows a run of mensuration or
/// proportion signs, a single bar line goes before the run instead, unless
/// the run opens the voice. Nothing is placed where a bar line already is.
pub fn place_bar_lines(voice: &Voice, ledger: &Ledger) -> Vec<BarLinePlacement> {
    let items = &voice.items;
    let mut placements = Vec::new();
    for (i, item) in items.iter().enumerate() {
        if i == 0 || !item.element.is_event() || !ledger.on_the_breve_beat(item.id) {
            continue;
        }
        let previous = &items[i - 1].element;
        if previous.is_event() {
            placements.push(BarLinePlacement { before: item.id, form: BarLineForm::Dotted });
        } else if previous.is_context_marker() {
            let run_start = items[..i]
                .iter()
                .rposition(|candidate| !candidate.element.is_context_marker())
                .map_or(0, |p| p + 1);
            let preceded_by_bar = run_start > 0 && matches!(items[run_start - 1].element, Element::BarLine(_));
            if run_start > 0 && !preceded_by_bar {
                placements.push(BarLinePlacement {
                    before: items[run_start].id,
                    form: BarLineForm::Single,
                });
            }
        }
    }
    placements
}

/// Every voice's placements, in document voice order
pub fn place_all_bar_lines(document: &Document, ledger: &Ledger) -> Vec<BarLinePlacement> {
    document
        .voices()
        .into_iter()
        .flat_map(|voice| place_bar_lines(voice, ledger))
        .collect()
}

/// Insert the bar lines into the document. Returns the ids given to them.
pub fn apply_bar_lines(document: &mut Document, placements: &[BarLinePlacement]) -> Vec<ElementId> {
    let mut inserted = Vec::new();
    for placement in placements {
        let id = document.allocate_id();
        let mut voices = document.voices_mut();
        let target = voices
            .iter_mut()
            .find_map(|voice| voice.position_of(placement.before).map(|pos| (voice, pos)));
        match target {
            Some((voice, position)) => {
                voice.items.insert(
                    position,
                    VoiceItem {
                        id,
                        xml_id: None,
                        source_index: None,
                        element: Element::BarLine(BarLine { form: placement.form }),
                    },
                );
                inserted.push(id);
            }
            None => log::warn!("No element {:?} to place a bar line before", placement.before),
        }
    }
    inserted
}
