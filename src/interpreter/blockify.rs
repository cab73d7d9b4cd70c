//! Blockifier
//!
//! Splits each voice into mensurally coherent blocks: maximal runs of
//! events sharing one mensuration and one proportion. A sign that arrives
//! before any event of the current block attaches to it; a sign that
//! arrives after events closes the block and opens a new one.
//!
//! Mensurations are stored once in [`BlockIndex::mensurations`] and blocks
//! refer to them by slot, so a proportion change keeps pointing at the same
//! mensuration (and sees any refinement made to it by a later rest).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::mensuration::mensur_summary;
use super::proportion::block_multiplier;
use crate::diagnostics::{kinds, DiagnosticMark, DiagnosticSeverity, Diagnostics};
use crate::models::minims::to_f64;
use crate::models::{
    Division, Document, Element, ElementId, Event, Level, Mensuration, Minims, Proportion, Rest,
    Voice, VoiceItem,
};

const UNSET: Mensuration = Mensuration {
    prolatio: None,
    tempus: None,
    modus_minor: None,
    modus_maior: None,
};

/// A run of events in one voice under one mensuration and proportion
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Block {
    /// Ordinal of the owning voice in [`Document::voices`]
    pub voice: usize,
    pub part: u32,
    pub layer: u32,
    /// Slot in [`BlockIndex::mensurations`]; `None` if no mensuration was
    /// ever given for the voice
    pub mensuration: Option<usize>,
    pub mensur_element: Option<ElementId>,
    pub proportion: Option<Proportion>,
    pub proportion_element: Option<ElementId>,
    /// Factor applied to every duration in the block
    pub prop_multiplier: Minims,
    pub events: Vec<Event>,
    /// Voice-relative offset of the block's first event
    pub start_offset: Option<Minims>,
    /// Block-relative end of the last event
    pub total_duration: Option<Minims>,
    /// Voice-relative end of the last event
    pub cumulative_duration: Option<Minims>,
}

impl Block {
    fn open(voice: usize, source: &Voice, mensuration: Option<usize>, proportion: Option<Proportion>) -> Self {
        Self {
            voice,
            part: source.part,
            layer: source.layer,
            mensuration,
            mensur_element: None,
            proportion,
            proportion_element: None,
            prop_multiplier: Minims::from_integer(1),
            events: Vec::new(),
            start_offset: None,
            total_duration: None,
            cumulative_duration: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Notes and rests only
    pub fn notes_and_rests(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.is_note_or_rest())
    }
}

/// One row of the block table export
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BlockRow {
    pub index: usize,
    pub part: u32,
    pub layer: u32,
    pub mensuration: Option<[Option<i64>; 4]>,
    pub proportion: Option<Proportion>,
    pub prop_multiplier: f64,
    pub events: usize,
    pub duration: Option<f64>,
    pub total_duration: Option<f64>,
}

/// All blocks of a document with the event → block ownership index
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BlockIndex {
    pub blocks: Vec<Block>,
    pub mensurations: Vec<Mensuration>,
    owners: BTreeMap<ElementId, usize>,
}

impl BlockIndex {
    /// Blockify every voice of the document, voice by voice.
    ///
    /// A voice starts under the last mensuration seen for the same part,
    /// else the staff definition's mensuration, else the last mensuration
    /// of the previous voice.
    pub fn build(document: &Document, diagnostics: &mut Diagnostics) -> BlockIndex {
        let mut index = BlockIndex::default();
        let mut last_by_part: BTreeMap<u32, Mensuration> = BTreeMap::new();
        let mut previous_last: Option<Mensuration> = None;

        for (ordinal, voice) in document.voices().into_iter().enumerate() {
            let initial = last_by_part
                .get(&voice.part)
                .or_else(|| document.staff_mensurations.get(&voice.part))
                .or(previous_last.as_ref())
                .copied();
            let first_block = index.blocks.len();
            blocks_from_voice(voice, ordinal, initial, &mut index, diagnostics);

            let last_slot = index.blocks[first_block..]
                .iter()
                .rev()
                .find_map(|block| block.mensuration);
            if let Some(slot) = last_slot {
                let mens = index.mensurations[slot];
                last_by_part.insert(voice.part, mens);
                previous_last = Some(mens);
            }
        }
        log::debug!(
            "Blockified {} voices into {} blocks",
            document.voices().len(),
            index.blocks.len()
        );
        index
    }

    /// The mensuration governing a block (unset if none was given)
    pub fn mensuration(&self, block: &Block) -> &Mensuration {
        block
            .mensuration
            .and_then(|slot| self.mensurations.get(slot))
            .unwrap_or(&UNSET)
    }

    pub fn mensuration_of(&self, block_index: usize) -> &Mensuration {
        self.blocks
            .get(block_index)
            .map_or(&UNSET, |block| self.mensuration(block))
    }

    /// Index of the block that owns an event
    pub fn block_of(&self, id: ElementId) -> Option<usize> {
        self.owners.get(&id).copied()
    }

    /// Every event in block order
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.blocks.iter().flat_map(|b| b.events.iter())
    }

    pub fn event_count(&self) -> usize {
        self.blocks.iter().map(|b| b.events.len()).sum()
    }

    /// Summary table of the blocks, one row each
    pub fn table(&self) -> Vec<BlockRow> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(index, block)| BlockRow {
                index,
                part: block.part,
                layer: block.layer,
                mensuration: block
                    .mensuration
                    .and_then(|slot| self.mensurations.get(slot))
                    .map(mensur_summary),
                proportion: block.proportion,
                prop_multiplier: to_f64(block.prop_multiplier),
                events: block.events.len(),
                duration: block.total_duration.map(to_f64),
                total_duration: block.cumulative_duration.map(to_f64),
            })
            .collect()
    }

    fn push_slot(&mut self, mut mens: Mensuration) -> usize {
        mens.default_modi();
        self.mensurations.push(mens);
        self.mensurations.len() - 1
    }

    fn close(&mut self, block: Block, diagnostics: &mut Diagnostics) {
        let block_index = self.blocks.len();
        if block.is_empty() {
            diagnostics.add(DiagnosticMark::new(
                block.mensur_element.or(block.proportion_element),
                DiagnosticSeverity::Info,
                kinds::EMPTY_BLOCK,
                format!("Block {} in part {} has no events", block_index, block.part),
            ));
        }
        for event in &block.events {
            self.owners.insert(event.id, block_index);
        }
        self.blocks.push(block);
    }
}

/// Split one voice into blocks, appending them (and any new mensuration
/// slots) to `index`. `initial` is the mensuration in force before the
/// voice's first sign.
pub fn blocks_from_voice(
    voice: &Voice,
    ordinal: usize,
    initial: Option<Mensuration>,
    index: &mut BlockIndex,
    diagnostics: &mut Diagnostics,
) {
    let initial_slot = initial.map(|mens| index.push_slot(mens));
    let mut current = Block::open(ordinal, voice, initial_slot, None);
    let mut previous_multiplier = None;

    for item in &voice.items {
        match &item.element {
            Element::Mensuration(mens) => {
                let slot = index.push_slot(*mens);
                if mens.is_incomplete() {
                    diagnostics.add(DiagnosticMark::warning(
                        item.id,
                        kinds::MISSING_MENSURATION_DIGIT,
                        "Mensuration lacks prolation or tempus; binary will be assumed",
                    ));
                }
                if !current.is_empty() {
                    let carried = current.proportion;
                    previous_multiplier = Some(current.prop_multiplier);
                    let closed = std::mem::replace(
                        &mut current,
                        Block::open(ordinal, voice, Some(slot), carried),
                    );
                    index.close(closed, diagnostics);
                    current.prop_multiplier = block_multiplier(carried.as_ref(), previous_multiplier);
                } else {
                    current.mensuration = Some(slot);
                }
                current.mensur_element = Some(item.id);
            }
            Element::Proportion(proportion) => {
                if !proportion.is_complete() {
                    diagnostics.add(DiagnosticMark::warning(
                        item.id,
                        kinds::INCOMPLETE_PROPORTION,
                        "Proportion is missing num or numbase",
                    ));
                }
                if !current.is_empty() {
                    previous_multiplier = Some(current.prop_multiplier);
                    let mensuration = current.mensuration;
                    let closed = std::mem::replace(
                        &mut current,
                        Block::open(ordinal, voice, mensuration, Some(*proportion)),
                    );
                    index.close(closed, diagnostics);
                } else {
                    current.proportion = Some(*proportion);
                }
                current.proportion_element = Some(item.id);
                current.prop_multiplier = block_multiplier(Some(proportion), previous_multiplier);
            }
            Element::Rest(rest) => {
                if let Some(slot) = current.mensuration {
                    if let Some(mens) = index.mensurations.get_mut(slot) {
                        refine_from_rest(mens, rest);
                    }
                }
                push_event(&mut current, item);
            }
            Element::Note(_) | Element::Dot(_) => push_event(&mut current, item),
            Element::BarLine(_) => {}
        }
    }

    if current.mensuration.is_none() {
        if let Some(first) = current.events.first() {
            diagnostics.add(DiagnosticMark::warning(
                first.id,
                kinds::MISSING_MENSURATION_DIGIT,
                format!("Part {} has no mensuration; binary will be assumed", voice.part),
            ));
        }
    }
    index.close(current, diagnostics);
}

fn push_event(block: &mut Block, item: &VoiceItem) {
    if let Some(event) = Event::from_item(item) {
        block.events.push(event);
    }
}

/// Rests that literally show a perfect unit upgrade the modus flags
fn refine_from_rest(mens: &mut Mensuration, rest: &Rest) {
    match rest.level {
        Level::Maxima => {
            if rest.maxima_is_perfect {
                mens.modus_maior = Some(Division::Ternary);
            }
            if rest.longa_is_perfect {
                mens.modus_minor = Some(Division::Ternary);
            }
        }
        Level::Longa if rest.perfect_longa => {
            mens.modus_minor = Some(Division::Ternary);
        }
        _ => {}
    }
}
