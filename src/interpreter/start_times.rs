//! Start times
//!
//! Offsets only advance over known durations: the walk through a block
//! stops at the first note or rest whose duration is still unknown, and
//! nothing after it gets an offset. Beat positions and breve flags follow
//! from the block-relative offsets.

use super::blockify::{Block, BlockIndex};
use super::ledger::Ledger;
use crate::models::minims::whole;
use crate::models::{Mensuration, Minims};

/// Record offsets for every note and rest of `block` that can have one.
///
/// `voice_offset` is where the block starts within its voice, if known.
/// Returns the block-relative end of the block when every duration in it is
/// known.
pub fn add_start_times_for_block(
    block: &Block,
    mens: &Mensuration,
    ledger: &mut Ledger,
    voice_offset: Option<Minims>,
) -> Option<Minims> {
    let mut block_from = Some(whole(0));
    let mut starts_at = voice_offset;
    for event in block.notes_and_rests() {
        ledger.clear_timing(event.id);
        let Some(from) = block_from else {
            continue;
        };
        ledger.set_starts_at(event.id, from, starts_at);
        match ledger.read_duration(event.id) {
            Some(duration) => {
                block_from = Some(from + duration);
                starts_at = starts_at.map(|s| s + duration);
            }
            None => block_from = None,
        }
    }
    add_breve_boundaries_for_block(block, mens, ledger);
    block_from
}

/// Beat positions and breve flags for every event with a known block offset
pub fn add_breve_boundaries_for_block(block: &Block, mens: &Mensuration, ledger: &mut Ledger) {
    let mut previous = None;
    for event in block.notes_and_rests() {
        let Some(from) = ledger.block_from(event.id) else {
            return;
        };
        let position = ledger.set_beat_position(event.id, from, mens);
        ledger.set_breve_boundary_flags(event.id, previous.as_ref(), &position);
        previous = Some(position);
    }
}

/// Walk every voice from offset zero, block by block
pub fn add_all_start_times(index: &BlockIndex, ledger: &mut Ledger) {
    let mut next_start = Some(whole(0));
    let mut current_voice = None;
    for block in &index.blocks {
        if current_voice != Some(block.voice) {
            next_start = Some(whole(0));
            current_voice = Some(block.voice);
        }
        let end = add_start_times_for_block(block, index.mensuration(block), ledger, next_start);
        next_start = next_voice_offset(next_start, end);
    }
}

/// Voice offset after a block, known only if both the block's start and its
/// length are
pub fn next_voice_offset(start: Option<Minims>, block_end: Option<Minims>) -> Option<Minims> {
    match (start, block_end) {
        (Some(start), Some(end)) => Some(start + end),
        _ => None,
    }
}

/// Fill in each block's start offset and end positions from the ledger
pub fn update_blocks(index: &mut BlockIndex, ledger: &Ledger) {
    for block in &mut index.blocks {
        let first = block.notes_and_rests().next().map(|e| e.id);
        let last = block.notes_and_rests().last().map(|e| e.id);
        block.start_offset = first.and_then(|id| ledger.starts_at(id));
        let (total, cumulative) = match last {
            Some(id) => {
                let duration = ledger.read_duration(id);
                (
                    ledger.block_from(id).zip(duration).map(|(from, d)| from + d),
                    ledger.starts_at(id).zip(duration).map(|(at, d)| at + d),
                )
            }
            None => (None, None),
        };
        block.total_duration = total;
        block.cumulative_duration = cumulative;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::models::{Document, Level, Voice};

    #[test]
    fn test_offsets_stop_at_unknown_duration() {
        let mut doc = Document::new();
        doc.push_voice(
            Voice::builder(1)
                .mensur_digits([2, 3, 2, 2])
                .note(Level::Brevis)
                .note(Level::Semibrevis)
                .div_dot()
                .note(Level::Brevis)
                .note(Level::Brevis),
        );
        let index = BlockIndex::build(&doc, &mut Diagnostics::new());
        let ids = doc.event_ids(0);
        let mut ledger = Ledger::new();
        ledger.write_duration(ids[0], whole(4));
        ledger.write_duration(ids[1], whole(2));

        add_all_start_times(&index, &mut ledger);
        assert_eq!(ledger.block_from(ids[0]), Some(whole(0)));
        assert_eq!(ledger.block_from(ids[1]), Some(whole(4)));
        // the dot carries no timing
        assert_eq!(ledger.block_from(ids[2]), None);
        // the third note starts at 6 even though its own duration is unknown
        assert_eq!(ledger.block_from(ids[3]), Some(whole(6)));
        assert_eq!(ledger.block_from(ids[4]), None);

        assert!(ledger.on_the_breve_beat(ids[0]));
        assert!(!ledger.on_the_breve_beat(ids[1]));
        assert!(ledger.on_the_breve_beat(ids[3]));
    }

    #[test]
    fn test_voices_restart_at_zero_and_blocks_chain() {
        let mut doc = Document::new();
        doc.push_voice(
            Voice::builder(1)
                .mensur_digits([2, 2, 2, 2])
                .note(Level::Brevis)
                .mensur_digits([2, 3, 2, 2])
                .note(Level::Brevis),
        );
        doc.push_voice(Voice::builder(2).mensur_digits([2, 2, 2, 2]).note(Level::Longa));
        let mut index = BlockIndex::build(&doc, &mut Diagnostics::new());
        let first = doc.event_ids(0);
        let second = doc.event_ids(1);
        let mut ledger = Ledger::new();
        ledger.write_duration(first[0], whole(4));
        ledger.write_duration(first[1], whole(6));
        ledger.write_duration(second[0], whole(8));

        add_all_start_times(&index, &mut ledger);
        assert_eq!(ledger.starts_at(first[1]), Some(whole(4)));
        assert_eq!(ledger.block_from(first[1]), Some(whole(0)));
        assert_eq!(ledger.starts_at(second[0]), Some(whole(0)));

        update_blocks(&mut index, &ledger);
        assert_eq!(index.blocks[1].start_offset, Some(whole(4)));
        assert_eq!(index.blocks[1].total_duration, Some(whole(6)));
        assert_eq!(index.blocks[1].cumulative_duration, Some(whole(10)));
        assert_eq!(index.blocks[2].cumulative_duration, Some(whole(8)));
    }

    #[test]
    fn test_unknown_block_leaves_next_block_without_voice_offset() {
        assert_eq!(next_voice_offset(Some(whole(2)), None), None);
        assert_eq!(next_voice_offset(None, Some(whole(2))), None);
        assert_eq!(next_voice_offset(Some(whole(2)), Some(whole(3))), Some(whole(5)));
    }
}
