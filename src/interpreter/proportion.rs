//! Proportion scaling
//!
//! Resolution always works on intermediate (unscaled) minim counts. Once a
//! block is finished, every note and rest with a duration gets a scaled
//! duration: the intermediate value times the block's multiplier.

use super::blockify::{Block, BlockIndex};
use super::ledger::Ledger;
use crate::models::mensuration::unit_multiplier;
use crate::models::{Minims, Proportion};

/// Multiplier for a block: its own proportion if it has one, else the one
/// inherited from the previous block of the voice, else 1
pub fn block_multiplier(own: Option<&Proportion>, inherited: Option<Minims>) -> Minims {
    own.map(Proportion::multiplier)
        .or(inherited)
        .unwrap_or_else(unit_multiplier)
}

/// Write scaled durations for one block. Returns how many were written.
pub fn scale_block(block: &Block, ledger: &mut Ledger) -> usize {
    let mut scaled = 0;
    for event in block.notes_and_rests() {
        if let Some(duration) = ledger.read_duration(event.id) {
            ledger.set_scaled(event.id, duration * block.prop_multiplier);
            scaled += 1;
        }
    }
    scaled
}

/// Scale every block
pub fn scale_all(index: &BlockIndex, ledger: &mut Ledger) -> usize {
    index.blocks.iter().map(|block| scale_block(block, ledger)).sum()
}

/// Recover an intermediate duration from a scaled one
pub fn unscale(scaled: Minims, multiplier: Minims) -> Option<Minims> {
    if multiplier == Minims::from_integer(0) {
        None
    } else {
        Some(scaled / multiplier)
    }
}
