//! Duration inference
//!
//! The interpreter works on a [`Document`](crate::models::Document) in
//! stages: blockify the voices, run the context-free rules, iterate the
//! beat-dependent rules to a fixpoint, scale by proportions and finally
//! place bar lines. Every inferred value lives in the [`Ledger`].

pub mod alteration;
pub mod beat_dependent;
pub mod blockify;
pub mod context_free;
pub mod error;
pub mod imperfection;
pub mod ledger;
pub mod mensuration;
pub mod pipeline;
pub mod postprocess;
pub mod proportion;
pub mod start_times;

pub use beat_dependent::{FixpointReport, IrresolvableEvent, SweepReport};
pub use blockify::{Block, BlockIndex, BlockRow};
pub use error::InterpretError;
pub use ledger::{DurationQuality, EventRecord, Ledger, LedgerConflict, Rule};
pub use mensuration::BeatPosition;
pub use pipeline::{Interpretation, Interpreter};
pub use postprocess::BarLinePlacement;

use crate::models::{Event, Mensuration};

/// What the beat rules see of one block
#[derive(Clone, Copy, Debug)]
pub struct BlockContext<'a> {
    pub block: usize,
    pub events: &'a [Event],
    pub mens: &'a Mensuration,
}
