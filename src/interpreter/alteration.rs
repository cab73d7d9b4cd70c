//! Alteration rules
//!
//! Dispatched on the beat, within the next larger unit, at which an
//! alterable note starts. The second beat always alters (A.1). First and
//! third beats look back to the previous longer note or division dot and
//! alter only if what lies between adds up to the note's own value.

use super::ledger::{Ledger, Rule};
use super::mensuration::minim_count;
use super::BlockContext;
use crate::models::minims::whole;
use crate::models::{Event, Level};

pub fn dispatch(beat: Option<i64>, ctx: &BlockContext, index: usize, ledger: &mut Ledger) {
    match beat {
        Some(0) => first_beat_alteration(ctx, index, ledger),
        Some(1) => second_beat_alteration(ctx, index, ledger),
        Some(2) => third_beat_alteration(ctx, index, ledger),
        _ => mid_beat_alteration(ctx, index),
    }
}

pub fn first_beat_alteration(ctx: &BlockContext, index: usize, ledger: &mut Ledger) {
    check_for_general_alteration(ctx, index, ledger);
}

pub fn second_beat_alteration(ctx: &BlockContext, index: usize, ledger: &mut Ledger) {
    ledger.write_alteration(&ctx.events[index], ctx.mens, Rule::SecondBeatAlteration);
}

pub fn third_beat_alteration(ctx: &BlockContext, index: usize, ledger: &mut Ledger) {
    check_for_general_alteration(ctx, index, ledger);
}

/// No rule covers notes starting inside a beat
pub fn mid_beat_alteration(ctx: &BlockContext, index: usize) {
    log::debug!("Mid-beat alteration of {:?} left unresolved", ctx.events[index].id);
}

fn check_for_general_alteration(ctx: &BlockContext, index: usize, ledger: &mut Ledger) {
    let events = ctx.events;
    let event = &events[index];
    let Some(level) = event.level() else {
        return;
    };
    let start = index_of_prev_longer_or_dot(level, index, events).map_or(0, |i| i + 1);
    let window = ledger.window_duration(&events[start..index], ctx.mens);
    let default = minim_count(level, ctx.mens, 0);
    let definite = window.definite.filter(|d| *d > whole(0));

    if definite.is_some() || window.bare_minimum == whole(0) {
        if definite == Some(default) {
            ledger.write_alteration(event, ctx.mens, Rule::AlterationFillsUnit);
        } else {
            ledger.write_plain(event, ctx.mens, Rule::UnalteredAmbiguous);
        }
    } else if window.bare_minimum > default {
        ledger.write_plain(event, ctx.mens, Rule::UnalteredWindowTooLong);
    }
}

fn index_of_prev_longer_or_dot(level: Level, index: usize, events: &[Event]) -> Option<usize> {
    events[..index]
        .iter()
        .rposition(|e| e.is_division_dot() || e.is_longer_than(level))
}
