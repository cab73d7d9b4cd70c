//! Imperfection rules
//!
//! Dispatched on the beat of the note's own unit at which an unresolved
//! note starts. First-beat notes look ahead at the window of shorter
//! values that follow them; second- and third-beat notes are imperfected
//! outright. Mid-beat notes are left alone: no rule covers them.

use super::ledger::{Ledger, Rule};
use super::mensuration::{
    can_imperfect, first_perfect_level, imperfecting_units, is_alterable, minim_count,
    note_perfect_as_whole,
};
use super::BlockContext;
use crate::diagnostics::{kinds, DiagnosticMark, Diagnostics};
use crate::models::minims::whole;
use crate::models::{Event, Level, Minims};

/// Pick the rule for the beat the note falls on
pub fn dispatch(
    beat: Option<i64>,
    ctx: &BlockContext,
    index: usize,
    ledger: &mut Ledger,
    diagnostics: &mut Diagnostics,
) {
    match beat {
        Some(0) => first_beat_imperfection(ctx, index, ledger, diagnostics),
        Some(1) => second_beat_imperfection(ctx, index, ledger),
        Some(2) => third_beat_imperfection(ctx, index, ledger, diagnostics),
        _ => mid_beat_imperfection(ctx, index),
    }
}

/// First beat: perfect if nothing shorter follows (I.3); simply imperfect
/// if a single shorter note does (I.4a); otherwise decided by the window
/// of events up to the next note at least as long or division dot.
pub fn first_beat_imperfection(
    ctx: &BlockContext,
    index: usize,
    ledger: &mut Ledger,
    diagnostics: &mut Diagnostics,
) {
    let events = ctx.events;
    let event = &events[index];
    let Some(level) = event.level() else {
        return;
    };
    let end = index_of_next_same_or_longer_or_dot(level, index, events).unwrap_or(events.len());
    let window = &events[index + 1..end];

    if window.is_empty() {
        ledger.write_perfection(event, ctx.mens, Rule::NothingFollows, false);
    } else if single_imperfecting_note(ctx, index, level) {
        ledger.write_simple_imperfection(event, ctx.mens, Rule::ImperfectionByUnit);
    } else if let Some(pair) = equal_pair_before_boundary(ctx, index, level) {
        let reduce_by = minim_count(pair, ctx.mens, 0) * 2;
        ledger.write_imperfection(event, ctx.mens, reduce_by, Rule::ImperfectionByUnit, false);
    } else {
        first_beat_imperfection_check(ctx, event, level, window, ledger, diagnostics);
    }
}

/// One note or rest that can imperfect this one, then a division dot or
/// something at least as long
fn single_imperfecting_note(ctx: &BlockContext, index: usize, level: Level) -> bool {
    let events = ctx.events;
    let (Some(next), Some(after)) = (events.get(index + 1), events.get(index + 2)) else {
        return false;
    };
    let closes = after.is_division_dot() || (after.is_note_or_rest() && after.level_index() >= level.index());
    closes
        && next
            .level()
            .map_or(false, |short| can_imperfect(short, level, ctx.mens))
}

/// Two notes of equal value that together imperfect this one, followed by a
/// division dot, a pair of division-like rests, or the end of the block.
/// Returns the level of the pair.
fn equal_pair_before_boundary(ctx: &BlockContext, index: usize, level: Level) -> Option<Level> {
    let events = ctx.events;
    let first = events.get(index + 1)?;
    let second = events.get(index + 2)?;
    let boundary = match events.get(index + 3) {
        Some(after) => {
            after.is_division_dot()
                || division_like_rests(first_perfect_level(ctx.mens) + 1, second, after)
        }
        None => true,
    };
    let pair = first.level()?;
    let equal = first.is_note_or_rest() && second.level() == Some(pair);
    (boundary && equal && can_imperfect(pair, level, ctx.mens)).then_some(pair)
}

/// Adjacent rests at different staff positions mark off mensural units the
/// way a division dot does
fn division_like_rests(max_level: i32, left: &Event, right: &Event) -> bool {
    left.is_rest() && right.is_rest() && left.level_index() < max_level && left.loc() != right.loc()
}

fn first_beat_imperfection_check(
    ctx: &BlockContext,
    event: &Event,
    level: Level,
    window: &[Event],
    ledger: &mut Ledger,
    diagnostics: &mut Diagnostics,
) {
    let mens = ctx.mens;
    let duration = ledger.window_duration(window, mens);
    let mut units = imperfecting_units(level, mens);
    let last_alterable = window.last().map_or(false, |last| is_alterable(last, mens));

    if let Some(definite) = duration.definite.filter(|d| *d > whole(0)) {
        while let Some(unit) = units.pop() {
            let ratio = definite / unit;
            if ratio == whole(1) {
                ledger.write_imperfection(event, mens, unit, Rule::ImperfectionByUnit, false);
                return;
            } else if ratio == whole(2) {
                if last_alterable {
                    ledger.write_perfection(event, mens, Rule::PerfectTrustingAlteration, false);
                    ledger.write_comment(event.id, "trusting in alteration");
                } else {
                    ledger.write_imperfection(event, mens, unit, Rule::ImperfectionAdded, false);
                    ledger.write_comment(event.id, "Alteration is impossible");
                }
                return;
            } else if is_whole_units(ratio) {
                ledger.write_perfection(event, mens, Rule::PerfectWholeUnits, false);
                return;
            } else if ratio > whole(3) {
                ledger.write_imperfection(event, mens, unit, Rule::ImperfectionByLargest, false);
                return;
            }
        }
        unresolved_window(event, definite, diagnostics);
        return;
    }

    let (Some(&smallest), Some(&largest)) = (units.first(), units.last()) else {
        unresolved_window(event, duration.approximation, diagnostics);
        return;
    };
    let face_below = minim_count(level, mens, -1);
    let ends_with_alterable_part = window
        .last()
        .map_or(false, |last| last.level_index() == level.index() - 1 && last_alterable);

    if solid_block(duration.approximation, &units).is_some() {
        // obvious blocks of perfect units are not altered
        ledger.write_perfection(event, mens, Rule::PerfectLiteralUnits, true);
    } else if duration.approximation / face_below == whole(2)
        && note_perfect_as_whole(event, mens)
        && ends_with_alterable_part
    {
        // two units' worth, the last of which will be altered
        ledger.write_perfection(event, mens, Rule::PerfectLiteralAlteration, true);
        ledger.write_comment(event.id, "trusting in alteration");
    } else if duration.bare_minimum > smallest * 3 {
        ledger.write_imperfection(event, mens, largest, Rule::ImperfectionByBareMinimum, true);
    } else if duration.approximate_minimum > smallest * 3 {
        ledger.write_imperfection(event, mens, largest, Rule::ImperfectionByApproximateMinimum, false);
    } else {
        unresolved_window(event, duration.approximation, diagnostics);
    }
}

fn unresolved_window(event: &Event, window: Minims, diagnostics: &mut Diagnostics) {
    log::warn!("Failed to resolve {:?} against a window of {} minims", event.id, window);
    diagnostics.add_once(DiagnosticMark::warning(
        event.id,
        kinds::UNRESOLVED_WINDOW,
        format!("No imperfection rule matches a following window of {} minims", window),
    ));
}

fn is_whole_units(ratio: Minims) -> bool {
    [3, 6, 9].into_iter().any(|n| ratio == whole(n))
}

/// If `minims` is 3, 6 or 9 times one of the candidate units (largest
/// first), that unit
fn solid_block(minims: Minims, units: &[Minims]) -> Option<Minims> {
    if minims % whole(3) != whole(0) {
        return None;
    }
    units.iter().rev().copied().find(|unit| is_whole_units(minims / *unit))
}

/// Second beat: something earlier must be imperfecting it (I.8)
pub fn second_beat_imperfection(ctx: &BlockContext, index: usize, ledger: &mut Ledger) {
    let event = &ctx.events[index];
    ledger.write_simple_imperfection(event, ctx.mens, Rule::SecondBeatImperfection);
}

/// Third beat: imperfected from behind when a nearby division dot closes a
/// window worth one imperfecting unit (I.9b), else from ahead by the
/// largest unit (I.9a)
pub fn third_beat_imperfection(
    ctx: &BlockContext,
    index: usize,
    ledger: &mut Ledger,
    diagnostics: &mut Diagnostics,
) {
    let events = ctx.events;
    let event = &events[index];
    let Some(level) = event.level() else {
        return;
    };
    let units = imperfecting_units(level, ctx.mens);
    if let Some(dot) = index_of_next_dot(index, events).filter(|dot| dot - index < 6) {
        let behind = ledger
            .window_duration(&events[index + 1..dot], ctx.mens)
            .approximation;
        if units.contains(&behind) {
            ledger.write_imperfection(event, ctx.mens, behind, Rule::ImperfectionFromBehind, false);
            return;
        }
    }
    match units.last() {
        Some(&largest) => {
            ledger.write_imperfection(event, ctx.mens, largest, Rule::ImperfectionFromAhead, false);
        }
        None => unresolved_window(event, whole(0), diagnostics),
    }
}

/// No rule covers notes starting inside a beat
pub fn mid_beat_imperfection(ctx: &BlockContext, index: usize) {
    log::debug!("Mid-beat imperfection of {:?} left unresolved", ctx.events[index].id);
}

fn index_of_next_same_or_longer_or_dot(level: Level, index: usize, events: &[Event]) -> Option<usize> {
    events
        .iter()
        .enumerate()
        .skip(index + 1)
        .find(|(_, e)| e.is_division_dot() || e.level_index() >= level.index())
        .map(|(i, _)| i)
}

fn index_of_next_dot(index: usize, events: &[Event]) -> Option<usize> {
    events
        .iter()
        .enumerate()
        .skip(index + 1)
        .find(|(_, e)| e.is_division_dot())
        .map(|(i, _)| i)
}
