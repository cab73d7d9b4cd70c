//! Functions that know something about mensuration
//!
//! Everything here is a pure function of a level (or event) and a
//! [`Mensuration`]. Digits are indexed from prolation (0) to modus maior (3);
//! the digit at index `i` says how many level `i + 3` notes make up one
//! level `i + 4` note.

use serde::{Deserialize, Serialize};

use crate::models::minims::whole;
use crate::models::{Division, Event, Level, Mensuration, Minims};

/// Returned by [`first_perfect_level`] when nothing is ternary
pub const NO_PERFECT_LEVEL: i32 = 20;

/// The four flags as digits, `None` where unset
pub fn mensur_summary(mens: &Mensuration) -> [Option<i64>; 4] {
    mens.flags().map(|flag| flag.map(Division::digit))
}

/// The four flags as digits, unset flags read as 2
pub fn mensuration_digits(mens: &Mensuration) -> [i64; 4] {
    mensur_summary(mens).map(|digit| digit.unwrap_or(2))
}

fn is_ternary(mens: &Mensuration, index: i32) -> bool {
    index >= 0 && index < 4 && mens.flags()[index as usize] == Some(Division::Ternary)
}

/// Number of minims a note at `level` occupies when neither altered nor
/// imperfected. `level_adjust` displaces the level (so 1 treats a minim as
/// a semibreve).
///
/// Levels below the minim halve each step. A missing digit is assumed to
/// be binary, with a warning.
pub fn minim_count(level: Level, mens: &Mensuration, level_adjust: i32) -> Minims {
    let steps = level.index() - 3 + level_adjust;
    if steps < 1 {
        return Minims::new(1, 1_i64 << (-steps));
    }
    let summary = mensur_summary(mens);
    let mut minims = 1_i64;
    for i in 0..steps as usize {
        match summary.get(i).copied().flatten() {
            Some(digit) => minims *= digit,
            None => {
                log::warn!(
                    "Missing mensuration digit {} for {:?}, assuming binary",
                    i,
                    level
                );
                minims *= 2;
            }
        }
    }
    whole(minims)
}

/// Lowest level (semifusa=0 basis) that is a ternary component, i.e.
/// `index_of_first_ternary_digit + 3`; [`NO_PERFECT_LEVEL`] if none.
pub fn first_perfect_level(mens: &Mensuration) -> i32 {
    mens.flags()
        .iter()
        .position(|flag| *flag == Some(Division::Ternary))
        .map(|i| i as i32 + 3)
        .unwrap_or(NO_PERFECT_LEVEL)
}

/// A note is alterable if it is a direct part of a ternary note (a minim
/// in major prolation, a semibreve in perfect tempus, …). Rests never are.
pub fn is_alterable(event: &Event, mens: &Mensuration) -> bool {
    match (event.is_note(), event.level()) {
        (true, Some(level)) => is_ternary(mens, level.index() - 3),
        _ => false,
    }
}

/// Is the note divisible into three direct parts? (A breve is perfect as a
/// whole in perfect tempus, but not in imperfect tempus with major
/// prolation, even though it contains ternary units.)
pub fn note_perfect_as_whole(event: &Event, mens: &Mensuration) -> bool {
    match (event.is_note(), event.level()) {
        (true, Some(level)) => is_ternary(mens, level.index() - 4),
        _ => false,
    }
}

/// A level is regularly perfect if it or any of its parts divide into
/// three under the mensuration.
///
/// Unset digits count as binary here, so a note under a bare or
/// incomplete mensuration is never regularly perfect. Sources that leave
/// prolation or tempus out are taken as imperfect, matching `minim_count`.
pub fn regularly_perfect(level: Level, mens: &Mensuration) -> bool {
    let top = level.index() - 3;
    top > 0 && (0..top).any(|i| is_ternary(mens, i))
}

/// Minim counts of the minim, semibreve, breve, long and maxima
pub fn minim_structure(mens: &Mensuration) -> [Minims; 5] {
    let digits = mensuration_digits(mens);
    let mut sizes = [whole(1); 5];
    for i in 0..4 {
        sizes[i + 1] = sizes[i] * digits[i];
    }
    sizes
}

/// Minim counts of every value that can imperfect a note at `level`:
/// anything from a minim up to the note's highest perfect component.
/// Empty if the note has no perfect component.
pub fn imperfecting_units(level: Level, mens: &Mensuration) -> Vec<Minims> {
    let top = level.index() - 4;
    let perfect = (0..=top).rev().find(|&i| is_ternary(mens, i));
    match perfect {
        Some(perfect) => {
            let sizes = minim_structure(mens);
            let mut units = vec![whole(1)];
            units.extend(sizes[1..=perfect as usize].iter().copied());
            units
        }
        None => Vec::new(),
    }
}

/// Can a note at `short_level` imperfect one at `long_level`? True if any
/// division between the two is ternary.
pub fn can_imperfect(short_level: Level, long_level: Level, mens: &Mensuration) -> bool {
    let from = (short_level.index() - 3).max(0);
    (from..long_level.index() - 3).any(|i| is_ternary(mens, i))
}

/// Where an offset falls in the nested mensural units.
///
/// Component 0 is the fraction of a minim; components 1–4 count minims in
/// the semibreve, semibreves in the breve, breves in the long and longs in
/// the maxima; component 5 counts whole maximas. For a note at level `L`
/// the beat within its own unit is component `L - 3`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeatPosition(pub [Minims; 6]);

impl BeatPosition {
    pub fn component(&self, index: usize) -> Option<Minims> {
        self.0.get(index).copied()
    }

    /// Beat (0, 1, 2, …) of the unit a note at `level` divides, read at
    /// `index = level - 3 + shift`
    pub fn beat_at(&self, level: Level, shift: i32) -> Option<i64> {
        let index = level.index() - 3 + shift;
        if index < 0 {
            return None;
        }
        self.component(index as usize).filter(|c| c.is_integer()).map(|c| c.to_integer())
    }

    /// Starts exactly on a breve boundary
    pub fn on_breve_beat(&self) -> bool {
        self.0[..3].iter().all(|c| *c == whole(0))
    }

    /// Breve, long and maxima counters
    pub fn breve_counters(&self) -> &[Minims] {
        &self.0[3..]
    }

    /// Space-separated rendering for annotations
    pub fn to_attribute(&self) -> String {
        self.0
            .iter()
            .map(|c| {
                if c.is_integer() {
                    c.to_integer().to_string()
                } else {
                    format!("{}/{}", c.numer(), c.denom())
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Decompose a block-relative minim offset into a [`BeatPosition`]
pub fn beat_unit_structure(offset: Minims, mens: &Mensuration) -> BeatPosition {
    let digits = mensuration_digits(mens);
    let floor = offset.floor();
    let mut components = [whole(0); 6];
    components[0] = offset - floor;
    let mut remaining = floor.to_integer();
    for (i, digit) in digits.iter().enumerate() {
        components[i + 1] = whole(remaining % digit);
        remaining /= digit;
    }
    components[5] = whole(remaining);
    BeatPosition(components)
}

/// Compare consecutive beat positions at breve level and above. Returns
/// `(on_the_breve_beat, crossed_a_breve_beat)`: the event starts on a breve
/// boundary, or a breve boundary fell inside the previous event.
pub fn breve_boundaries(previous: Option<&BeatPosition>, current: &BeatPosition) -> (bool, bool) {
    let on_beat = current.on_breve_beat();
    let crossed = !on_beat
        && previous.map_or(false, |prev| prev.breve_counters() != current.breve_counters());
    (on_beat, crossed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ElementId, EventKind};

    fn note(level: Level) -> Event {
        Event { id: ElementId(0), kind: EventKind::Note { level, colored: false, quality: None } }
    }

    fn rest(level: Level) -> Event {
        Event { id: ElementId(0), kind: EventKind::Rest { level, loc: None } }
    }

    #[test]
    fn test_minim_is_one_under_unset_mensuration() {
        let mens = Mensuration::unset();
        assert_eq!(minim_count(Level::Minima, &mens, 0), whole(1));
        assert_eq!(minim_count(Level::Semibrevis, &mens, 0), whole(2));
        assert_eq!(mensuration_digits(&mens), [2, 2, 2, 2]);
    }

    #[test]
    fn test_short_values_halve() {
        let mens = Mensuration::from_digits([3, 3, 3, 3]);
        assert_eq!(minim_count(Level::Semiminima, &mens, 0), Minims::new(1, 2));
        assert_eq!(minim_count(Level::Semifusa, &mens, 0), Minims::new(1, 8));
    }

    #[test]
    fn test_minim_count_multiplies_digits() {
        let mens = Mensuration::from_digits([2, 3, 2, 2]);
        assert_eq!(minim_count(Level::Brevis, &mens, 0), whole(6));
        assert_eq!(minim_count(Level::Longa, &mens, 0), whole(12));
        assert_eq!(minim_count(Level::Maxima, &mens, 0), whole(24));
        // displaced: a semibreve read one level up is a breve
        assert_eq!(minim_count(Level::Semibrevis, &mens, 1), whole(6));
        assert_eq!(minim_count(Level::Brevis, &mens, -1), whole(2));
    }

    #[test]
    fn test_first_perfect_level() {
        assert_eq!(first_perfect_level(&Mensuration::from_digits([3, 2, 2, 2])), 3);
        assert_eq!(first_perfect_level(&Mensuration::from_digits([2, 3, 2, 2])), 4);
        assert_eq!(first_perfect_level(&Mensuration::from_digits([2, 2, 2, 2])), NO_PERFECT_LEVEL);
    }

    #[test]
    fn test_alterable_and_perfect_as_whole() {
        let tempus = Mensuration::from_digits([2, 3, 2, 2]);
        assert!(is_alterable(&note(Level::Semibrevis), &tempus));
        assert!(!is_alterable(&rest(Level::Semibrevis), &tempus));
        assert!(!is_alterable(&note(Level::Minima), &tempus));
        assert!(note_perfect_as_whole(&note(Level::Brevis), &tempus));
        assert!(!note_perfect_as_whole(&note(Level::Semibrevis), &tempus));

        let prolation = Mensuration::from_digits([3, 2, 2, 2]);
        assert!(!note_perfect_as_whole(&note(Level::Brevis), &prolation));
        assert!(regularly_perfect(Level::Brevis, &prolation));
        assert!(!regularly_perfect(Level::Minima, &prolation));
        assert!(!regularly_perfect(Level::Longa, &Mensuration::unset()));

        // missing prolation and tempus read as imperfect
        let modus_only = Mensuration::from_digits([0, 0, 3, 2]);
        assert!(!regularly_perfect(Level::Brevis, &modus_only));
        assert!(regularly_perfect(Level::Longa, &modus_only));
    }

    #[test]
    fn test_imperfecting_units() {
        let tempus = Mensuration::from_digits([2, 3, 2, 2]);
        assert_eq!(imperfecting_units(Level::Brevis, &tempus), vec![whole(1), whole(2)]);
        assert_eq!(imperfecting_units(Level::Semibrevis, &tempus), Vec::<Minims>::new());
        let prolation = Mensuration::from_digits([3, 2, 2, 2]);
        assert_eq!(imperfecting_units(Level::Semibrevis, &prolation), vec![whole(1)]);
        let modus = Mensuration::from_digits([2, 2, 3, 2]);
        assert_eq!(
            imperfecting_units(Level::Longa, &modus),
            vec![whole(1), whole(2), whole(4)]
        );
    }

    #[test]
    fn test_can_imperfect() {
        let tempus = Mensuration::from_digits([2, 3, 2, 2]);
        assert!(can_imperfect(Level::Semibrevis, Level::Brevis, &tempus));
        assert!(can_imperfect(Level::Semiminima, Level::Brevis, &tempus));
        assert!(!can_imperfect(Level::Minima, Level::Semibrevis, &tempus));
    }

    #[test]
    fn test_beat_unit_structure() {
        let mens = Mensuration::from_digits([2, 3, 2, 2]);
        // 7 minims = 1 breve (6) + 1 minim
        let pos = beat_unit_structure(whole(7), &mens);
        assert_eq!(pos.0, [whole(0), whole(1), whole(0), whole(1), whole(0), whole(0)]);
        // a minim has no parts; the minim within its semibreve is one up
        assert_eq!(pos.beat_at(Level::Minima, 0), Some(0));
        assert_eq!(pos.beat_at(Level::Minima, 1), Some(1));
        assert_eq!(pos.beat_at(Level::Brevis, 0), Some(0));
        // 4 minims = 2 semibreves of 2: the third semibreve of the first breve
        let pos = beat_unit_structure(whole(4), &mens);
        assert_eq!(pos.0, [whole(0), whole(0), whole(2), whole(0), whole(0), whole(0)]);
        assert_eq!(pos.beat_at(Level::Brevis, 0), Some(2));
        assert_eq!(pos.beat_at(Level::Semibrevis, 1), Some(2));
        let pos = beat_unit_structure(Minims::new(4, 3), &mens);
        assert_eq!(pos.component(0), Some(Minims::new(1, 3)));
        assert_eq!(pos.to_attribute(), "1/3 1 0 0 0 0");
    }

    #[test]
    fn test_breve_boundaries() {
        let mens = Mensuration::from_digits([2, 3, 2, 2]);
        let start = beat_unit_structure(whole(0), &mens);
        let inside = beat_unit_structure(whole(4), &mens);
        let next_breve = beat_unit_structure(whole(6), &mens);
        let past = beat_unit_structure(whole(8), &mens);
        assert_eq!(breve_boundaries(None, &start), (true, false));
        assert_eq!(breve_boundaries(Some(&start), &inside), (false, false));
        assert_eq!(breve_boundaries(Some(&inside), &next_breve), (true, false));
        assert_eq!(breve_boundaries(Some(&inside), &past), (false, true));
    }
}
