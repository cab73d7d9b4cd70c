//! Duration ledger
//!
//! Inferred values live in a side table keyed by element identity, apart
//! from the immutable facts the source states about each event. A duration
//! is written at most once: a second write with the same value is a no-op,
//! a second write with a different value is a logic error that is logged,
//! recorded as a [`LedgerConflict`], and otherwise ignored.
//!
//! Timing fields (offsets, beat positions, breve flags) are derived data and
//! are rewritten freely each time start times are recomputed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::mensuration::{
    beat_unit_structure, breve_boundaries, minim_count, regularly_perfect, BeatPosition,
};
use crate::models::minims::whole;
use crate::models::{ElementId, Event, GivenDuration, Mensuration, Minims};

/// How a resolved duration relates to the note's face value
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DurationQuality {
    Perfect,
    Imperfect,
    Altered,
    /// Reduced by coloration
    Colored,
    /// Lengthened by a dot of augmentation
    Dotted,
    /// Face value, nothing applied
    Plain,
    Unresolved,
}

impl DurationQuality {
    /// MEI `@dur.quality` value, where there is one
    pub fn mei_value(self) -> Option<&'static str> {
        match self {
            DurationQuality::Perfect => Some("perfecta"),
            DurationQuality::Imperfect => Some("imperfecta"),
            DurationQuality::Altered => Some("altera"),
            _ => None,
        }
    }

    pub fn from_mei_value(value: &str) -> Option<Self> {
        match value {
            "perfecta" => Some(DurationQuality::Perfect),
            "imperfecta" => Some(DurationQuality::Imperfect),
            "altera" => Some(DurationQuality::Altered),
            _ => None,
        }
    }
}

/// Citation of the rule that resolved an event
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
    #[serde(rename = "rest")]
    Rest,
    #[serde(rename = "coloration")]
    Coloration,
    /// Duration recorded in the source before this run
    #[serde(rename = "given")]
    Given,
    /// Quality written explicitly on the note
    #[serde(rename = "explicit")]
    Explicit,
    #[serde(rename = "I.2.a.PerfDot")]
    PerfectionByDot,
    #[serde(rename = "simpleDot")]
    SimpleDot,
    #[serde(rename = "unalterableImperfect")]
    UnalterableImperfect,
    #[serde(rename = "unalteredImperfectAfterLarger")]
    UnalteredImperfectAfterLarger,
    #[serde(rename = "unalteredImperfect")]
    UnalteredImperfect,
    #[serde(rename = "A.2b")]
    AlterationBeforeLarger,
    #[serde(rename = "I.2.b.antesim")]
    AnteSimile,
    #[serde(rename = "I.3")]
    NothingFollows,
    #[serde(rename = "I.4a")]
    ImperfectionByUnit,
    #[serde(rename = "I.4b")]
    ImperfectionByLargest,
    #[serde(rename = "I.4bi")]
    ImperfectionByBareMinimum,
    #[serde(rename = "I.4bii")]
    ImperfectionByApproximateMinimum,
    #[serde(rename = "I.5")]
    PerfectTrustingAlteration,
    #[serde(rename = "I.5-add")]
    ImperfectionAdded,
    #[serde(rename = "I.5-literalunits")]
    PerfectLiteralUnits,
    #[serde(rename = "I.6")]
    PerfectWholeUnits,
    #[serde(rename = "I.6-literalunits")]
    PerfectLiteralAlteration,
    #[serde(rename = "I.8")]
    SecondBeatImperfection,
    #[serde(rename = "I.9a")]
    ImperfectionFromAhead,
    #[serde(rename = "I.9b")]
    ImperfectionFromBehind,
    #[serde(rename = "A.1")]
    SecondBeatAlteration,
    #[serde(rename = "A.2")]
    AlterationFillsUnit,
    #[serde(rename = "A.xxx")]
    UnalteredAmbiguous,
    #[serde(rename = "A.xxz")]
    UnalteredWindowTooLong,
}

impl Rule {
    pub const ALL: [Rule; 28] = [
        Rule::Rest,
        Rule::Coloration,
        Rule::Given,
        Rule::Explicit,
        Rule::PerfectionByDot,
        Rule::SimpleDot,
        Rule::UnalterableImperfect,
        Rule::UnalteredImperfectAfterLarger,
        Rule::UnalteredImperfect,
        Rule::AlterationBeforeLarger,
        Rule::AnteSimile,
        Rule::NothingFollows,
        Rule::ImperfectionByUnit,
        Rule::ImperfectionByLargest,
        Rule::ImperfectionByBareMinimum,
        Rule::ImperfectionByApproximateMinimum,
        Rule::PerfectTrustingAlteration,
        Rule::ImperfectionAdded,
        Rule::PerfectLiteralUnits,
        Rule::PerfectWholeUnits,
        Rule::PerfectLiteralAlteration,
        Rule::SecondBeatImperfection,
        Rule::ImperfectionFromAhead,
        Rule::ImperfectionFromBehind,
        Rule::SecondBeatAlteration,
        Rule::AlterationFillsUnit,
        Rule::UnalteredAmbiguous,
        Rule::UnalteredWindowTooLong,
    ];

    /// Rule cited by a `@rule` value
    pub fn from_code(code: &str) -> Option<Rule> {
        Rule::ALL.into_iter().find(|rule| rule.code() == code)
    }

    /// Citation code as written to `@rule`
    pub fn code(self) -> &'static str {
        match self {
            Rule::Rest => "rest",
            Rule::Coloration => "coloration",
            Rule::Given => "given",
            Rule::Explicit => "explicit",
            Rule::PerfectionByDot => "I.2.a.PerfDot",
            Rule::SimpleDot => "simpleDot",
            Rule::UnalterableImperfect => "unalterableImperfect",
            Rule::UnalteredImperfectAfterLarger => "unalteredImperfectAfterLarger",
            Rule::UnalteredImperfect => "unalteredImperfect",
            Rule::AlterationBeforeLarger => "A.2b",
            Rule::AnteSimile => "I.2.b.antesim",
            Rule::NothingFollows => "I.3",
            Rule::ImperfectionByUnit => "I.4a",
            Rule::ImperfectionByLargest => "I.4b",
            Rule::ImperfectionByBareMinimum => "I.4bi",
            Rule::ImperfectionByApproximateMinimum => "I.4bii",
            Rule::PerfectTrustingAlteration => "I.5",
            Rule::ImperfectionAdded => "I.5-add",
            Rule::PerfectLiteralUnits => "I.5-literalunits",
            Rule::PerfectWholeUnits => "I.6",
            Rule::PerfectLiteralAlteration => "I.6-literalunits",
            Rule::SecondBeatImperfection => "I.8",
            Rule::ImperfectionFromAhead => "I.9a",
            Rule::ImperfectionFromBehind => "I.9b",
            Rule::SecondBeatAlteration => "A.1",
            Rule::AlterationFillsUnit => "A.2",
            Rule::UnalteredAmbiguous => "A.xxx",
            Rule::UnalteredWindowTooLong => "A.xxz",
        }
    }

    /// Quality recorded when the rule writes a duration through
    /// [`Ledger::write_with_rule`]
    pub fn quality(self) -> DurationQuality {
        match self {
            Rule::Coloration => DurationQuality::Colored,
            Rule::SimpleDot => DurationQuality::Dotted,
            Rule::PerfectionByDot
            | Rule::AnteSimile
            | Rule::NothingFollows
            | Rule::PerfectTrustingAlteration
            | Rule::PerfectLiteralUnits
            | Rule::PerfectWholeUnits
            | Rule::PerfectLiteralAlteration => DurationQuality::Perfect,
            Rule::ImperfectionByUnit
            | Rule::ImperfectionByLargest
            | Rule::ImperfectionByBareMinimum
            | Rule::ImperfectionByApproximateMinimum
            | Rule::ImperfectionAdded
            | Rule::SecondBeatImperfection
            | Rule::ImperfectionFromAhead
            | Rule::ImperfectionFromBehind => DurationQuality::Imperfect,
            Rule::AlterationBeforeLarger
            | Rule::SecondBeatAlteration
            | Rule::AlterationFillsUnit => DurationQuality::Altered,
            Rule::Rest
            | Rule::Given
            | Rule::Explicit
            | Rule::UnalterableImperfect
            | Rule::UnalteredImperfectAfterLarger
            | Rule::UnalteredImperfect
            | Rule::UnalteredAmbiguous
            | Rule::UnalteredWindowTooLong => DurationQuality::Plain,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Everything inferred about one event
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct EventRecord {
    /// Intermediate (unscaled) duration in minims
    pub duration: Option<Minims>,
    /// Duration after the block's proportion is applied
    pub scaled: Option<Minims>,
    pub quality: Option<DurationQuality>,
    pub rule: Option<Rule>,
    /// MEI-style ratio: `num` notes in the time of `numbase`, relative to
    /// the face value
    pub num: Option<i64>,
    pub numbase: Option<i64>,
    /// Face value, recorded by rules that resolve from estimates
    pub default_minims: Option<Minims>,
    /// Offset from the start of the event's block
    pub block_from: Option<Minims>,
    /// Offset from the start of the voice
    pub starts_at: Option<Minims>,
    pub beat_position: Option<BeatPosition>,
    pub on_the_breve_beat: bool,
    pub crossed_a_breve_beat: bool,
    pub comment: Option<String>,
}

impl EventRecord {
    /// Quality, reporting unresolved events as such
    pub fn quality_class(&self) -> DurationQuality {
        match (self.duration, self.quality) {
            (None, _) => DurationQuality::Unresolved,
            (Some(_), Some(quality)) => quality,
            (Some(_), None) => DurationQuality::Plain,
        }
    }
}

/// A rejected attempt to change an already written duration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LedgerConflict {
    pub element: ElementId,
    pub existing: Minims,
    pub attempted: Minims,
    pub rule: Option<Rule>,
}

/// Result of a duration write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The same value was already there
    Unchanged,
    /// A different value was already there and was kept
    Conflict,
    /// The write made no sense (a dot, or a non-positive duration)
    Rejected,
}

impl WriteOutcome {
    pub fn is_written(self) -> bool {
        self == WriteOutcome::Written
    }
}

/// Partial knowledge about the total duration of a run of events
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct WindowDuration {
    /// Exact sum, if every note and rest in the window is resolved
    pub definite: Option<Minims>,
    /// Resolved durations only
    pub bare_minimum: Minims,
    /// Resolved durations, plus a third of the face value for the rest
    pub approximate_minimum: Minims,
    /// Resolved durations, plus the full face value for the rest
    pub approximation: Minims,
}

/// The inferred-results side table
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Ledger {
    records: BTreeMap<ElementId, EventRecord>,
    #[serde(default)]
    conflicts: Vec<LedgerConflict>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: ElementId) -> Option<&EventRecord> {
        self.records.get(&id)
    }

    fn entry(&mut self, id: ElementId) -> &mut EventRecord {
        self.records.entry(id).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ElementId, &EventRecord)> {
        self.records.iter()
    }

    pub fn conflicts(&self) -> &[LedgerConflict] {
        &self.conflicts
    }

    pub fn read_duration(&self, id: ElementId) -> Option<Minims> {
        self.records.get(&id).and_then(|r| r.duration)
    }

    pub fn is_resolved(&self, id: ElementId) -> bool {
        self.read_duration(id).is_some()
    }

    pub fn read_scaled(&self, id: ElementId) -> Option<Minims> {
        self.records.get(&id).and_then(|r| r.scaled)
    }

    pub fn block_from(&self, id: ElementId) -> Option<Minims> {
        self.records.get(&id).and_then(|r| r.block_from)
    }

    pub fn starts_at(&self, id: ElementId) -> Option<Minims> {
        self.records.get(&id).and_then(|r| r.starts_at)
    }

    pub fn beat_position(&self, id: ElementId) -> Option<BeatPosition> {
        self.records.get(&id).and_then(|r| r.beat_position)
    }

    pub fn on_the_breve_beat(&self, id: ElementId) -> bool {
        self.records.get(&id).map_or(false, |r| r.on_the_breve_beat)
    }

    pub fn rule(&self, id: ElementId) -> Option<Rule> {
        self.records.get(&id).and_then(|r| r.rule)
    }

    pub fn quality(&self, id: ElementId) -> DurationQuality {
        self.records
            .get(&id)
            .map_or(DurationQuality::Unresolved, EventRecord::quality_class)
    }

    /// The single place durations are written
    fn resolve(
        &mut self,
        id: ElementId,
        duration: Minims,
        rule: Option<Rule>,
        quality: DurationQuality,
        ratio: Option<(i64, i64)>,
    ) -> WriteOutcome {
        if duration <= whole(0) {
            log::error!("Refusing to write duration {} to {:?} ({:?})", duration, id, rule);
            return WriteOutcome::Rejected;
        }
        let record = self.entry(id);
        match record.duration {
            Some(existing) if existing == duration => WriteOutcome::Unchanged,
            Some(existing) => {
                log::error!(
                    "Conflicting duration for {:?}: have {}, {:?} wants {}",
                    id,
                    existing,
                    rule,
                    duration
                );
                self.conflicts.push(LedgerConflict {
                    element: id,
                    existing,
                    attempted: duration,
                    rule,
                });
                WriteOutcome::Conflict
            }
            None => {
                record.duration = Some(duration);
                record.rule = rule;
                record.quality = Some(quality);
                if let Some((num, numbase)) = ratio {
                    record.num = Some(num);
                    record.numbase = Some(numbase);
                }
                WriteOutcome::Written
            }
        }
    }

    /// Set an intermediate duration with no rule attached
    pub fn write_duration(&mut self, id: ElementId, minims: Minims) -> WriteOutcome {
        self.resolve(id, minims, None, DurationQuality::Plain, None)
    }

    /// Seed a duration recorded in the source, keeping the citation, quality
    /// and ratio written beside it. A missing or unknown rule code is cited
    /// as [`Rule::Given`].
    pub fn write_given(&mut self, id: ElementId, given: &GivenDuration) -> WriteOutcome {
        let rule = given
            .rule
            .as_deref()
            .and_then(Rule::from_code)
            .unwrap_or(Rule::Given);
        let quality = given
            .quality
            .as_deref()
            .and_then(DurationQuality::from_mei_value)
            .unwrap_or_else(|| rule.quality());
        let outcome = self.resolve(id, given.minims, Some(rule), quality, given.num.zip(given.numbase));
        if outcome.is_written() {
            let record = self.entry(id);
            record.default_minims = given.default_minims;
            record.comment = given.comment.clone();
        }
        outcome
    }

    /// Face value scaled by `numerator / denominator`, and by 1.5 when a
    /// dot of augmentation follows. The combined factor is recorded as
    /// `num`/`numbase` when it is not 1.
    pub fn write_with_rule(
        &mut self,
        event: &Event,
        mens: &Mensuration,
        rule: Rule,
        augmentation_dot: bool,
        numerator: i64,
        denominator: i64,
    ) -> WriteOutcome {
        let Some(level) = event.level() else {
            return WriteOutcome::Rejected;
        };
        let mut factor = Minims::new(numerator, denominator);
        if augmentation_dot {
            factor *= Minims::new(3, 2);
        }
        let duration = minim_count(level, mens, 0) * factor;
        let ratio = (factor != whole(1)).then(|| (*factor.denom(), *factor.numer()));
        let quality = match rule.quality() {
            DurationQuality::Plain if augmentation_dot => DurationQuality::Dotted,
            quality => quality,
        };
        self.resolve(event.id, duration, Some(rule), quality, ratio)
    }

    /// Subtract a third of the face value
    pub fn write_simple_imperfection(
        &mut self,
        event: &Event,
        mens: &Mensuration,
        rule: Rule,
    ) -> WriteOutcome {
        let Some(level) = event.level() else {
            return WriteOutcome::Rejected;
        };
        let duration = minim_count(level, mens, 0) * Minims::new(2, 3);
        self.resolve(event.id, duration, Some(rule), DurationQuality::Imperfect, Some((3, 2)))
    }

    /// Subtract `reduce_by` minims from the face value. The recorded ratio
    /// is the face value over the result, in lowest terms.
    pub fn write_imperfection(
        &mut self,
        event: &Event,
        mens: &Mensuration,
        reduce_by: Minims,
        rule: Rule,
        record_default_minims: bool,
    ) -> WriteOutcome {
        let Some(level) = event.level() else {
            return WriteOutcome::Rejected;
        };
        let default = minim_count(level, mens, 0);
        let duration = default - reduce_by;
        if duration <= whole(0) {
            log::error!(
                "Imperfection of {:?} by {} leaves nothing of {}",
                event.id,
                reduce_by,
                default
            );
            return WriteOutcome::Rejected;
        }
        let ratio = default / duration;
        let outcome = self.resolve(
            event.id,
            duration,
            Some(rule),
            DurationQuality::Imperfect,
            Some((*ratio.numer(), *ratio.denom())),
        );
        if outcome.is_written() && record_default_minims {
            self.entry(event.id).default_minims = Some(default);
        }
        outcome
    }

    /// Double the face value
    pub fn write_alteration(&mut self, event: &Event, mens: &Mensuration, rule: Rule) -> WriteOutcome {
        let Some(level) = event.level() else {
            return WriteOutcome::Rejected;
        };
        let duration = minim_count(level, mens, 0) * 2;
        self.resolve(event.id, duration, Some(rule), DurationQuality::Altered, Some((1, 2)))
    }

    /// Face value of a perfect note. A note that is not regularly perfect
    /// under the mensuration gets a 2:3 ratio recorded.
    pub fn write_perfection(
        &mut self,
        event: &Event,
        mens: &Mensuration,
        rule: Rule,
        record_default_minims: bool,
    ) -> WriteOutcome {
        let Some(level) = event.level() else {
            return WriteOutcome::Rejected;
        };
        let default = minim_count(level, mens, 0);
        let ratio = (!regularly_perfect(level, mens)).then_some((2, 3));
        let outcome = self.resolve(event.id, default, Some(rule), DurationQuality::Perfect, ratio);
        if outcome.is_written() && record_default_minims {
            self.entry(event.id).default_minims = Some(default);
        }
        outcome
    }

    /// Plain face value under a given rule
    pub fn write_plain(&mut self, event: &Event, mens: &Mensuration, rule: Rule) -> WriteOutcome {
        let Some(level) = event.level() else {
            return WriteOutcome::Rejected;
        };
        self.resolve(event.id, minim_count(level, mens, 0), Some(rule), DurationQuality::Plain, None)
    }

    pub fn write_comment(&mut self, id: ElementId, comment: impl Into<String>) {
        self.entry(id).comment = Some(comment.into());
    }

    /// Aggregate what is known about the notes and rests in `events`
    pub fn window_duration(&self, events: &[Event], mens: &Mensuration) -> WindowDuration {
        let zero = whole(0);
        let mut window = WindowDuration {
            definite: Some(zero),
            bare_minimum: zero,
            approximate_minimum: zero,
            approximation: zero,
        };
        for event in events {
            let Some(level) = event.level() else {
                continue;
            };
            match self.read_duration(event.id) {
                Some(duration) => {
                    window.definite = window.definite.map(|d| d + duration);
                    window.bare_minimum += duration;
                    window.approximate_minimum += duration;
                    window.approximation += duration;
                }
                None => {
                    let face = minim_count(level, mens, 0);
                    window.definite = None;
                    window.approximate_minimum += face / 3;
                    window.approximation += face;
                }
            }
        }
        window
    }

    /// Record block- and voice-relative start offsets
    pub fn set_starts_at(&mut self, id: ElementId, block_from: Minims, starts_at: Option<Minims>) {
        let record = self.entry(id);
        record.block_from = Some(block_from);
        record.starts_at = starts_at;
    }

    /// Forget derived timing (used before start times are recomputed)
    pub fn clear_timing(&mut self, id: ElementId) {
        if let Some(record) = self.records.get_mut(&id) {
            record.block_from = None;
            record.starts_at = None;
            record.beat_position = None;
            record.on_the_breve_beat = false;
            record.crossed_a_breve_beat = false;
        }
    }

    /// Derive and store the beat position of an event from its block offset
    pub fn set_beat_position(
        &mut self,
        id: ElementId,
        block_from: Minims,
        mens: &Mensuration,
    ) -> BeatPosition {
        let position = beat_unit_structure(block_from, mens);
        self.entry(id).beat_position = Some(position);
        position
    }

    /// Store `onTheBreveBeat` / `crossedABreveBeat` by comparing with the
    /// previous event's beat position
    pub fn set_breve_boundary_flags(
        &mut self,
        id: ElementId,
        previous: Option<&BeatPosition>,
        current: &BeatPosition,
    ) {
        let (on_beat, crossed) = breve_boundaries(previous, current);
        let record = self.entry(id);
        record.on_the_breve_beat = on_beat;
        record.crossed_a_breve_beat = crossed;
    }

    pub fn set_scaled(&mut self, id: ElementId, scaled: Minims) {
        self.entry(id).scaled = Some(scaled);
    }

    /// Number of `ids` still lacking a duration
    pub fn unresolved_count(&self, ids: impl IntoIterator<Item = ElementId>) -> usize {
        ids.into_iter().filter(|id| !self.is_resolved(*id)).count()
    }
}
