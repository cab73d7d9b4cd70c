//! Voice elements
//!
//! A voice is a flat stream of elements in document order. Notes, rests and
//! dots are the *events* whose durations the interpreter infers; mensuration
//! and proportion signs change the context for the events that follow them;
//! bar lines are editorial markers (inserted by post-processing, ignored by
//! the rule passes).

use serde::{Deserialize, Serialize};

use super::level::Level;
use super::mensuration::{Mensuration, Proportion};
use super::minims::Minims;

/// Stable identity of an element within a [`Document`](super::Document)
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(pub u32);

/// Quality written explicitly in the source (MEI `@quality`)
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotatedQuality {
    Perfect,
    Imperfect,
    Altered,
}

impl NotatedQuality {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "p" => Some(NotatedQuality::Perfect),
            "i" | "immediata" | "remota" => Some(NotatedQuality::Imperfect),
            "a" => Some(NotatedQuality::Altered),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Note {
    pub level: Level,
    #[serde(default)]
    pub colored: bool,
    #[serde(default)]
    pub quality: Option<NotatedQuality>,
    /// Duration already recorded for this note by an earlier run or a
    /// reviewer; seeds the ledger instead of being inferred again.
    #[serde(default)]
    pub given_duration: Option<GivenDuration>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Rest {
    pub level: Level,
    /// Vertical staff position; differing positions on adjacent rests group
    /// them like a division dot.
    #[serde(default)]
    pub loc: Option<i32>,
    /// The rest is notated as a perfect long (`quality="p"` or legacy `3B`)
    #[serde(default)]
    pub perfect_longa: bool,
    /// Maxima rest flags stating which levels it shows as perfect
    #[serde(default)]
    pub maxima_is_perfect: bool,
    #[serde(default)]
    pub longa_is_perfect: bool,
    #[serde(default)]
    pub given_duration: Option<GivenDuration>,
}

/// A duration the source already states, together with the citation an
/// earlier interpretation recorded next to it. Rule and quality stay in
/// their written form; the ledger decides what they mean.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GivenDuration {
    pub minims: Minims,
    #[serde(default)]
    pub rule: Option<String>,
    /// `@dur.quality` (`perfecta`, `imperfecta`, `altera`)
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub num: Option<i64>,
    #[serde(default)]
    pub numbase: Option<i64>,
    #[serde(default)]
    pub default_minims: Option<Minims>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl GivenDuration {
    /// A bare duration with nothing recorded beside it
    pub fn new(minims: Minims) -> Self {
        Self {
            minims,
            rule: None,
            quality: None,
            num: None,
            numbase: None,
            default_minims: None,
            comment: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DotForm {
    /// Dot of augmentation: lengthens the preceding note by half
    Aug,
    /// Dot of division: separates mensural units
    Div,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dot {
    pub form: DotForm,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BarLineForm {
    Dotted,
    Single,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarLine {
    pub form: BarLineForm,
}

/// Everything that can appear in a voice stream
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Note(Note),
    Rest(Rest),
    Dot(Dot),
    Mensuration(Mensuration),
    Proportion(Proportion),
    BarLine(BarLine),
}

impl Element {
    /// Notes, rests and dots (the things a block is made of)
    pub fn is_event(&self) -> bool {
        matches!(self, Element::Note(_) | Element::Rest(_) | Element::Dot(_))
    }

    /// Mensuration and proportion signs
    pub fn is_context_marker(&self) -> bool {
        matches!(self, Element::Mensuration(_) | Element::Proportion(_))
    }
}

/// An element with its identity in the document
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VoiceItem {
    pub id: ElementId,
    /// `xml:id` of the source element, when there was one
    #[serde(default)]
    pub xml_id: Option<String>,
    /// Document-order ordinal of the source element, used to write results
    /// back to the same element
    #[serde(default)]
    pub source_index: Option<usize>,
    pub element: Element,
}

/// Kind-specific view of an event used by the rule passes
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Note { level: Level, colored: bool, quality: Option<NotatedQuality> },
    Rest { level: Level, loc: Option<i32> },
    Dot { form: DotForm },
}

/// A note, rest or dot as seen by the interpreter: identity plus the
/// immutable facts the source states about it
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub id: ElementId,
    pub kind: EventKind,
}

impl Event {
    /// View of an element, if it is an event
    pub fn from_item(item: &VoiceItem) -> Option<Event> {
        let kind = match &item.element {
            Element::Note(note) => EventKind::Note {
                level: note.level,
                colored: note.colored,
                quality: note.quality,
            },
            Element::Rest(rest) => EventKind::Rest { level: rest.level, loc: rest.loc },
            Element::Dot(dot) => EventKind::Dot { form: dot.form },
            _ => return None,
        };
        Some(Event { id: item.id, kind })
    }

    pub fn is_note(&self) -> bool {
        matches!(self.kind, EventKind::Note { .. })
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, EventKind::Rest { .. })
    }

    pub fn is_note_or_rest(&self) -> bool {
        self.is_note() || self.is_rest()
    }

    pub fn is_colored(&self) -> bool {
        matches!(self.kind, EventKind::Note { colored: true, .. })
    }

    pub fn is_aug_dot(&self) -> bool {
        matches!(self.kind, EventKind::Dot { form: DotForm::Aug })
    }

    /// Any dot that is not a dot of augmentation
    pub fn is_division_dot(&self) -> bool {
        matches!(self.kind, EventKind::Dot { form: DotForm::Div })
    }

    /// Level of a note or rest; dots have none
    pub fn level(&self) -> Option<Level> {
        match self.kind {
            EventKind::Note { level, .. } | EventKind::Rest { level, .. } => Some(level),
            EventKind::Dot { .. } => None,
        }
    }

    /// Level as an integer, with -1 for dots so that comparisons against
    /// real levels are always false in the "longer than" direction
    pub fn level_index(&self) -> i32 {
        self.level().map(Level::index).unwrap_or(-1)
    }

    /// True for a note or rest strictly longer than `level`
    pub fn is_longer_than(&self, level: Level) -> bool {
        self.level().map_or(false, |l| l > level)
    }

    pub fn loc(&self) -> Option<i32> {
        match self.kind {
            EventKind::Rest { loc, .. } => loc,
            _ => None,
        }
    }

    pub fn notated_quality(&self) -> Option<NotatedQuality> {
        match self.kind {
            EventKind::Note { quality, .. } => quality,
            _ => None,
        }
    }
}
