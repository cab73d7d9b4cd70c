//! Mensuration signs and proportions
//!
//! A mensuration fixes, for each of the four nested levels from prolation up
//! to modus maior, whether a note divides into two or three of the next
//! shorter value. A proportion scales every duration that follows it.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use super::minims::{whole, Minims};

/// Binary or ternary division at one mensural level
#[repr(u8)]
#[derive(Serialize_repr, Deserialize_repr, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Division {
    Binary = 2,
    Ternary = 3,
}

impl Division {
    /// Division from a written digit (`2` or `3`)
    pub fn from_digit(digit: u32) -> Option<Division> {
        match digit {
            2 => Some(Division::Binary),
            3 => Some(Division::Ternary),
            _ => None,
        }
    }

    pub fn digit(self) -> i64 {
        self as i64
    }
}

/// The four mensural flags, from prolation (minims per semibreve) up to
/// modus maior (longs per maxima). Unset flags are inherited or defaulted.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Mensuration {
    pub prolatio: Option<Division>,
    pub tempus: Option<Division>,
    pub modus_minor: Option<Division>,
    pub modus_maior: Option<Division>,
}

impl Mensuration {
    /// A mensuration with every flag unset
    pub fn unset() -> Self {
        Self::default()
    }

    /// Build from `[prolatio, tempus, modus minor, modus maior]` digits.
    /// Anything other than 2 or 3 leaves the flag unset.
    pub fn from_digits(digits: [u32; 4]) -> Self {
        Self {
            prolatio: Division::from_digit(digits[0]),
            tempus: Division::from_digit(digits[1]),
            modus_minor: Division::from_digit(digits[2]),
            modus_maior: Division::from_digit(digits[3]),
        }
    }

    /// Flags in order prolatio, tempus, modus minor, modus maior
    pub fn flags(&self) -> [Option<Division>; 4] {
        [self.prolatio, self.tempus, self.modus_minor, self.modus_maior]
    }

    /// Set the flag at `index` (0 = prolatio … 3 = modus maior)
    pub fn set_flag(&mut self, index: usize, division: Division) {
        match index {
            0 => self.prolatio = Some(division),
            1 => self.tempus = Some(division),
            2 => self.modus_minor = Some(division),
            3 => self.modus_maior = Some(division),
            _ => log::warn!("Ignoring mensuration flag index {}", index),
        }
    }

    /// Modus minor and modus maior are assumed binary unless the music
    /// shows otherwise.
    pub fn default_modi(&mut self) {
        if self.modus_minor.is_none() {
            self.modus_minor = Some(Division::Binary);
        }
        if self.modus_maior.is_none() {
            self.modus_maior = Some(Division::Binary);
        }
    }

    /// True if prolation or tempus is unset (these are never defaulted
    /// silently)
    pub fn is_incomplete(&self) -> bool {
        self.prolatio.is_none() || self.tempus.is_none()
    }
}

/// A proportion sign: `num` notes in the time of `numbase`
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Proportion {
    pub num: Option<u32>,
    pub numbase: Option<u32>,
}

impl Proportion {
    pub fn new(num: u32, numbase: u32) -> Self {
        Self {
            num: Some(num),
            numbase: Some(numbase),
        }
    }

    /// Factor applied to every duration governed by this proportion
    /// (`numbase / num`). A missing side counts as 1, and zero values are
    /// ignored, so a proportion with neither value scales by 1.
    pub fn multiplier(&self) -> Minims {
        let num = self.num.filter(|n| *n > 0).unwrap_or(1) as i64;
        let numbase = self.numbase.filter(|n| *n > 0).unwrap_or(1) as i64;
        Minims::new(numbase, num)
    }

    pub fn is_complete(&self) -> bool {
        matches!((self.num, self.numbase), (Some(n), Some(b)) if n > 0 && b > 0)
    }
}

/// Default multiplier when no proportion applies
pub fn unit_multiplier() -> Minims {
    whole(1)
}
