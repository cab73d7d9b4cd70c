//! Mensural note levels
//!
//! Notes and rests are written at one of eight levels, from the semifusa
//! (shortest) to the maxima (longest). The integer value of each level is
//! used throughout the interpreter as an index into mensuration digits.

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Notational level of a note or rest (semifusa=0 … maxima=7)
#[repr(u8)]
#[derive(Serialize_repr, Deserialize_repr, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Semifusa = 0,
    Fusa = 1,
    Semiminima = 2,
    Minima = 3,
    Semibrevis = 4,
    Brevis = 5,
    Longa = 6,
    Maxima = 7,
}

impl Level {
    pub const ALL: [Level; 8] = [
        Level::Semifusa,
        Level::Fusa,
        Level::Semiminima,
        Level::Minima,
        Level::Semibrevis,
        Level::Brevis,
        Level::Longa,
        Level::Maxima,
    ];

    /// Integer value (semifusa=0, minima=3, maxima=7)
    pub fn index(self) -> i32 {
        self as i32
    }

    /// Level from its integer value
    pub fn from_index(index: i32) -> Option<Level> {
        if (0..8).contains(&index) {
            Some(Level::ALL[index as usize])
        } else {
            None
        }
    }

    /// The next longer level, if any
    pub fn next_longer(self) -> Option<Level> {
        Level::from_index(self.index() + 1)
    }

    /// The next shorter level, if any
    pub fn next_shorter(self) -> Option<Level> {
        Level::from_index(self.index() - 1)
    }

    /// Parse an MEI `@dur` value.
    ///
    /// The legacy rest values `2B` and `3B` (two- and three-breve rests) both
    /// denote a longa rest.
    pub fn parse(dur: &str) -> Option<Level> {
        match dur {
            "semifusa" => Some(Level::Semifusa),
            "fusa" => Some(Level::Fusa),
            "semiminima" => Some(Level::Semiminima),
            "minima" => Some(Level::Minima),
            "semibrevis" => Some(Level::Semibrevis),
            "brevis" => Some(Level::Brevis),
            "longa" | "2B" | "3B" => Some(Level::Longa),
            "maxima" => Some(Level::Maxima),
            _ => None,
        }
    }

    /// MEI `@dur` spelling
    pub fn mei_name(self) -> &'static str {
        match self {
            Level::Semifusa => "semifusa",
            Level::Fusa => "fusa",
            Level::Semiminima => "semiminima",
            Level::Minima => "minima",
            Level::Semibrevis => "semibrevis",
            Level::Brevis => "brevis",
            Level::Longa => "longa",
            Level::Maxima => "maxima",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip_names() {
        for level in Level::ALL {
            assert_eq!(Level::parse(level.mei_name()), Some(level));
        }
    }

    #[test]
    fn test_legacy_rest_durations_are_longa() {
        assert_eq!(Level::parse("2B"), Some(Level::Longa));
        assert_eq!(Level::parse("3B"), Some(Level::Longa));
        assert_eq!(Level::parse("quarter"), None);
    }

    #[test]
    fn test_neighbours() {
        assert_eq!(Level::Minima.next_longer(), Some(Level::Semibrevis));
        assert_eq!(Level::Maxima.next_longer(), None);
        assert_eq!(Level::Semifusa.next_shorter(), None);
        assert_eq!(Level::Brevis.index(), 5);
    }
}
