// Spelled pitches: letter names, accidentals, octaves and MIDI numbers.
//
// Harmony is compared by pitch-class *name* (C# and Db are different names),
// so every pitch carries its spelling. Spellings live on the line of fifths
// (... Bb F C G D A E B F# ...): one step right is a perfect fifth up, seven
// steps right adds a sharp. Scales, key signatures and related-key
// transposition in key.rs are plain arithmetic on that line.
//
// MIDI input carries no spelling, so `PitchName::spell` picks the spelling of
// a pitch class nearest a chosen point on the line of fifths. Callers pick
// that point from the key context (`Key::spell`).
//
// JSON form of a pitch is a compact string ("C#4", "Bb3"), handled through
// serde's try_from/into on String.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Diatonic letter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    pub const ALL: [Step; 7] = [Step::C, Step::D, Step::E, Step::F, Step::G, Step::A, Step::B];

    /// Pitch class of the unaltered letter (C = 0).
    pub fn natural_pc(self) -> u8 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }

    /// Position of the unaltered letter on the line of fifths, C = 0.
    fn fifths(self) -> i32 {
        match self {
            Step::F => -1,
            Step::C => 0,
            Step::G => 1,
            Step::D => 2,
            Step::A => 3,
            Step::E => 4,
            Step::B => 5,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Step::C => 'C',
            Step::D => 'D',
            Step::E => 'E',
            Step::F => 'F',
            Step::G => 'G',
            Step::A => 'A',
            Step::B => 'B',
        }
    }

    pub fn from_letter(c: char) -> Option<Step> {
        match c.to_ascii_uppercase() {
            'C' => Some(Step::C),
            'D' => Some(Step::D),
            'E' => Some(Step::E),
            'F' => Some(Step::F),
            'G' => Some(Step::G),
            'A' => Some(Step::A),
            'B' => Some(Step::B),
            _ => None,
        }
    }
}

/// Letters in line-of-fifths order, starting one fifth below C.
const FIFTHS_ORDER: [Step; 7] = [Step::F, Step::C, Step::G, Step::D, Step::A, Step::E, Step::B];

/// Returned when a pitch or pitch name string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid pitch: {0:?}")]
pub struct PitchParseError(pub String);

/// A spelled pitch class: letter plus alteration (sharps positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PitchName {
    pub step: Step,
    pub alter: i8,
}

impl PitchName {
    pub const fn new(step: Step, alter: i8) -> Self {
        PitchName { step, alter }
    }

    pub const fn natural(step: Step) -> Self {
        PitchName { step, alter: 0 }
    }

    /// Octave-independent pitch class, 0-11.
    pub fn pitch_class(self) -> u8 {
        (self.step.natural_pc() as i32 + self.alter as i32).rem_euclid(12) as u8
    }

    /// Coordinate on the line of fifths (C = 0, G = 1, F = -1, F# = 6).
    pub fn fifths(self) -> i32 {
        self.step.fifths() + 7 * self.alter as i32
    }

    pub fn from_fifths(fifths: i32) -> Self {
        let shifted = fifths + 1;
        PitchName {
            step: FIFTHS_ORDER[shifted.rem_euclid(7) as usize],
            alter: shifted.div_euclid(7) as i8,
        }
    }

    /// Move `n` perfect fifths up (negative = down), keeping a correct spelling.
    pub fn transpose_fifths(self, n: i32) -> Self {
        PitchName::from_fifths(self.fifths() + n)
    }

    /// Spell pitch class `pc` with the name nearest `center` on the line of
    /// fifths. Equidistant candidates resolve to the sharper spelling.
    pub fn spell(pc: u8, center: i32) -> Self {
        // 7 is its own inverse mod 12: this is pc's fifths coordinate in 0..12.
        let base = (pc as i32 * 7).rem_euclid(12);
        let k = (center - base + 6).div_euclid(12);
        PitchName::from_fifths(base + 12 * k)
    }
}

impl fmt::Display for PitchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.step.letter())?;
        let accidental = if self.alter >= 0 { '#' } else { 'b' };
        for _ in 0..self.alter.unsigned_abs() {
            write!(f, "{}", accidental)?;
        }
        Ok(())
    }
}

/// Most accidentals a written pitch name may carry (double sharp / flat).
pub const MAX_ACCIDENTALS: i8 = 2;

/// Split a leading pitch name ("F#", "Bb", "e") off a string.
fn split_name(s: &str) -> Option<(PitchName, &str)> {
    let first = s.chars().next()?;
    let step = Step::from_letter(first)?;
    let mut alter: i8 = 0;
    let mut rest = &s[first.len_utf8()..];
    while let Some(c) = rest.chars().next() {
        alter = match c {
            '#' => alter.checked_add(1)?,
            'b' => alter.checked_sub(1)?,
            _ => break,
        };
        if alter.abs() > MAX_ACCIDENTALS {
            return None;
        }
        rest = &rest[1..];
    }
    Some((PitchName::new(step, alter), rest))
}

impl FromStr for PitchName {
    type Err = PitchParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match split_name(s.trim()) {
            Some((name, "")) => Ok(name),
            _ => Err(PitchParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for PitchName {
    type Error = PitchParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PitchName> for String {
    fn from(name: PitchName) -> String {
        name.to_string()
    }
}

/// A spelled pitch in scientific octave notation (C4 = MIDI 60).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pitch {
    pub name: PitchName,
    pub octave: i8,
}

impl Pitch {
    pub const fn new(name: PitchName, octave: i8) -> Self {
        Pitch { name, octave }
    }

    pub fn pitch_class(self) -> u8 {
        self.name.pitch_class()
    }

    /// MIDI note number. Not clamped: exotic spellings can leave 0..=127.
    pub fn midi(self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.name.step.natural_pc() as i32 + self.name.alter as i32
    }

    /// The pitch with the given spelling that sounds as `midi`.
    pub fn from_midi(midi: u8, name: PitchName) -> Self {
        let base = name.step.natural_pc() as i32 + name.alter as i32;
        let octave = (midi as i32 - base).div_euclid(12) - 1;
        Pitch::new(name, octave as i8)
    }

    /// Spell a MIDI note around `center` on the line of fifths.
    pub fn spelled_from_midi(midi: u8, center: i32) -> Self {
        Pitch::from_midi(midi, PitchName::spell(midi % 12, center))
    }

    /// The lowest pitch spelled `name` that sounds strictly above `floor`.
    pub fn lowest_above(name: PitchName, floor: i32) -> Self {
        let base = name.step.natural_pc() as i32 + name.alter as i32;
        let octave = (floor - base).div_euclid(12);
        Pitch::new(name, octave as i8)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.octave)
    }
}

impl FromStr for Pitch {
    type Err = PitchParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (name, rest) = split_name(trimmed).ok_or_else(|| PitchParseError(s.to_string()))?;
        let octave: i8 = rest.parse().map_err(|_| PitchParseError(s.to_string()))?;
        Ok(Pitch::new(name, octave))
    }
}

impl TryFrom<String> for Pitch {
    type Error = PitchParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Pitch> for String {
    fn from(pitch: Pitch) -> String {
        pitch.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_class_with_accidentals() {
        assert_eq!(PitchName::natural(Step::C).pitch_class(), 0);
        assert_eq!(PitchName::new(Step::B, 1).pitch_class(), 0); // B#
        assert_eq!(PitchName::new(Step::C, -1).pitch_class(), 11); // Cb
        assert_eq!(PitchName::new(Step::E, -1).pitch_class(), 3); // Eb
    }

    #[test]
    fn test_line_of_fifths() {
        assert_eq!(PitchName::natural(Step::C).fifths(), 0);
        assert_eq!(PitchName::natural(Step::F).fifths(), -1);
        assert_eq!(PitchName::new(Step::F, 1).fifths(), 6);
        assert_eq!(PitchName::new(Step::B, -1).fifths(), -2);

        for f in -15..=15 {
            assert_eq!(PitchName::from_fifths(f).fifths(), f);
        }
        assert_eq!(PitchName::from_fifths(6), PitchName::new(Step::F, 1));
        assert_eq!(PitchName::from_fifths(-2), PitchName::new(Step::B, -1));
    }

    #[test]
    fn test_transpose_fifths() {
        let c = PitchName::natural(Step::C);
        assert_eq!(c.transpose_fifths(1), PitchName::natural(Step::G));
        assert_eq!(c.transpose_fifths(-1), PitchName::natural(Step::F));
        assert_eq!(c.transpose_fifths(3), PitchName::natural(Step::A));
        assert_eq!(PitchName::natural(Step::B).transpose_fifths(1), PitchName::new(Step::F, 1));
    }

    #[test]
    fn test_spell_around_c_major() {
        // C major signature (0) centers on D (2).
        assert_eq!(PitchName::spell(6, 2).to_string(), "F#");
        assert_eq!(PitchName::spell(10, 2).to_string(), "Bb");
        assert_eq!(PitchName::spell(3, 2).to_string(), "Eb");
        assert_eq!(PitchName::spell(1, 2).to_string(), "C#");
        assert_eq!(PitchName::spell(5, 2).to_string(), "F");
        // Tritone away from the center: sharper spelling wins.
        assert_eq!(PitchName::spell(8, 2).to_string(), "G#");
    }

    #[test]
    fn test_spell_in_flat_context() {
        // Eb major signature (-3) centers on F (-1).
        assert_eq!(PitchName::spell(8, -1).to_string(), "Ab");
        assert_eq!(PitchName::spell(3, -1).to_string(), "Eb");
        assert_eq!(PitchName::spell(1, -1).to_string(), "Db");
    }

    #[test]
    fn test_midi_numbers() {
        let c4: Pitch = "C4".parse().unwrap();
        assert_eq!(c4.midi(), 60);
        let b_sharp3: Pitch = "B#3".parse().unwrap();
        assert_eq!(b_sharp3.midi(), 60);
        assert_eq!(Pitch::from_midi(60, PitchName::new(Step::B, 1)), b_sharp3);
        assert_eq!(Pitch::spelled_from_midi(70, 2).to_string(), "Bb4");
        assert_eq!(Pitch::spelled_from_midi(45, 2).to_string(), "A2");
    }

    #[test]
    fn test_lowest_above() {
        let e = PitchName::natural(Step::E);
        assert_eq!(Pitch::lowest_above(e, 60).to_string(), "E4");
        let c = PitchName::natural(Step::C);
        assert_eq!(Pitch::lowest_above(c, 60).to_string(), "C5");
        assert_eq!(Pitch::lowest_above(c, 59).to_string(), "C4");
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("F#".parse::<PitchName>().unwrap(), PitchName::new(Step::F, 1));
        assert_eq!("bb".parse::<PitchName>().unwrap(), PitchName::new(Step::B, -1));
        assert_eq!("Ebb".parse::<PitchName>().unwrap().to_string(), "Ebb");
        assert!("H".parse::<PitchName>().is_err());
        assert!("C4".parse::<PitchName>().is_err());

        let p: Pitch = "Eb-1".parse().unwrap();
        assert_eq!(p.octave, -1);
        assert_eq!(p.to_string(), "Eb-1");
        assert!("C".parse::<Pitch>().is_err());
        assert!("C#x".parse::<Pitch>().is_err());
    }

    #[test]
    fn test_pitch_json_form() {
        let p: Pitch = serde_json::from_str("\"G#5\"").unwrap();
        assert_eq!(p.midi(), 80);
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"G#5\"");
        assert!(serde_json::from_str::<Pitch>("\"Q4\"").is_err());
    }

    #[test]
    fn test_excess_accidentals_are_parse_errors() {
        assert!("C##".parse::<PitchName>().is_ok());
        assert!("Dbb".parse::<PitchName>().is_ok());
        assert!("C###".parse::<PitchName>().is_err());
        assert!("Ebbb4".parse::<Pitch>().is_err());

        let long = format!("\"C{}4\"", "#".repeat(130));
        assert!(serde_json::from_str::<Pitch>(&long).is_err());
        let long_flat = format!("B{}", "b".repeat(200));
        assert!(long_flat.parse::<PitchName>().is_err());
    }
}
