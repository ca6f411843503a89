// Major and minor keys on spelled tonics.
//
// A key is a tonic pitch name plus a mode. Everything else is derived from
// the tonic's position on the line of fifths (see pitch.rs):
// - scale: fixed line-of-fifths offsets per mode, so each degree gets its
//   in-key spelling (F# in G major, Bb in F major)
// - key signature: sharps count (negative = flats), used for MIDI
//   key-signature events and MusicXML <key><fifths>
// - related keys: a fifth up / down is +-1 on the line, the relative key
//   flips the mode and keeps the signature
//
// Keys compare by value (tonic + mode). The JSON form is a string such as
// "G major" or "F# minor".

use crate::pitch::{Pitch, PitchName, PitchParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Major or (natural) minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    /// Line-of-fifths offsets from the tonic to scale degrees 1-7.
    pub fn scale_fifths(self) -> [i32; 7] {
        match self {
            Mode::Major => [0, 2, 4, -1, 1, 3, 5],
            Mode::Minor => [0, 2, -3, -1, 1, -4, -2],
        }
    }

    pub fn opposite(self) -> Mode {
        match self {
            Mode::Major => Mode::Minor,
            Mode::Minor => Mode::Major,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("empty key string")]
    Empty,
    #[error(transparent)]
    Tonic(#[from] PitchParseError),
    #[error("unknown mode {0:?} (expected major or minor)")]
    Mode(String),
}

/// A tonic plus a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key {
    pub tonic: PitchName,
    pub mode: Mode,
}

impl Key {
    pub const fn new(tonic: PitchName, mode: Mode) -> Self {
        Key { tonic, mode }
    }

    pub const fn major(tonic: PitchName) -> Self {
        Key::new(tonic, Mode::Major)
    }

    pub const fn minor(tonic: PitchName) -> Self {
        Key::new(tonic, Mode::Minor)
    }

    /// The seven scale pitch names, tonic first.
    pub fn scale(&self) -> [PitchName; 7] {
        self.mode.scale_fifths().map(|offset| self.tonic.transpose_fifths(offset))
    }

    /// Number of sharps in the key signature (negative for flats).
    pub fn signature(&self) -> i32 {
        match self.mode {
            Mode::Major => self.tonic.fifths(),
            Mode::Minor => self.tonic.fifths() - 3,
        }
    }

    pub fn from_signature(sharps: i32, mode: Mode) -> Key {
        match mode {
            Mode::Major => Key::major(PitchName::from_fifths(sharps)),
            Mode::Minor => Key::minor(PitchName::from_fifths(sharps + 3)),
        }
    }

    /// Same mode, tonic a perfect fifth higher.
    pub fn fifth_up(&self) -> Key {
        Key::new(self.tonic.transpose_fifths(1), self.mode)
    }

    /// Same mode, tonic a perfect fifth lower.
    pub fn fifth_down(&self) -> Key {
        Key::new(self.tonic.transpose_fifths(-1), self.mode)
    }

    /// Opposite mode sharing this key signature.
    pub fn relative(&self) -> Key {
        match self.mode {
            Mode::Major => Key::minor(self.tonic.transpose_fifths(3)),
            Mode::Minor => Key::major(self.tonic.transpose_fifths(-3)),
        }
    }

    /// In-key spelling of a pitch class; chromatic pitches get the spelling
    /// closest to the signature.
    pub fn spell(&self, pc: u8) -> PitchName {
        PitchName::spell(pc, self.signature() + 2)
    }

    pub fn spell_midi(&self, midi: u8) -> Pitch {
        Pitch::from_midi(midi, self.spell(midi % 12))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

impl FromStr for Key {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let tonic: PitchName = parts.next().ok_or(KeyParseError::Empty)?.parse()?;
        let mode = match parts.next().map(|m| m.to_ascii_lowercase()) {
            None => Mode::Major,
            Some(m) if m == "major" || m == "maj" => Mode::Major,
            Some(m) if m == "minor" || m == "min" => Mode::Minor,
            Some(m) => return Err(KeyParseError::Mode(m)),
        };
        if let Some(extra) = parts.next() {
            return Err(KeyParseError::Mode(extra.to_string()));
        }
        Ok(Key::new(tonic, mode))
    }
}

impl TryFrom<String> for Key {
    type Error = KeyParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Key> for String {
    fn from(key: Key) -> String {
        key.to_string()
    }
}
