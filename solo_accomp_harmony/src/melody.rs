// Parsed melodic input: measures of notes and rests.
//
// This is the shape the harmonizer consumes, whatever the source format
// (JSON document or MIDI file, see source.rs and midi.rs). A melody is a
// list of measures; each measure is an ordered list of elements, and every
// element is explicitly a note or a rest. Offsets inside a measure are
// implied by element order, and beat positions follow from the time
// signature.
//
// Durations are in quarter-note units (1.0 = quarter, 0.5 = eighth).
//
// A note with `tie_continuation` continues a note tied over from the
// previous element (typically across a barline). It still sounds, but it is
// not a new attack, so harmony matching ignores it.

use crate::key::Key;
use crate::pitch::Pitch;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a melody cannot be harmonized as given.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MelodyError {
    #[error("time signature {numerator}/{denominator} is not usable")]
    TimeSignature { numerator: u8, denominator: u8 },
    #[error("measure {measure} has invalid duration {duration}")]
    MeasureDuration { measure: u32, duration: f64 },
    #[error("measure {measure} has an element with invalid duration {duration}")]
    ElementDuration { measure: u32, duration: f64 },
}

/// Meter of a melody. Beats are counted in denominator units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature { numerator: 4, denominator: 4 }
    }
}

impl TimeSignature {
    /// Length of one beat in quarter notes.
    pub fn beat_length(&self) -> f64 {
        4.0 / self.denominator.max(1) as f64
    }

    /// Length of a full measure in quarter notes.
    pub fn measure_length(&self) -> f64 {
        self.numerator as f64 * self.beat_length()
    }

    /// 1-based beat position of an offset (quarters) within a measure.
    pub fn beat_at(&self, offset: f64) -> f64 {
        1.0 + offset / self.beat_length()
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: Pitch,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub tie_continuation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestEvent {
    pub duration: f64,
}

/// One element of a melodic line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MelodicElement {
    Note(NoteEvent),
    Rest(RestEvent),
}

impl MelodicElement {
    pub fn note(pitch: Pitch, duration: f64) -> Self {
        MelodicElement::Note(NoteEvent { pitch, duration, tie_continuation: false })
    }

    pub fn tied_note(pitch: Pitch, duration: f64) -> Self {
        MelodicElement::Note(NoteEvent { pitch, duration, tie_continuation: true })
    }

    pub fn rest(duration: f64) -> Self {
        MelodicElement::Rest(RestEvent { duration })
    }

    pub fn duration(&self) -> f64 {
        match self {
            MelodicElement::Note(n) => n.duration,
            MelodicElement::Rest(r) => r.duration,
        }
    }

    /// The pitch of a note that starts here (not a tie continuation).
    pub fn attacked_pitch(&self) -> Option<Pitch> {
        match self {
            MelodicElement::Note(n) if !n.tie_continuation => Some(n.pitch),
            _ => None,
        }
    }

    /// The pitch sounding during this element, tied or not.
    pub fn sounding_pitch(&self) -> Option<Pitch> {
        match self {
            MelodicElement::Note(n) => Some(n.pitch),
            MelodicElement::Rest(_) => None,
        }
    }

    pub fn is_tie_continuation(&self) -> bool {
        matches!(self, MelodicElement::Note(n) if n.tie_continuation)
    }
}

/// The elements of one measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureGroup {
    /// 1-based measure number.
    pub number: u32,
    /// Explicit bar length in quarters. When absent, the sum of the elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub elements: Vec<MelodicElement>,
}

impl MeasureGroup {
    pub fn new(number: u32, elements: Vec<MelodicElement>) -> Self {
        MeasureGroup { number, duration: None, elements }
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn duration(&self) -> f64 {
        self.duration.unwrap_or_else(|| self.content_duration())
    }

    pub fn content_duration(&self) -> f64 {
        self.elements.iter().map(MelodicElement::duration).sum()
    }

    /// Pitches of notes attacked in this measure, in order.
    pub fn attacked_pitches(&self) -> impl Iterator<Item = Pitch> + '_ {
        self.elements.iter().filter_map(MelodicElement::attacked_pitch)
    }

    pub fn pitched_count(&self) -> usize {
        self.attacked_pitches().count()
    }

    /// Elements paired with their offset (quarters) from the start of the measure.
    pub fn positioned(&self) -> impl Iterator<Item = (f64, &MelodicElement)> + '_ {
        self.elements.iter().scan(0.0, |offset, element| {
            let start = *offset;
            *offset += element.duration();
            Some((start, element))
        })
    }
}

/// A parsed monophonic line, ready for harmonization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Melody {
    #[serde(default)]
    pub title: String,
    /// Declared home key. When absent it is detected (see key_detect.rs).
    #[serde(default)]
    pub key: Option<Key>,
    #[serde(default)]
    pub time_signature: TimeSignature,
    pub measures: Vec<MeasureGroup>,
}

impl Melody {
    /// Check the meter is non-degenerate and durations are finite and not negative.
    pub fn validate(&self) -> Result<(), MelodyError> {
        let TimeSignature { numerator, denominator } = self.time_signature;
        if numerator == 0 || denominator == 0 {
            return Err(MelodyError::TimeSignature { numerator, denominator });
        }
        let usable = |d: f64| d.is_finite() && d >= 0.0;
        for measure in &self.measures {
            if let Some(duration) = measure.duration.filter(|d| !usable(*d)) {
                return Err(MelodyError::MeasureDuration { measure: measure.number, duration });
            }
            if let Some(duration) = measure.elements.iter().map(MelodicElement::duration).find(|d| !usable(*d)) {
                return Err(MelodyError::ElementDuration { measure: measure.number, duration });
            }
        }
        Ok(())
    }

    pub fn elements(&self) -> impl Iterator<Item = &MelodicElement> + '_ {
        self.measures.iter().flat_map(|m| m.elements.iter())
    }

    pub fn total_duration(&self) -> f64 {
        self.measures.iter().map(MeasureGroup::duration).sum()
    }
}
