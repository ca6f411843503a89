// Measure-by-measure harmonization of a melodic line.
//
// Each measure becomes exactly one accompaniment event, so event i always
// describes measure i and lasts that measure's full duration:
// - fewer than `min_pitched_notes` attacked notes: a rest (too little
//   material to commit to a chord)
// - otherwise: the best triad over the home key and its related keys
//   (matcher.rs), optionally annotated with its degree label
//
// The home key comes from the melody when declared, otherwise from key
// detection (key_detect.rs). A melody with neither fails as a whole with
// `PieceError::KeyDetection`.

use crate::config::HarmonizerConfig;
use crate::error::PieceError;
use crate::key::Key;
use crate::key_detect::detect_key;
use crate::matcher::{HarmonyResult, best_match};
use crate::melody::{MeasureGroup, Melody};
use log::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ChordEvent {
    pub harmony: HarmonyResult,
    pub duration: f64,
    /// Text shown with the chord in the score, normally the degree label.
    pub annotation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccompanimentEvent {
    Chord(ChordEvent),
    Rest { duration: f64 },
}

impl AccompanimentEvent {
    pub fn duration(&self) -> f64 {
        match self {
            AccompanimentEvent::Chord(c) => c.duration,
            AccompanimentEvent::Rest { duration } => *duration,
        }
    }

    pub fn chord(&self) -> Option<&ChordEvent> {
        match self {
            AccompanimentEvent::Chord(c) => Some(c),
            AccompanimentEvent::Rest { .. } => None,
        }
    }
}

/// One event per input measure, in measure order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccompanimentTrack {
    pub events: Vec<AccompanimentEvent>,
}

impl AccompanimentTrack {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn chord_count(&self) -> usize {
        self.events.iter().filter(|e| e.chord().is_some()).count()
    }
}

pub fn harmonize(measures: &[MeasureGroup], home: &Key, config: &HarmonizerConfig) -> AccompanimentTrack {
    let events = measures
        .iter()
        .map(|measure| {
            let duration = measure.duration();
            let pitched = measure.pitched_count();
            if pitched < config.min_pitched_notes {
                debug!("measure {}: {} pitched notes, rest", measure.number, pitched);
                return AccompanimentEvent::Rest { duration };
            }
            let harmony = best_match(&measure.elements, home);
            debug!(
                "measure {}: {} ({} in {}, distance {})",
                measure.number, harmony.triad, harmony.label, harmony.key, harmony.distance
            );
            AccompanimentEvent::Chord(ChordEvent {
                harmony,
                duration,
                annotation: config.annotate_degrees.then(|| harmony.label.to_string()),
            })
        })
        .collect();
    AccompanimentTrack { events }
}

/// The declared key, else a detected one.
pub fn resolve_home_key(melody: &Melody, config: &HarmonizerConfig) -> Result<Key, PieceError> {
    if let Some(key) = melody.key {
        return Ok(key);
    }
    let detected = if config.detect_missing_key { detect_key(&melody.measures) } else { None };
    match detected {
        Some(key) => {
            debug!("{}: detected home key {}", melody.title, key);
            Ok(key)
        }
        None => Err(PieceError::KeyDetection { piece: melody.title.clone() }),
    }
}
