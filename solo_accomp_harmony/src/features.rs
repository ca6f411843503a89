// Chord events as fixed-schema feature rows.
//
// `encode` turns one sounding chord plus the piece's local key into a
// `FeatureRow`. It is a pure function of its inputs and never consults the
// chord matcher: root, bass and chord name are read off the pitches
// themselves. The row layout is the `COLUMNS` constant, which the CSV writer
// in corpus.rs follows verbatim.
//
// Chord naming tries each distinct pitch class as a root, bass first and
// then upward, and takes the first whose interval set equals one of
// `CHORD_TEMPLATES` exactly. Anything else is named as a cluster over the
// bass with its intervals listed.

use crate::key::{Key, Mode};
use crate::pitch::{Pitch, PitchName};
use std::collections::BTreeSet;
use thiserror::Error;

/// Column order of the training table.
pub const COLUMNS: [&str; 22] = [
    "measure",
    "beat",
    "duration",
    "num_notes",
    "root",
    "bass",
    "local_key",
    "mode",
    "pc_0",
    "pc_1",
    "pc_2",
    "pc_3",
    "pc_4",
    "pc_5",
    "pc_6",
    "pc_7",
    "pc_8",
    "pc_9",
    "pc_10",
    "pc_11",
    "chord_name",
    "piece_name",
];

/// Interval sets (semitones above the root) and their quality names.
const CHORD_TEMPLATES: &[(&[u8], &str)] = &[
    (&[0, 4, 7], "major triad"),
    (&[0, 3, 7], "minor triad"),
    (&[0, 3, 6], "diminished triad"),
    (&[0, 4, 8], "augmented triad"),
    (&[0, 2, 7], "suspended-second triad"),
    (&[0, 5, 7], "suspended-fourth triad"),
    (&[0, 4, 7, 10], "dominant seventh chord"),
    (&[0, 4, 7, 11], "major seventh chord"),
    (&[0, 3, 7, 10], "minor seventh chord"),
    (&[0, 3, 6, 10], "half-diminished seventh chord"),
    (&[0, 3, 6, 9], "diminished seventh chord"),
    (&[0, 4], "major-third dyad"),
    (&[0, 3], "minor-third dyad"),
    (&[0, 7], "perfect-fifth dyad"),
    (&[0], "unison"),
];

/// A chord as it sounds in a harmonized piece.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundingChord {
    /// 1-based measure number.
    pub measure: u32,
    /// 1-based beat position within the measure.
    pub beat: f64,
    /// Duration in quarter notes.
    pub duration: f64,
    /// Sounding pitches, lowest first.
    pub pitches: Vec<Pitch>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodingError {
    #[error("chord has no pitches")]
    EmptyChord,
    #[error("invalid duration {0}")]
    InvalidDuration(f64),
    #[error("invalid beat position {0}")]
    InvalidBeat(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub measure: u32,
    pub beat: f64,
    pub duration: f64,
    pub num_notes: usize,
    pub root: PitchName,
    pub bass: PitchName,
    pub local_key: PitchName,
    pub mode: Mode,
    /// Duration-weighted mass per pitch class, C = index 0.
    pub pitch_classes: [f64; 12],
    pub chord_name: String,
}

impl FeatureRow {
    /// Field values in `COLUMNS` order, without the trailing piece name.
    pub fn values(&self) -> Vec<String> {
        let mut values = vec![
            self.measure.to_string(),
            self.beat.to_string(),
            self.duration.to_string(),
            self.num_notes.to_string(),
            self.root.to_string(),
            self.bass.to_string(),
            self.local_key.to_string(),
            self.mode.to_string(),
        ];
        values.extend(self.pitch_classes.iter().map(|mass| mass.to_string()));
        values.push(self.chord_name.clone());
        values
    }
}

pub fn encode(chord: &SoundingChord, local_key: &Key) -> Result<FeatureRow, EncodingError> {
    if chord.pitches.is_empty() {
        return Err(EncodingError::EmptyChord);
    }
    if !chord.duration.is_finite() || chord.duration < 0.0 {
        return Err(EncodingError::InvalidDuration(chord.duration));
    }
    if !chord.beat.is_finite() || chord.beat < 1.0 {
        return Err(EncodingError::InvalidBeat(chord.beat));
    }

    let mut ordered = chord.pitches.clone();
    ordered.sort_by_key(|p| p.midi());

    let mut pitch_classes = [0.0; 12];
    for pitch in &ordered {
        pitch_classes[pitch.pitch_class() as usize] += chord.duration;
    }

    let (root, chord_name) = name_chord(&ordered).ok_or(EncodingError::EmptyChord)?;
    Ok(FeatureRow {
        measure: chord.measure,
        beat: chord.beat,
        duration: chord.duration,
        num_notes: ordered.len(),
        root,
        bass: ordered[0].name,
        local_key: local_key.tonic,
        mode: local_key.mode,
        pitch_classes,
        chord_name,
    })
}

/// Root and name of a chord whose pitches are sorted low to high.
pub fn name_chord(ordered: &[Pitch]) -> Option<(PitchName, String)> {
    // Distinct pitch classes with the spelling of their lowest occurrence.
    let mut seen = BTreeSet::new();
    let candidates: Vec<(u8, PitchName)> = ordered
        .iter()
        .filter(|p| seen.insert(p.pitch_class()))
        .map(|p| (p.pitch_class(), p.name))
        .collect();
    let &(bass_pc, bass) = candidates.first()?;

    for &(root_pc, root) in &candidates {
        let intervals = intervals_above(root_pc, &seen);
        if let Some((_, quality)) = CHORD_TEMPLATES.iter().find(|(t, _)| *t == intervals.as_slice()) {
            return Some((root, format!("{}-{}", root, quality)));
        }
    }

    let above: Vec<String> =
        intervals_above(bass_pc, &seen).iter().skip(1).map(|i| i.to_string()).collect();
    Some((bass, format!("{}-cluster ({})", bass, above.join(" "))))
}

fn intervals_above(root_pc: u8, pcs: &BTreeSet<u8>) -> Vec<u8> {
    let set: BTreeSet<u8> = pcs.iter().map(|&pc| (pc + 12 - root_pc) % 12).collect();
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(pitches: &[&str], duration: f64) -> SoundingChord {
        SoundingChord {
            measure: 3,
            beat: 1.0,
            duration,
            pitches: pitches.iter().map(|p| p.parse().unwrap()).collect(),
        }
    }

    fn key(s: &str) -> Key {
        s.parse().unwrap()
    }

    fn name(pitches: &[&str]) -> (String, String) {
        let mut ordered: Vec<Pitch> = pitches.iter().map(|p| p.parse().unwrap()).collect();
        ordered.sort_by_key(|p| p.midi());
        let (root, name) = name_chord(&ordered).unwrap();
        (root.to_string(), name)
    }

    #[test]
    fn test_encode_root_position_triad() {
        let row = encode(&chord(&["C3", "E3", "G3"], 4.0), &key("C major")).unwrap();
        assert_eq!(row.measure, 3);
        assert_eq!(row.num_notes, 3);
        assert_eq!(row.root.to_string(), "C");
        assert_eq!(row.bass.to_string(), "C");
        assert_eq!(row.local_key.to_string(), "C");
        assert_eq!(row.mode, Mode::Major);
        assert_eq!(row.chord_name, "C-major triad");
        assert_eq!(row.pitch_classes[0], 4.0);
        assert_eq!(row.pitch_classes[4], 4.0);
        assert_eq!(row.pitch_classes[7], 4.0);
        assert_eq!(row.pitch_classes.iter().filter(|&&m| m == 0.0).count(), 9);
    }

    #[test]
    fn test_inversion_keeps_root_and_bass_apart() {
        let row = encode(&chord(&["E3", "G3", "C4"], 2.0), &key("A minor")).unwrap();
        assert_eq!(row.bass.to_string(), "E");
        assert_eq!(row.root.to_string(), "C");
        assert_eq!(row.chord_name, "C-major triad");
        assert_eq!(row.local_key.to_string(), "A");
        assert_eq!(row.mode, Mode::Minor);
    }

    #[test]
    fn test_doubled_pitches_add_mass() {
        let row = encode(&chord(&["C3", "C4", "G4"], 1.5), &key("C major")).unwrap();
        assert_eq!(row.num_notes, 3);
        assert_eq!(row.pitch_classes[0], 3.0);
        assert_eq!(row.pitch_classes[7], 1.5);
        assert_eq!(row.chord_name, "C-perfect-fifth dyad");
    }

    #[test]
    fn test_unsorted_input_uses_lowest_as_bass() {
        let row = encode(&chord(&["B4", "D4", "G2", "F4"], 1.0), &key("C major")).unwrap();
        assert_eq!(row.bass.to_string(), "G");
        assert_eq!(row.chord_name, "G-dominant seventh chord");
    }

    #[test]
    fn test_chord_templates() {
        assert_eq!(name(&["D4", "F4", "A4"]).1, "D-minor triad");
        assert_eq!(name(&["B3", "D4", "F4"]).1, "B-diminished triad");
        assert_eq!(name(&["C4", "E4", "G#4"]).1, "C-augmented triad");
        assert_eq!(name(&["C4", "D4", "G4"]).1, "C-suspended-second triad");
        assert_eq!(name(&["C4", "F4", "G4"]).1, "C-suspended-fourth triad");
        assert_eq!(name(&["F3", "A3", "C4", "E4"]).1, "F-major seventh chord");
        assert_eq!(name(&["A3", "C4", "E4", "G4"]).1, "A-minor seventh chord");
        assert_eq!(name(&["B3", "D4", "F4", "A4"]).1, "B-half-diminished seventh chord");
        assert_eq!(name(&["B3", "D4", "F4", "Ab4"]).1, "B-diminished seventh chord");
        assert_eq!(name(&["Eb4", "G4"]).1, "Eb-major-third dyad");
        assert_eq!(name(&["A3", "A4"]), ("A".to_string(), "A-unison".to_string()));
    }

    #[test]
    fn test_symmetric_chord_named_from_bass() {
        // E G# C is also C E G# rotated: bass wins.
        assert_eq!(name(&["E3", "G#3", "C4"]).1, "E-augmented triad");
    }

    #[test]
    fn test_unmatched_is_cluster_over_bass() {
        assert_eq!(name(&["C4", "C#4", "D4"]), ("C".to_string(), "C-cluster (1 2)".to_string()));
        let row = encode(&chord(&["F#3", "G3", "C4"], 1.0), &key("G major")).unwrap();
        assert_eq!(row.root.to_string(), "F#");
        assert_eq!(row.chord_name, "F#-cluster (1 6)");
    }

    #[test]
    fn test_invalid_chords_fail() {
        assert_eq!(encode(&chord(&[], 1.0), &key("C major")), Err(EncodingError::EmptyChord));
        assert!(matches!(
            encode(&chord(&["C4"], f64::NAN), &key("C major")),
            Err(EncodingError::InvalidDuration(_))
        ));
        assert_eq!(
            encode(&chord(&["C4"], -1.0), &key("C major")),
            Err(EncodingError::InvalidDuration(-1.0))
        );
        let mut early = chord(&["C4"], 1.0);
        early.beat = 0.0;
        assert_eq!(encode(&early, &key("C major")), Err(EncodingError::InvalidBeat(0.0)));
    }

    #[test]
    fn test_encode_is_pure() {
        let c = chord(&["D3", "F#3", "A3", "C4"], 2.0);
        let k = key("G major");
        let first = encode(&c, &k).unwrap();
        for _ in 0..5 {
            assert_eq!(encode(&c, &k).unwrap(), first);
        }
        assert_eq!(c, chord(&["D3", "F#3", "A3", "C4"], 2.0));
    }

    #[test]
    fn test_values_follow_columns() {
        let row = encode(&chord(&["C3", "E3", "G3"], 4.0), &key("C major")).unwrap();
        let values = row.values();
        assert_eq!(values.len(), COLUMNS.len() - 1);
        assert_eq!(&values[..8], &["3", "1", "4", "3", "C", "C", "C", "major"]);
        assert_eq!(values[8], "4");
        assert_eq!(values[9], "0");
        assert_eq!(values[20], "C-major triad");
        assert_eq!(COLUMNS[20], "chord_name");
        assert_eq!(COLUMNS[21], "piece_name");
    }
}
