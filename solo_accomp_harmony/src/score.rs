// Combined melody + accompaniment score and its on-disk artifacts.
//
// `assemble` is purely structural: it pairs the melody measures with the
// accompaniment track (one event per measure) and adds the title, tempo,
// key, meter and instrument programs that both writers need. The two
// artifacts land beside the source as `<base><suffix>.mid` (midi.rs) and
// `<base><suffix>.xml` (musicxml.rs).

use crate::config::ScoreConfig;
use crate::error::PieceError;
use crate::features::SoundingChord;
use crate::harmonizer::{AccompanimentEvent, AccompanimentTrack};
use crate::key::Key;
use crate::melody::{MeasureGroup, Melody, TimeSignature};
use crate::{midi, musicxml};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct CombinedScore {
    pub title: String,
    pub tempo_bpm: u32,
    pub key: Key,
    pub time_signature: TimeSignature,
    pub melody: Vec<MeasureGroup>,
    pub accompaniment: AccompanimentTrack,
    pub melody_program: u8,
    pub accompaniment_program: u8,
    /// Octave of the chord roots in the accompaniment voicing.
    pub accompaniment_octave: i8,
}

impl CombinedScore {
    /// Start offset (quarters) of every measure, plus the end of the score.
    pub fn measure_offsets(&self) -> Vec<f64> {
        let mut offsets = Vec::with_capacity(self.melody.len() + 1);
        let mut offset = 0.0;
        offsets.push(offset);
        for measure in &self.melody {
            offset += measure.duration();
            offsets.push(offset);
        }
        offsets
    }

    /// The accompaniment chords as they will sound once voiced.
    pub fn sounding_chords(&self) -> Vec<SoundingChord> {
        self.melody
            .iter()
            .zip(&self.accompaniment.events)
            .filter_map(|(measure, event)| match event {
                AccompanimentEvent::Chord(chord) => Some(SoundingChord {
                    measure: measure.number,
                    beat: 1.0,
                    duration: chord.duration,
                    pitches: chord.harmony.triad.voiced(self.accompaniment_octave).to_vec(),
                }),
                AccompanimentEvent::Rest { .. } => None,
            })
            .collect()
    }
}

pub fn assemble(
    melody: &Melody,
    key: Key,
    accompaniment: AccompanimentTrack,
    source_name: &str,
    config: &ScoreConfig,
) -> CombinedScore {
    CombinedScore {
        title: format!("{} with Accompaniment", source_name),
        tempo_bpm: config.tempo_bpm,
        key,
        time_signature: melody.time_signature,
        melody: melody.measures.clone(),
        accompaniment,
        melody_program: config.melody_program,
        accompaniment_program: config.accompaniment_program,
        accompaniment_octave: config.accompaniment_octave,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub midi: PathBuf,
    pub musicxml: PathBuf,
}

/// Base name of a source file: its name without the extension.
pub fn source_base_name(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn output_paths(source: &Path, config: &ScoreConfig) -> OutputPaths {
    let dir = source.parent().unwrap_or(Path::new(""));
    let base = format!("{}{}", source_base_name(source), config.output_suffix);
    OutputPaths {
        midi: dir.join(format!("{}.mid", base)),
        musicxml: dir.join(format!("{}.xml", base)),
    }
}

pub fn write_score(score: &CombinedScore, paths: &OutputPaths) -> Result<(), PieceError> {
    let smf = midi::score_to_bytes(score).map_err(|e| PieceError::io(&paths.midi, e))?;
    std::fs::write(&paths.midi, smf).map_err(|e| PieceError::io(&paths.midi, e))?;
    std::fs::write(&paths.musicxml, musicxml::score_to_musicxml(score))
        .map_err(|e| PieceError::io(&paths.musicxml, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarmonizerConfig;
    use crate::harmonizer::harmonize;
    use crate::melody::MelodicElement;

    fn sample_melody() -> Melody {
        let note = |p: &str, d: f64| MelodicElement::note(p.parse().unwrap(), d);
        Melody {
            title: "Sample".to_string(),
            key: Some("C major".parse().unwrap()),
            time_signature: TimeSignature::default(),
            measures: vec![
                MeasureGroup::new(1, vec![note("C4", 1.0), note("E4", 1.0), note("G4", 2.0)]),
                MeasureGroup::new(2, vec![note("F4", 2.0), MelodicElement::rest(2.0)]),
                MeasureGroup::new(3, vec![note("G4", 1.0), note("B4", 1.0), note("D5", 1.0), note("G4", 1.0)]),
            ],
        }
    }

    fn sample_score() -> CombinedScore {
        let melody = sample_melody();
        let key = melody.key.unwrap();
        let track = harmonize(&melody.measures, &key, &HarmonizerConfig::default());
        assemble(&melody, key, track, "Sample", &ScoreConfig::default())
    }

    #[test]
    fn test_assemble_metadata() {
        let score = sample_score();
        assert_eq!(score.title, "Sample with Accompaniment");
        assert_eq!(score.tempo_bpm, 60);
        assert_eq!(score.melody_program, 42);
        assert_eq!(score.accompaniment_program, 0);
        assert_eq!(score.melody.len(), score.accompaniment.len());
        assert_eq!(score.measure_offsets(), vec![0.0, 4.0, 8.0, 12.0]);
    }

    #[test]
    fn test_sounding_chords_skip_rests() {
        let chords = sample_score().sounding_chords();
        assert_eq!(chords.len(), 2);
        assert_eq!(chords[0].measure, 1);
        let names: Vec<String> = chords[0].pitches.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["C3", "E3", "G3"]);
        assert_eq!(chords[1].measure, 3);
        assert_eq!(chords[1].duration, 4.0);
    }

    #[test]
    fn test_output_paths() {
        let paths = output_paths(Path::new("corpus/Suite 1/Prelude.json"), &ScoreConfig::default());
        assert_eq!(paths.midi, PathBuf::from("corpus/Suite 1/Prelude Accomp.mid"));
        assert_eq!(paths.musicxml, PathBuf::from("corpus/Suite 1/Prelude Accomp.xml"));

        let config = ScoreConfig { output_suffix: "-harm".to_string(), ..Default::default() };
        assert_eq!(output_paths(Path::new("a.mid"), &config).midi, PathBuf::from("a-harm.mid"));
    }

    #[test]
    fn test_write_score_creates_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = output_paths(&dir.path().join("Sample.json"), &ScoreConfig::default());
        write_score(&sample_score(), &paths).unwrap();
        assert!(paths.midi.exists());
        let xml = std::fs::read_to_string(&paths.musicxml).unwrap();
        assert!(xml.contains("Sample with Accompaniment"));
    }

    #[test]
    fn test_write_score_reports_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let paths = output_paths(&dir.path().join("missing/Sample.json"), &ScoreConfig::default());
        let err = write_score(&sample_score(), &paths).unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::Io);
    }
}
