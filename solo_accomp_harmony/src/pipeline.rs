// Batch harmonization: source file(s) in, score artifacts out.
//
// Per piece: load melody -> resolve home key -> harmonize -> assemble ->
// write MIDI + MusicXML beside the source. A directory run walks the tree
// for melody sources (skipping files that are already harmonizer output)
// and processes them one by one. A failing piece is logged and recorded in
// the `BatchReport`; it never stops the batch.

use crate::config::PipelineConfig;
use crate::error::{PieceError, PieceFailure};
use crate::harmonizer::{harmonize, resolve_home_key};
use crate::key::Key;
use crate::score::{OutputPaths, assemble, output_paths, source_base_name, write_score};
use crate::source::{is_melody_source, load_melody};
use log::{info, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What one successful harmonization produced.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonizedOutput {
    pub source: PathBuf,
    pub paths: OutputPaths,
    pub key: Key,
    pub measures: usize,
    pub chords: usize,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outputs: Vec<HarmonizedOutput>,
    pub failures: Vec<PieceFailure>,
}

impl BatchReport {
    fn record(&mut self, piece: String, result: Result<HarmonizedOutput, PieceError>) {
        match result {
            Ok(output) => self.outputs.push(output),
            Err(error) => {
                warn!("{}: skipped: {}", piece, error);
                self.failures.push(PieceFailure { piece, error });
            }
        }
    }
}

pub fn harmonize_file(path: &Path, config: &PipelineConfig) -> Result<HarmonizedOutput, PieceError> {
    let melody = load_melody(path)?;
    let key = resolve_home_key(&melody, &config.harmonizer)?;
    let track = harmonize(&melody.measures, &key, &config.harmonizer);
    let chords = track.chord_count();

    let score = assemble(&melody, key, track, &source_base_name(path), &config.score);
    let paths = output_paths(path, &config.score);
    write_score(&score, &paths)?;

    info!(
        "{}: {} measures, {} chords in {} -> {}",
        path.display(),
        melody.measures.len(),
        chords,
        key,
        paths.midi.display()
    );
    Ok(HarmonizedOutput { source: path.to_path_buf(), paths, key, measures: melody.measures.len(), chords })
}

/// Melody sources under `root`, in a stable order.
pub fn melody_sources(root: &Path, config: &PipelineConfig) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable entry under {}: {}", root.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_melody_source(entry.path(), &config.score))
        .map(|entry| entry.into_path())
        .collect()
}

pub fn harmonize_directory(root: &Path, config: &PipelineConfig) -> BatchReport {
    let mut report = BatchReport::default();
    for path in melody_sources(root, config) {
        let piece = path.strip_prefix(root).unwrap_or(&path).display().to_string();
        let result = harmonize_file(&path, config);
        report.record(piece, result);
    }
    info!(
        "{}: {} harmonized, {} skipped",
        root.display(),
        report.outputs.len(),
        report.failures.len()
    );
    report
}

/// Harmonize a single file or every melody under a directory.
pub fn harmonize_path(path: &Path, config: &PipelineConfig) -> BatchReport {
    if path.is_dir() {
        return harmonize_directory(path, config);
    }
    let mut report = BatchReport::default();
    report.record(path.display().to_string(), harmonize_file(path, config));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    const SCALE_PIECE: &str = r#"{
        "key": "C major",
        "measures": [
            {"number": 1, "elements": [
                {"kind": "note", "pitch": "C4", "duration": 1.0},
                {"kind": "note", "pitch": "E4", "duration": 1.0},
                {"kind": "note", "pitch": "G4", "duration": 2.0}
            ]},
            {"number": 2, "elements": [
                {"kind": "note", "pitch": "D4", "duration": 2.0},
                {"kind": "rest", "duration": 2.0}
            ]}
        ]
    }"#;

    #[test]
    fn test_harmonize_file_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Scale.json");
        std::fs::write(&source, SCALE_PIECE).unwrap();

        let output = harmonize_file(&source, &PipelineConfig::default()).unwrap();
        assert_eq!(output.measures, 2);
        assert_eq!(output.chords, 1);
        assert_eq!(output.key.to_string(), "C major");
        assert_eq!(output.paths.midi, dir.path().join("Scale Accomp.mid"));
        assert!(output.paths.midi.exists());
        assert!(output.paths.musicxml.exists());
    }

    #[test]
    fn test_directory_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Good.json"), SCALE_PIECE).unwrap();
        std::fs::write(dir.path().join("Bad.json"), "not json").unwrap();
        std::fs::write(
            dir.path().join("Silent.json"),
            r#"{"measures": [{"number": 1, "elements": [{"kind": "rest", "duration": 4.0}]}]}"#,
        )
        .unwrap();

        let report = harmonize_directory(dir.path(), &PipelineConfig::default());
        assert_eq!(report.outputs.len(), 1);
        assert_eq!(report.failures.len(), 2);
        let kinds: Vec<(String, FailureKind)> =
            report.failures.iter().map(|f| (f.piece.clone(), f.error.kind())).collect();
        assert_eq!(
            kinds,
            vec![
                ("Bad.json".to_string(), FailureKind::Parse),
                ("Silent.json".to_string(), FailureKind::KeyDetection),
            ]
        );

        // A second run does not treat the outputs as new sources.
        let again = harmonize_directory(dir.path(), &PipelineConfig::default());
        assert_eq!(again.outputs.len(), 1);
        assert_eq!(again.failures.len(), 2);
    }

    #[test]
    fn test_harmonize_path_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Scale.json");
        std::fs::write(&source, SCALE_PIECE).unwrap();
        let report = harmonize_path(&source, &PipelineConfig::default());
        assert_eq!(report.outputs.len(), 1);
        assert!(report.failures.is_empty());
    }
}
