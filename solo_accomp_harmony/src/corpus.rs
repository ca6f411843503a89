// Corpus-wide feature extraction.
//
// Every harmonized piece contributes one training row per sounding chord,
// tagged with the piece identifier. Pieces are processed one at a time and
// their rows appended to a single `TrainingTable`. A piece that fails (its
// file could not be read, it has no usable key, or under `skip_piece` one of
// its chords could not be encoded) contributes nothing and is recorded in
// the report; the run always finishes.
//
// `aggregate_directory` walks a corpus folder for harmonized MIDI files
// (names ending in `CorpusConfig::harmonized_suffix`) and reads each back
// with `midi::read_harmonized`. The piece identifier is the name of the
// enclosing folder, matching the one-folder-per-piece corpus layout.

use crate::config::{CorpusConfig, EncodingFailurePolicy};
use crate::error::{PieceError, PieceFailure};
use crate::features::{COLUMNS, FeatureRow, SoundingChord, encode};
use crate::key::Key;
use crate::midi;
use log::{info, warn};
use std::io::Write;
use std::path::Path;
use walkdir::WalkDir;

/// The chords of one harmonized piece, as read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonizedPiece {
    pub name: String,
    /// Local key for encoding. None when the file declares none and none
    /// could be detected.
    pub key: Option<Key>,
    pub chords: Vec<SoundingChord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub features: FeatureRow,
    pub piece_name: String,
}

/// Append-only table of training rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingTable {
    rows: Vec<TrainingRow>,
}

impl TrainingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = TrainingRow>) {
        self.rows.extend(rows);
    }

    pub fn rows(&self) -> &[TrainingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header plus one line per row, in `COLUMNS` order.
    pub fn write_csv<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        writeln!(out, "{}", COLUMNS.join(","))?;
        for row in &self.rows {
            let mut values = row.features.values();
            values.push(row.piece_name.clone());
            let line: Vec<String> = values.iter().map(|v| csv_field(v)).collect();
            writeln!(out, "{}", line.join(","))?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let mut out = std::io::BufWriter::new(file);
        self.write_csv(&mut out)?;
        out.flush()
    }
}

/// Quote a field when it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[derive(Debug, Default)]
pub struct CorpusReport {
    pub table: TrainingTable,
    /// Pieces that contributed rows.
    pub pieces: usize,
    /// Rows dropped under the `skip_row` policy.
    pub skipped_rows: usize,
    pub failures: Vec<PieceFailure>,
}

/// Encode every chord of a piece, honoring the encoding-failure policy.
fn piece_rows(
    id: &str,
    piece: &HarmonizedPiece,
    config: &CorpusConfig,
    skipped_rows: &mut usize,
) -> Result<Vec<TrainingRow>, PieceError> {
    let key = piece.key.ok_or_else(|| PieceError::KeyDetection { piece: id.to_string() })?;
    let mut rows = Vec::with_capacity(piece.chords.len());
    for chord in &piece.chords {
        match encode(chord, &key) {
            Ok(features) => rows.push(TrainingRow { features, piece_name: id.to_string() }),
            Err(e) => match config.encoding_failure {
                EncodingFailurePolicy::SkipRow => {
                    warn!("{}: skipping chord in measure {}: {}", id, chord.measure, e);
                    *skipped_rows += 1;
                }
                EncodingFailurePolicy::SkipPiece => {
                    return Err(PieceError::Encoding { measure: chord.measure, reason: e.to_string() });
                }
            },
        }
    }
    Ok(rows)
}

/// Concatenate the rows of every piece that can be read and encoded.
pub fn aggregate<I>(pieces: I, config: &CorpusConfig) -> CorpusReport
where
    I: IntoIterator<Item = (String, Result<HarmonizedPiece, PieceError>)>,
{
    let mut report = CorpusReport::default();
    for (id, piece) in pieces {
        let rows = piece.and_then(|p| piece_rows(&id, &p, config, &mut report.skipped_rows));
        match rows {
            Ok(rows) => {
                info!("{}: {} chord rows", id, rows.len());
                report.table.extend(rows);
                report.pieces += 1;
            }
            Err(error) => {
                warn!("{}: skipped: {}", id, error);
                report.failures.push(PieceFailure { piece: id, error });
            }
        }
    }
    report
}

/// Identifier of a harmonized file: its folder name, else its file stem.
pub fn piece_id(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .or_else(|| path.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Harmonized files under `root`, in a stable order.
pub fn harmonized_files(root: &Path, config: &CorpusConfig) -> Vec<std::path::PathBuf> {
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
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(&config.harmonized_suffix))
        .map(|entry| entry.into_path())
        .collect()
}

fn load_piece(path: &Path, id: &str) -> Result<HarmonizedPiece, PieceError> {
    let bytes = std::fs::read(path).map_err(|e| PieceError::parse(path, e))?;
    midi::read_harmonized(&bytes, id).map_err(|e| PieceError::parse(path, e))
}

pub fn aggregate_directory(root: &Path, config: &CorpusConfig) -> CorpusReport {
    let pieces = harmonized_files(root, config).into_iter().map(|path| {
        let id = piece_id(&path);
        let piece = load_piece(&path, &id);
        (id, piece)
    });
    aggregate(pieces, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::pitch::Pitch;

    fn chord(measure: u32, pitches: &[&str]) -> SoundingChord {
        SoundingChord {
            measure,
            beat: 1.0,
            duration: 4.0,
            pitches: pitches.iter().map(|p| p.parse::<Pitch>().unwrap()).collect(),
        }
    }

    fn piece(name: &str, key: Option<&str>, chords: Vec<SoundingChord>) -> HarmonizedPiece {
        HarmonizedPiece { name: name.to_string(), key: key.map(|k| k.parse().unwrap()), chords }
    }

    fn good_piece() -> HarmonizedPiece {
        piece(
            "Prelude",
            Some("C major"),
            vec![chord(1, &["C3", "E3", "G3"]), chord(2, &["G3", "B3", "D4"]), chord(4, &["F3", "A3", "C4"])],
        )
    }

    #[test]
    fn test_rows_tagged_with_piece() {
        let report = aggregate(vec![("Prelude".to_string(), Ok(good_piece()))], &CorpusConfig::default());
        assert_eq!(report.table.len(), 3);
        assert_eq!(report.pieces, 1);
        assert!(report.failures.is_empty());
        assert!(report.table.rows().iter().all(|r| r.piece_name == "Prelude"));
        let measures: Vec<u32> = report.table.rows().iter().map(|r| r.features.measure).collect();
        assert_eq!(measures, vec![1, 2, 4]);
    }

    #[test]
    fn test_missing_key_skips_piece() {
        let keyless = piece("Courante", None, vec![chord(1, &["C3", "E3", "G3"])]);
        let report = aggregate(vec![("Courante".to_string(), Ok(keyless))], &CorpusConfig::default());
        assert!(report.table.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].piece, "Courante");
        assert_eq!(report.failures[0].error.kind(), FailureKind::KeyDetection);
    }

    #[test]
    fn test_unparsable_piece_does_not_stop_batch() {
        let pieces = vec![
            ("Gigue".to_string(), Err(PieceError::parse("Gigue Accomp.mid", "truncated"))),
            ("Prelude".to_string(), Ok(good_piece())),
        ];
        let report = aggregate(pieces, &CorpusConfig::default());
        assert_eq!(report.table.len(), good_piece().chords.len());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].error.kind(), FailureKind::Parse);
    }

    #[test]
    fn test_encoding_failure_policies() {
        let mut flawed = good_piece();
        flawed.chords.insert(1, chord(2, &[]));

        let report = aggregate(vec![("Prelude".to_string(), Ok(flawed.clone()))], &CorpusConfig::default());
        assert_eq!(report.table.len(), 3);
        assert_eq!(report.skipped_rows, 1);
        assert!(report.failures.is_empty());

        let config = CorpusConfig { encoding_failure: EncodingFailurePolicy::SkipPiece, ..Default::default() };
        let report = aggregate(vec![("Prelude".to_string(), Ok(flawed))], &config);
        assert!(report.table.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, PieceError::Encoding { measure: 2, .. }));
    }

    #[test]
    fn test_csv_output() {
        let id = "Suite, No. \"1\"".to_string();
        let report = aggregate(vec![(id, Ok(good_piece()))], &CorpusConfig::default());

        let mut buf = Vec::new();
        report.table.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], COLUMNS.join(","));
        assert!(lines[1].starts_with("1,1,4,3,C,C,C,major,4,0,0,0,4,0,0,4,0,0,0,0,C-major triad,"));
        assert!(lines[1].ends_with(",\"Suite, No. \"\"1\"\"\""));
    }

    #[test]
    fn test_piece_id() {
        assert_eq!(piece_id(Path::new("corpus/Suite 1/Prelude Accomp.mid")), "Suite 1");
        assert_eq!(piece_id(Path::new("Prelude Accomp.mid")), "Prelude Accomp");
    }

    #[test]
    fn test_harmonized_files_filter() {
        let dir = tempfile::tempdir().unwrap();
        let piece_dir = dir.path().join("Suite 1");
        std::fs::create_dir(&piece_dir).unwrap();
        std::fs::write(piece_dir.join("Prelude.mid"), b"").unwrap();
        std::fs::write(piece_dir.join("Prelude Accomp.mid"), b"").unwrap();
        std::fs::write(piece_dir.join("Prelude Accomp.xml"), b"").unwrap();

        let files = harmonized_files(dir.path(), &CorpusConfig::default());
        assert_eq!(files, vec![piece_dir.join("Prelude Accomp.mid")]);

        // The empty file is unreadable MIDI: one parse failure, no rows.
        let report = aggregate_directory(dir.path(), &CorpusConfig::default());
        assert!(report.table.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].piece, "Suite 1");
    }
}
