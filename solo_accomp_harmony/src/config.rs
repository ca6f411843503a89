// Pipeline configuration.
//
// All tunable parameters live in `PipelineConfig`, grouped by the stage that
// reads them: `HarmonizerConfig` (harmonizer.rs), `ScoreConfig` (score.rs,
// midi.rs, musicxml.rs) and `CorpusConfig` (corpus.rs). The value is built
// once (from a JSON file or `Default`) and passed down explicitly; nothing
// reads configuration from global state.
//
// Every field has a default, so a config file only needs the keys it
// changes:
//
//     { "harmonizer": { "min_pitched_notes": 2 }, "score": { "tempo_bpm": 72 } }

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonizerConfig {
    /// Measures with fewer attacked notes than this get a rest instead of a
    /// chord.
    pub min_pitched_notes: usize,
    /// Estimate the home key when the melody declares none. When false, a
    /// melody without a key fails.
    pub detect_missing_key: bool,
    /// Attach the Roman-numeral degree label to each chord.
    pub annotate_degrees: bool,
}

impl Default for HarmonizerConfig {
    fn default() -> Self {
        Self { min_pitched_notes: 3, detect_missing_key: true, annotate_degrees: true }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub tempo_bpm: u32,
    /// General MIDI program for the melody part (42 = cello).
    pub melody_program: u8,
    /// General MIDI program for the accompaniment part (0 = acoustic piano).
    pub accompaniment_program: u8,
    /// Appended to the source base name for both output files.
    pub output_suffix: String,
    /// Octave of the chord root in the accompaniment voicing.
    pub accompaniment_octave: i8,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: 60,
            melody_program: 42,
            accompaniment_program: 0,
            output_suffix: " Accomp".to_string(),
            accompaniment_octave: 3,
        }
    }
}

/// What to do when a single chord event cannot be encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingFailurePolicy {
    /// Drop the row, keep the rest of the piece.
    SkipRow,
    /// Drop every row of the piece.
    SkipPiece,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// File-name ending that marks a harmonized piece in the corpus walk.
    pub harmonized_suffix: String,
    pub encoding_failure: EncodingFailurePolicy,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            harmonized_suffix: " Accomp.mid".to_string(),
            encoding_failure: EncodingFailurePolicy::SkipRow,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub harmonizer: HarmonizerConfig,
    pub score: ScoreConfig,
    pub corpus: CorpusConfig,
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_json(&text).map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, restored);
        assert!(json.contains("\"encoding_failure\": \"skip_row\""));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json(
            r#"{
                "harmonizer": { "min_pitched_notes": 2 },
                "score": { "tempo_bpm": 72 },
                "corpus": { "encoding_failure": "skip_piece" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.harmonizer.min_pitched_notes, 2);
        assert!(config.harmonizer.detect_missing_key);
        assert_eq!(config.score.tempo_bpm, 72);
        assert_eq!(config.score.melody_program, 42);
        assert_eq!(config.score.output_suffix, " Accomp");
        assert_eq!(config.corpus.encoding_failure, EncodingFailurePolicy::SkipPiece);
        assert_eq!(config.corpus.harmonized_suffix, " Accomp.mid");
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(PipelineConfig::from_json("{}").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = PipelineConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
        assert!(err.to_string().contains("config.json"));

        let missing = dir.path().join("missing.json");
        assert!(matches!(PipelineConfig::load(&missing), Err(ConfigError::Read { .. })));
    }
}
