// Loading melodies from disk.
//
// Two source formats are accepted, chosen by extension:
// - `.json`: a melody document, the serde form of `Melody` (see melody.rs)
// - `.mid` / `.midi`: a Standard MIDI File read by `midi::read_melody`
//
// Anything that cannot be opened, parsed or validated is a
// `PieceError::Parse` naming the file. A melody without a title takes the
// file's base name.

use crate::config::ScoreConfig;
use crate::error::PieceError;
use crate::melody::Melody;
use crate::midi;
use crate::score::source_base_name;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Midi,
}

impl SourceFormat {
    pub fn of(path: &Path) -> Option<SourceFormat> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(SourceFormat::Json),
            "mid" | "midi" => Some(SourceFormat::Midi),
            _ => None,
        }
    }
}

/// Whether `path` is a melody to harmonize: a supported format that is not
/// itself harmonizer output.
pub fn is_melody_source(path: &Path, config: &ScoreConfig) -> bool {
    SourceFormat::of(path).is_some() && !source_base_name(path).ends_with(&config.output_suffix)
}

pub fn load_melody(path: &Path) -> Result<Melody, PieceError> {
    let format = SourceFormat::of(path).ok_or_else(|| PieceError::parse(path, "unsupported file type"))?;
    let base = source_base_name(path);

    let mut melody = match format {
        SourceFormat::Json => {
            let text = std::fs::read_to_string(path).map_err(|e| PieceError::parse(path, e))?;
            serde_json::from_str::<Melody>(&text).map_err(|e| PieceError::parse(path, e))?
        }
        SourceFormat::Midi => {
            let bytes = std::fs::read(path).map_err(|e| PieceError::parse(path, e))?;
            midi::read_melody(&bytes, &base).map_err(|e| PieceError::parse(path, e))?
        }
    };
    if melody.title.is_empty() {
        melody.title = base;
    }
    melody.validate().map_err(|reason| PieceError::parse(path, reason))?;
    Ok(melody)
}
