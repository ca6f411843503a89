// Per-piece failure taxonomy.
//
// Every failure is scoped to a single piece. The batch drivers (pipeline.rs
// for harmonization, corpus.rs for feature extraction) catch these at the
// piece boundary, log them with the piece identifier, and move on.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PieceError {
    /// The source could not be opened or parsed.
    #[error("could not parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    /// No home key was declared and none could be detected.
    #[error("no home key could be determined for {piece}")]
    KeyDetection { piece: String },

    /// A chord event could not be turned into a feature row.
    #[error("malformed chord in measure {measure}: {reason}")]
    Encoding { measure: u32, reason: String },

    /// An output artifact could not be written.
    #[error("could not write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse failure category, for reports and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Parse,
    KeyDetection,
    Encoding,
    Io,
}

impl PieceError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        PieceError::Parse { path: path.into(), reason: reason.to_string() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PieceError::Io { path: path.into(), source }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            PieceError::Parse { .. } => FailureKind::Parse,
            PieceError::KeyDetection { .. } => FailureKind::KeyDetection,
            PieceError::Encoding { .. } => FailureKind::Encoding,
            PieceError::Io { .. } => FailureKind::Io,
        }
    }
}

/// A piece that was skipped, and why.
#[derive(Debug)]
pub struct PieceFailure {
    pub piece: String,
    pub error: PieceError,
}

impl fmt::Display for PieceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.piece, self.error)
    }
}
