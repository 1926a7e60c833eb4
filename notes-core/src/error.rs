//! Error type shared by every notes-core operation.
//!
//! Nothing in this crate recovers from these internally: each failure aborts
//! the operation that raised it and is handed back to the caller unchanged.

use std::path::PathBuf;

/// Result alias used throughout notes-core.
pub type Result<T> = std::result::Result<T, NotesError>;

/// Errors raised by the repository, the format layer, and the differ.
#[derive(Debug, thiserror::Error)]
pub enum NotesError {
    /// The parent directory of a requested notes file does not exist.
    #[error("invalid notes file location {path:?}: parent directory does not exist")]
    InvalidLocation { path: PathBuf },

    /// Content could not be parsed as a notes document.
    #[error("notes format error in {source_name}: {reason}")]
    Format { source_name: String, reason: String },

    /// The document declares a format version newer than this build understands.
    #[error("notes format version {found} is not supported (newest supported is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// The operation is not available for this repository (e.g. saving a text-backed one).
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// An index of the same concrete kind is already attached to the repository.
    #[error("an index of kind {kind} is already registered")]
    AlreadyRegistered { kind: &'static str },

    /// No annotation with this identifier is owned by the repository.
    #[error("no annotation with guid {guid}")]
    UnknownAnnotation { guid: String },

    /// Reading or writing a notes file failed.
    #[error("i/o error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl NotesError {
    pub(crate) fn format(source_name: &str, reason: impl Into<String>) -> Self {
        NotesError::Format {
            source_name: source_name.to_owned(),
            reason: reason.into(),
        }
    }

    /// True for both flavours of format failure (bad markup and too-new version).
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            NotesError::Format { .. } | NotesError::UnsupportedVersion { .. }
        )
    }
}
