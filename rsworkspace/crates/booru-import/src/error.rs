//! Error taxonomy for one import batch.
//!
//! "Nothing to do" conditions (no URLs, nothing downloaded) are not errors;
//! they surface as [`BatchOutcome`](crate::BatchOutcome) variants.

use std::fmt;
use std::path::PathBuf;

use szuru_client::BoardError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    /// The downloader exited unsuccessfully. Fatal to the whole batch.
    #[error("There was an error when communicating with gallery-dl: {output}")]
    Downloader { status: Option<i32>, output: String },

    /// The downloader process could not be started.
    #[error("failed to start downloader '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Post creation was rejected by the image board.
    #[error("Szurubooru API error: ``{0}``")]
    Service(#[source] BoardError),

    /// Any other image-board call failed (upload, tag lookup/create, push).
    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("metadata file {} not found", .path.display())]
    MetadataMissing { path: PathBuf },

    #[error("metadata file {} has no `{field}`", .path.display())]
    MetadataField { path: PathBuf, field: &'static str },

    #[error("metadata file {} is not valid JSON: {source}", .path.display())]
    MetadataParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A local file the command needs is absent. The message is shown as-is.
    #[error("{hint}")]
    PrerequisiteMissing { path: PathBuf, hint: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why an item was skipped in a batch that tolerates per-item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MetadataMissing,
    MetadataInvalid,
    Service,
    Upload,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MetadataMissing => "missing metadata",
            Self::MetadataInvalid => "invalid metadata",
            Self::Service => "post creation failed",
            Self::Upload => "upload failed",
        })
    }
}

impl ImportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn skip_reason(&self) -> SkipReason {
        match self {
            Self::MetadataMissing { .. } => SkipReason::MetadataMissing,
            Self::MetadataField { .. } | Self::MetadataParse { .. } => SkipReason::MetadataInvalid,
            Self::Service(_) => SkipReason::Service,
            _ => SkipReason::Upload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downloader_error_embeds_output() {
        let err = ImportError::Downloader {
            status: Some(1),
            output: "[error] Unsupported URL".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "There was an error when communicating with gallery-dl: [error] Unsupported URL"
        );
    }

    #[test]
    fn service_error_wraps_board_error() {
        let err = ImportError::Service(BoardError::NotFound("gone".into()));
        assert_eq!(err.to_string(), "Szurubooru API error: ``not found: gone``");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn metadata_errors_classify_for_skipping() {
        let missing = ImportError::MetadataMissing { path: "a.jpg.json".into() };
        let field = ImportError::MetadataField { path: "a.jpg.json".into(), field: "author.name" };
        assert_eq!(missing.skip_reason(), SkipReason::MetadataMissing);
        assert_eq!(field.skip_reason(), SkipReason::MetadataInvalid);
        assert_eq!(field.to_string(), "metadata file a.jpg.json has no `author.name`");
    }

    #[test]
    fn board_errors_classify_as_upload() {
        let err: ImportError = BoardError::Decode("x".into()).into();
        assert_eq!(err.skip_reason(), SkipReason::Upload);
        assert_eq!(SkipReason::Upload.to_string(), "upload failed");
    }
}
