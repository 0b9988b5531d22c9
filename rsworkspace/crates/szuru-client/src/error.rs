//! Error type for image-board operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by [`ImageBoard`](crate::ImageBoard) backends.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Transport-level failure (connection, TLS, body decoding).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-2xx status and an error body.
    #[error("{name} (HTTP {status}): {description}")]
    Api {
        status: u16,
        name: String,
        description: String,
    },

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The configured base URL cannot be used to build API endpoints.
    #[error("invalid base URL '{0}'")]
    InvalidUrl(String),

    /// The local file handed to an upload could not be opened or sized.
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A 2xx response whose body did not match the expected resource.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl BoardError {
    /// True for the "not found" class the tag resolver turns into a create.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
