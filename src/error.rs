//! Error types for folio operations.

use std::io;

use thiserror::Error;

use crate::pipeline::Stage;

/// Errors that can occur while assembling a book.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing a required field: {field}")]
    MissingRequiredField { field: &'static str },

    #[error("Fixed layout books must define width and height: {reason}")]
    InvalidFixedLayout { reason: String },

    #[error("{operation} cannot run at stage {stage}")]
    SequencingViolation {
        operation: &'static str,
        stage: Stage,
    },

    #[error("Failed to fetch asset '{locator}': {cause}")]
    AssetFetchFailed {
        locator: String,
        #[source]
        cause: FetchError,
    },

    #[error("Failed to read page '{path}': {cause}")]
    PageReadFailed {
        path: String,
        #[source]
        cause: io::Error,
    },

    #[error("Failed to write page '{path}': {cause}")]
    PageWriteFailed {
        path: String,
        #[source]
        cause: io::Error,
    },

    #[error("Failed to write '{path}': {cause}")]
    ManifestWriteFailed {
        path: String,
        #[source]
        cause: io::Error,
    },

    #[error("Failed to write archive '{path}': {cause}")]
    ArchiveWriteFailed {
        path: String,
        #[source]
        cause: io::Error,
    },

    #[error("Failed to remove '{path}': {cause}")]
    Clean {
        path: String,
        #[source]
        cause: io::Error,
    },

    #[error("Failed to set up the HTTP client: {0}")]
    HttpClient(#[source] FetchError),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Why a single asset source could not be fetched.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("malformed data URI")]
    InvalidDataUri,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Convert zip error to io error.
pub(crate) fn io_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> io::Error {
    io::Error::other(e)
}
