use camino::Utf8PathBuf;
use o5m_core::DecodeError;
use rusqlite::Error as SqliteError;
use thiserror::Error;

use crate::store::{SchemaError, SpatialIndexError, StoreError};

/// Errors raised while converting an element stream into SQLite.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The input could not be decoded.
    #[error("failed to decode input after {processed} elements")]
    Decode {
        /// Elements fully loaded before the failure; none of them were
        /// committed.
        processed: u64,
        /// Decoder diagnostic.
        #[source]
        source: DecodeError,
    },
    /// Writing rows failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The destination tables could not be created or indexed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The spatial index could not be built.
    #[error(transparent)]
    SpatialIndex(#[from] SpatialIndexError),
    /// Opening the input file failed.
    #[error("failed to open input {path}")]
    OpenInput {
        /// Input path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Creating the output's parent directory failed.
    #[error("failed to create parent directory of {path}")]
    CreateDirectory {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Checking for an existing output failed.
    #[error("failed to inspect output {path}")]
    InspectOutput {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The output exists and overwriting was not requested.
    #[error("output {path} already exists; pass --overwrite to replace it")]
    OutputExists {
        /// Output path.
        path: Utf8PathBuf,
    },
    /// Removing a previous output failed.
    #[error("failed to remove existing output {path}")]
    RemoveOutput {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}")]
    OpenDatabase {
        /// Database path.
        path: Utf8PathBuf,
        /// Error reported by SQLite.
        #[source]
        source: SqliteError,
    },
    /// Applying a connection pragma failed.
    #[error("failed to set PRAGMA {pragma}")]
    Pragma {
        /// Name of the pragma.
        pragma: &'static str,
        /// Error reported by SQLite.
        #[source]
        source: SqliteError,
    },
}
