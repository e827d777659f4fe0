//! Error types emitted by the `o5m2sqlite` CLI.
//!
//! Library failures are wrapped transparently: their messages already name
//! the offending path or step. Messages never repeat their source; use
//! [`render_error`] to print the whole chain.

use std::{error::Error as _, iter, sync::Arc};

use camino::Utf8PathBuf;
use o5m_data::{ConvertError, SpatialIndexError};
use thiserror::Error;

/// Errors emitted by the `o5m2sqlite` CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The input path does not exist or is not a regular file.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingInputFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// The input path could not be inspected.
    #[error("failed to inspect {field} path {path:?}")]
    InspectInput {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The conversion itself failed.
    #[error(transparent)]
    Convert(#[from] ConvertError),
    /// The requested index key cannot name a spatial table.
    #[error(transparent)]
    Schema(#[from] SpatialIndexError),
    /// Writing the report or schema to stdout failed.
    #[error("failed to write output")]
    WriteOutput(#[source] std::io::Error),
}

/// Render `error` followed by every underlying cause, separated by `: `.
///
/// Decoder offsets and SQLite diagnostics live in the sources of the library
/// errors, so printing only the outermost message would hide them.
#[must_use]
pub fn render_error(error: &CliError) -> String {
    iter::successors(error.source(), |&cause| cause.source()).fold(
        error.to_string(),
        |mut rendered, cause| {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            rendered
        },
    )
}
