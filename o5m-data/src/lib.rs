//! Decoding `o5m` files and loading them into SQLite.
//!
//! Responsibilities:
//! - Decode the `o5m` byte stream into delta-resolved elements.
//! - Own the destination schema, its prepared row writers and the spatial
//!   index over tagged ways.
//! - Drive a single-transaction load from any [`o5m_core::ElementSource`].
//!
//! Boundaries:
//! - Element types and the decoder seam live in `o5m-core`.
//! - Argument parsing and process exit codes belong to `o5m-cli`.
//!
//! Invariants:
//! - A load either commits every row or none.
//! - No global mutable state: connections are passed explicitly.
#![forbid(unsafe_code)]

mod convert;
mod error;
pub mod fs;
mod o5m;
mod pipeline;
mod store;

pub use convert::{
    ConvertOptions, ConvertReport, DEFAULT_INDEX_KEY, convert, convert_o5m_file, load_elements,
};
pub use error::ConvertError;
pub use o5m::O5mReader;
pub use pipeline::{ConvertSummary, run};
pub use store::{
    SchemaError, SchemaWriter, SpatialIndexEntry, SpatialIndexError, StoreError, Table,
    build_spatial_index, create_secondary_indexes, create_tables, read_spatial_index, schema_sql,
    spatial_table_name, ways_intersecting,
};
