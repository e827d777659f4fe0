//! Facade crate for the o5m to SQLite converter.
//!
//! This crate re-exports the element model from `o5m-core` and the decoder,
//! loader and spatial index from `o5m-data`.

#![forbid(unsafe_code)]

pub use o5m_core::{
    DecodeError, Element, ElementSource, FixedCoordinate, Member, MemberKind, SectionOrder, Tag,
};

pub use o5m_data::{
    ConvertError, ConvertOptions, ConvertReport, ConvertSummary, DEFAULT_INDEX_KEY, O5mReader,
    SpatialIndexEntry, SpatialIndexError, build_spatial_index, convert, convert_o5m_file,
    load_elements, read_spatial_index, schema_sql, ways_intersecting,
};

#[cfg(feature = "test-support")]
pub use o5m_core::test_support;
