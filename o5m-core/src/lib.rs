//! Core domain types for the o5m to SQLite converter.
//!
//! The types here describe the decoded OpenStreetMap element stream: nodes,
//! ways and relations together with their tags and member references. All
//! identifiers and coordinates are already delta-resolved to absolute values.
//! The [`ElementSource`] trait is the seam between byte-level decoders and the
//! loading pipeline.

#![forbid(unsafe_code)]

mod element;
mod source;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use element::{Element, FixedCoordinate, Member, MemberKind, SectionOrder, Tag};
pub use source::{DecodeError, ElementSource};
