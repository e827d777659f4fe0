//! The decoder seam consumed by the loading pipeline.

use thiserror::Error;

use crate::{Element, Member, SectionOrder, Tag};

/// Forward-only cursor over a decoded element stream.
///
/// Each call to [`next_element`](Self::next_element) yields the next top-level
/// element. Its tags, way node references and relation members are then read
/// through the remaining methods, each returning `Ok(None)` once its
/// sub-sequence is exhausted. Sub-sequences are invalidated when the cursor
/// advances, so callers must drain them, in [`section_order`](Self::section_order),
/// before requesting the next element. Borrowed tags and members cannot
/// outlive the next call on the source.
///
/// # Examples
///
/// ```
/// use o5m_core::{DecodeError, Element, ElementSource};
///
/// fn count_tags<S: ElementSource>(source: &mut S) -> Result<usize, DecodeError> {
///     let mut count = 0;
///     while let Some(element) = source.next_element()? {
///         if let Element::Node { .. } = element {
///             while source.next_tag()?.is_some() {
///                 count += 1;
///             }
///         }
///     }
///     Ok(count)
/// }
/// ```
pub trait ElementSource {
    /// Advance to the next element, or return `None` at the end of the stream.
    fn next_element(&mut self) -> Result<Option<Element>, DecodeError>;

    /// Next tag of the current element.
    fn next_tag(&mut self) -> Result<Option<Tag<'_>>, DecodeError>;

    /// Next node reference of the current way.
    fn next_way_node(&mut self) -> Result<Option<i64>, DecodeError>;

    /// Next member of the current relation.
    fn next_member(&mut self) -> Result<Option<Member<'_>>, DecodeError>;

    /// Order in which member and tag sub-sequences of ways and relations are
    /// exposed.
    fn section_order(&self) -> SectionOrder {
        SectionOrder::MembersFirst
    }
}

impl<S: ElementSource + ?Sized> ElementSource for &mut S {
    fn next_element(&mut self) -> Result<Option<Element>, DecodeError> {
        (**self).next_element()
    }

    fn next_tag(&mut self) -> Result<Option<Tag<'_>>, DecodeError> {
        (**self).next_tag()
    }

    fn next_way_node(&mut self) -> Result<Option<i64>, DecodeError> {
        (**self).next_way_node()
    }

    fn next_member(&mut self) -> Result<Option<Member<'_>>, DecodeError> {
        (**self).next_member()
    }

    fn section_order(&self) -> SectionOrder {
        (**self).section_order()
    }
}

/// Errors raised while decoding the element stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// Reading from the underlying input failed.
    #[error("failed to read input")]
    Io {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The input ended before a record was complete.
    #[error("input ended inside a {context} at byte offset {offset}")]
    Truncated {
        /// Record being decoded when the input ended.
        context: &'static str,
        /// Byte offset where the record started or was cut off.
        offset: u64,
    },
    /// A record violated the format's structure.
    #[error("malformed {context} at byte offset {offset}")]
    Malformed {
        /// Record being decoded.
        context: &'static str,
        /// Byte offset of the offending data.
        offset: u64,
    },
    /// A string back-reference pointed outside the string table.
    #[error(
        "string reference {reference} at byte offset {offset} exceeds the {available} stored strings"
    )]
    InvalidStringReference {
        /// Reference value read from the stream.
        reference: u64,
        /// Number of strings currently stored.
        available: usize,
        /// Byte offset of the reference.
        offset: u64,
    },
    /// A tag, role or key was not valid UTF-8.
    #[error("string at byte offset {offset} is not valid UTF-8")]
    InvalidUtf8 {
        /// Byte offset of the string.
        offset: u64,
    },
    /// The stream header named an unsupported format.
    #[error("unsupported stream header {found:?}")]
    UnsupportedHeader {
        /// Header payload found in the stream.
        found: String,
    },
    /// The stream did not begin with a reset marker.
    #[error("stream starts with {found:#04x} instead of a reset marker")]
    MissingReset {
        /// First byte of the stream.
        found: u8,
    },
}
