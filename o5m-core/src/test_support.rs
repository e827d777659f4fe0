//! In-memory element source for tests and benchmarks.
//!
//! `MemoryElementSource` replays a scripted list of elements through the
//! [`ElementSource`] protocol. It mirrors the single-pass behaviour of a real
//! decoder: reading a later sub-sequence abandons the earlier one, and
//! abandoned entries are counted so tests can assert that consumers drain
//! every sub-sequence.

use std::collections::VecDeque;

use crate::{
    DecodeError, Element, ElementSource, FixedCoordinate, Member, MemberKind, SectionOrder, Tag,
};

/// A scripted element with its tags and members.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryElement {
    /// The element header.
    pub element: Element,
    /// Tags in stream order.
    pub tags: Vec<(String, String)>,
    /// Node references of a way, in stream order.
    pub way_nodes: Vec<i64>,
    /// Members of a relation, in stream order.
    pub members: Vec<(MemberKind, i64, String)>,
}

impl MemoryElement {
    fn bare(element: Element) -> Self {
        Self {
            element,
            tags: Vec::new(),
            way_nodes: Vec::new(),
            members: Vec::new(),
        }
    }

    /// A node at the given fixed-point latitude and longitude.
    #[must_use]
    pub fn node(id: i64, lat: i32, lon: i32) -> Self {
        Self::bare(Element::Node {
            id,
            coordinate: Some(FixedCoordinate::new(lat, lon)),
        })
    }

    /// A node without a position.
    #[must_use]
    pub fn node_without_coordinate(id: i64) -> Self {
        Self::bare(Element::Node {
            id,
            coordinate: None,
        })
    }

    /// A way referencing `refs` in order.
    #[must_use]
    pub fn way(id: i64, refs: impl IntoIterator<Item = i64>) -> Self {
        Self {
            way_nodes: refs.into_iter().collect(),
            ..Self::bare(Element::Way { id })
        }
    }

    /// A relation with `(kind, id, role)` members in order.
    #[must_use]
    pub fn relation<'a>(
        id: i64,
        members: impl IntoIterator<Item = (MemberKind, i64, &'a str)>,
    ) -> Self {
        Self {
            members: members
                .into_iter()
                .map(|(kind, member_id, role)| (kind, member_id, role.to_owned()))
                .collect(),
            ..Self::bare(Element::Relation { id })
        }
    }

    /// An element the consumer does not understand.
    #[must_use]
    pub fn unknown(kind: u8) -> Self {
        Self::bare(Element::Unknown { kind })
    }

    /// Append a tag.
    #[must_use]
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.push((key.to_owned(), value.to_owned()));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Members,
    Tags,
}

#[derive(Debug)]
struct Cursor {
    entry: MemoryElement,
    sections: Vec<Section>,
    position: usize,
    consumed: usize,
}

impl Cursor {
    fn new(entry: MemoryElement, order: SectionOrder) -> Self {
        let sections = match (entry.element, order) {
            (Element::Way { .. } | Element::Relation { .. }, SectionOrder::MembersFirst) => {
                vec![Section::Members, Section::Tags]
            }
            (Element::Way { .. } | Element::Relation { .. }, SectionOrder::TagsFirst) => {
                vec![Section::Tags, Section::Members]
            }
            (Element::Node { .. }, _) => vec![Section::Tags],
            (Element::Unknown { .. }, _) => Vec::new(),
        };
        Self {
            entry,
            sections,
            position: 0,
            consumed: 0,
        }
    }

    fn section_len(&self, section: Section) -> usize {
        match (section, self.entry.element) {
            (Section::Tags, _) => self.entry.tags.len(),
            (Section::Members, Element::Way { .. }) => self.entry.way_nodes.len(),
            (Section::Members, Element::Relation { .. }) => self.entry.members.len(),
            (Section::Members, _) => 0,
        }
    }

    fn remaining_in_current(&self) -> usize {
        self.sections
            .get(self.position)
            .map_or(0, |section| self.section_len(*section) - self.consumed)
    }

    /// Position the cursor on `section` and return the index of the next item,
    /// or `None` once the section is exhausted or already passed.
    fn advance(&mut self, section: Section, abandoned: &mut usize) -> Option<usize> {
        let target = self.sections.iter().position(|candidate| *candidate == section)?;
        while self.position < target {
            *abandoned += self.remaining_in_current();
            self.position += 1;
            self.consumed = 0;
        }
        if self.position > target {
            return None;
        }
        if self.consumed < self.section_len(section) {
            let index = self.consumed;
            self.consumed += 1;
            Some(index)
        } else {
            self.position += 1;
            self.consumed = 0;
            None
        }
    }

    fn abandoned_on_drop(&self) -> usize {
        let current = self.remaining_in_current();
        let later: usize = self
            .sections
            .iter()
            .skip(self.position + 1)
            .map(|section| self.section_len(*section))
            .sum();
        current + later
    }
}

/// Scripted [`ElementSource`] backed by a list of [`MemoryElement`]s.
#[derive(Debug)]
pub struct MemoryElementSource {
    pending: VecDeque<MemoryElement>,
    current: Option<Cursor>,
    order: SectionOrder,
    emitted: usize,
    abandoned: usize,
    fail_at: Option<(usize, usize)>,
}

impl MemoryElementSource {
    /// Build a source replaying `elements` with members before tags.
    #[must_use]
    pub fn new(elements: impl IntoIterator<Item = MemoryElement>) -> Self {
        Self {
            pending: elements.into_iter().collect(),
            current: None,
            order: SectionOrder::MembersFirst,
            emitted: 0,
            abandoned: 0,
            fail_at: None,
        }
    }

    /// Expose sub-sequences in the given order.
    #[must_use]
    pub const fn with_section_order(mut self, order: SectionOrder) -> Self {
        self.order = order;
        self
    }

    /// Fail with [`DecodeError::Truncated`] when the tag at `tag_index` of the
    /// element at `element_index` (both zero-based) is requested.
    #[must_use]
    pub const fn failing_at_tag(mut self, element_index: usize, tag_index: usize) -> Self {
        self.fail_at = Some((element_index, tag_index));
        self
    }

    /// Number of tags, way nodes and members that were skipped without being
    /// read.
    #[must_use]
    pub const fn abandoned(&self) -> usize {
        self.abandoned
    }

    const fn current_index(&self) -> usize {
        self.emitted.saturating_sub(1)
    }
}

impl ElementSource for MemoryElementSource {
    fn next_element(&mut self) -> Result<Option<Element>, DecodeError> {
        if let Some(previous) = self.current.take() {
            self.abandoned += previous.abandoned_on_drop();
        }
        let Some(entry) = self.pending.pop_front() else {
            return Ok(None);
        };
        let element = entry.element;
        self.current = Some(Cursor::new(entry, self.order));
        self.emitted += 1;
        Ok(Some(element))
    }

    fn next_tag(&mut self) -> Result<Option<Tag<'_>>, DecodeError> {
        let element_index = self.current_index();
        let Some(cursor) = self.current.as_mut() else {
            return Ok(None);
        };
        let Some(index) = cursor.advance(Section::Tags, &mut self.abandoned) else {
            return Ok(None);
        };
        if self.fail_at == Some((element_index, index)) {
            return Err(DecodeError::Truncated {
                context: "tag",
                offset: 0,
            });
        }
        Ok(cursor.entry.tags.get(index).map(|(key, value)| Tag {
            key: key.as_str(),
            value: value.as_str(),
        }))
    }

    fn next_way_node(&mut self) -> Result<Option<i64>, DecodeError> {
        let Some(cursor) = self.current.as_mut() else {
            return Ok(None);
        };
        if !matches!(cursor.entry.element, Element::Way { .. }) {
            return Ok(None);
        }
        Ok(cursor
            .advance(Section::Members, &mut self.abandoned)
            .and_then(|index| cursor.entry.way_nodes.get(index).copied()))
    }

    fn next_member(&mut self) -> Result<Option<Member<'_>>, DecodeError> {
        let Some(cursor) = self.current.as_mut() else {
            return Ok(None);
        };
        if !matches!(cursor.entry.element, Element::Relation { .. }) {
            return Ok(None);
        }
        let Some(index) = cursor.advance(Section::Members, &mut self.abandoned) else {
            return Ok(None);
        };
        Ok(cursor
            .entry
            .members
            .get(index)
            .map(|(kind, id, role)| Member {
                kind: *kind,
                id: *id,
                role: role.as_str(),
            }))
    }

    fn section_order(&self) -> SectionOrder {
        self.order
    }
}
