//! Streaming decoder for the `o5m` OpenStreetMap exchange format.
//!
//! The reader loads one length-prefixed dataset at a time and resolves every
//! delta-coded identifier and coordinate before handing it out through the
//! [`ElementSource`] protocol. Skipped sub-sequences are still decoded
//! internally, because the delta state and the string table depend on every
//! byte of the stream.

mod strings;
mod varint;

#[cfg(test)]
pub(crate) mod test_support;

use std::{
    io::{ErrorKind, Read},
    ops::Range,
};

use log::debug;
use o5m_core::{DecodeError, Element, ElementSource, FixedCoordinate, Member, MemberKind, Tag};

use strings::StringTable;
use varint::{MAX_VARINT_LEN, VarintError, decode_signed, decode_unsigned};

const RESET: u8 = 0xff;
const END_OF_FILE: u8 = 0xfe;
const NODE: u8 = 0x10;
const WAY: u8 = 0x11;
const RELATION: u8 = 0x12;
const BOUNDING_BOX: u8 = 0xdb;
const FILE_TIMESTAMP: u8 = 0xdc;
const HEADER: u8 = 0xe0;
const SYNC: u8 = 0xee;
const JUMP: u8 = 0xef;

/// Datasets larger than this are rejected rather than buffered.
const MAX_DATASET_LEN: u64 = 1 << 28;

const SUPPORTED_HEADERS: [&[u8]; 2] = [b"o5m2", b"o5c2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    WayNodes,
    Members,
    Tags,
}

#[derive(Debug, Clone)]
enum StringSlot {
    Inline {
        start: usize,
        first: Range<usize>,
        second: Range<usize>,
    },
    Stored {
        start: usize,
        reference: u64,
    },
}

impl StringSlot {
    const fn start(&self) -> usize {
        match self {
            Self::Inline { start, .. } | Self::Stored { start, .. } => *start,
        }
    }
}

/// Running values that delta-coded fields are relative to.
#[derive(Debug, Default)]
struct DeltaState {
    node_id: i64,
    way_id: i64,
    relation_id: i64,
    way_node: i64,
    member_node: i64,
    member_way: i64,
    member_relation: i64,
    member_unknown: i64,
    lat: i32,
    lon: i32,
    timestamp: i64,
    changeset: i64,
}

impl DeltaState {
    const fn member_counter(&mut self, kind: MemberKind) -> &mut i64 {
        match kind {
            MemberKind::Node => &mut self.member_node,
            MemberKind::Way => &mut self.member_way,
            MemberKind::Relation => &mut self.member_relation,
            MemberKind::Unknown(_) => &mut self.member_unknown,
        }
    }
}

fn apply_delta(counter: &mut i64, delta: i64) -> i64 {
    *counter = counter.wrapping_add(delta);
    *counter
}

const fn member_kind(type_byte: u8) -> MemberKind {
    match type_byte {
        b'0' => MemberKind::Node,
        b'1' => MemberKind::Way,
        b'2' => MemberKind::Relation,
        other => MemberKind::Unknown(other),
    }
}

fn widen(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn text(bytes: &[u8], offset: u64) -> Result<&str, DecodeError> {
    std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { offset })
}

/// Forward-only `o5m` decoder implementing [`ElementSource`].
///
/// Wrap file handles in a [`std::io::BufReader`]; the reader issues many
/// single-byte reads between datasets.
///
/// # Examples
///
/// ```
/// use o5m_core::{Element, ElementSource};
/// use o5m_data::O5mReader;
///
/// // reset, header "o5m2", one node (id 1, lon 11.5, lat 48.1), end of file
/// let bytes: &[u8] = &[
///     0xff, 0xe0, 0x04, b'o', b'5', b'm', b'2',
///     0x10, 0x0b, 0x02, 0x00, 0x80, 0x8b, 0xd6, 0x6d, 0x80, 0xe9, 0xdb, 0xca, 0x03,
///     0xfe,
/// ];
/// let mut reader = O5mReader::new(bytes);
/// let element = reader.next_element()?;
/// let Some(Element::Node { id, coordinate: Some(coordinate) }) = element else {
///     panic!("expected a positioned node, got {element:?}");
/// };
/// assert_eq!(id, 1);
/// assert_eq!(coordinate.lat_degrees(), 48.1);
/// assert_eq!(coordinate.lon_degrees(), 11.5);
/// assert!(reader.next_element()?.is_none());
/// # Ok::<(), o5m_core::DecodeError>(())
/// ```
#[derive(Debug)]
pub struct O5mReader<R> {
    input: R,
    consumed: u64,
    buffer: Vec<u8>,
    payload_offset: u64,
    position: usize,
    section_end: usize,
    phase: Phase,
    deltas: DeltaState,
    strings: StringTable,
    started: bool,
    finished: bool,
}

impl<R: Read> O5mReader<R> {
    /// Create a reader positioned at the start of an `o5m` stream.
    pub fn new(input: R) -> Self {
        Self {
            input,
            consumed: 0,
            buffer: Vec::new(),
            payload_offset: 0,
            position: 0,
            section_end: 0,
            phase: Phase::Idle,
            deltas: DeltaState::default(),
            strings: StringTable::default(),
            started: false,
            finished: false,
        }
    }

    /// Number of bytes consumed from the input so far.
    pub const fn bytes_read(&self) -> u64 {
        self.consumed
    }

    fn offset_at(&self, position: usize) -> u64 {
        self.payload_offset.saturating_add(widen(position))
    }

    fn read_byte(&mut self) -> Result<Option<u8>, DecodeError> {
        let mut byte = [0_u8; 1];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.consumed += 1;
                    let [value] = byte;
                    return Ok(Some(value));
                }
                Err(source) if source.kind() == ErrorKind::Interrupted => {}
                Err(source) => return Err(DecodeError::Io { source }),
            }
        }
    }

    fn reset(&mut self) {
        self.deltas = DeltaState::default();
        self.strings.clear();
    }

    fn start_stream(&mut self) -> Result<(), DecodeError> {
        let first = self.read_byte()?.ok_or(DecodeError::Truncated {
            context: "stream header",
            offset: 0,
        })?;
        if first != RESET {
            return Err(DecodeError::MissingReset { found: first });
        }
        self.reset();
        self.started = true;
        Ok(())
    }

    fn read_length(&mut self, start: u64) -> Result<usize, DecodeError> {
        let mut raw = [0_u8; MAX_VARINT_LEN];
        let mut filled = 0;
        loop {
            let byte = self.read_byte()?.ok_or(DecodeError::Truncated {
                context: "dataset length",
                offset: start,
            })?;
            let slot = raw.get_mut(filled).ok_or(DecodeError::Malformed {
                context: "dataset length",
                offset: start,
            })?;
            *slot = byte;
            filled += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }
        let mut position = 0;
        let malformed = DecodeError::Malformed {
            context: "dataset length",
            offset: start,
        };
        let length = decode_unsigned(raw.get(..filled).unwrap_or_default(), &mut position)
            .ok()
            .filter(|length| *length <= MAX_DATASET_LEN);
        length
            .and_then(|length| usize::try_from(length).ok())
            .ok_or(malformed)
    }

    fn load_payload(&mut self, start: u64) -> Result<(), DecodeError> {
        let length = self.read_length(start)?;
        self.buffer.clear();
        self.buffer.resize(length, 0);
        self.input
            .read_exact(&mut self.buffer)
            .map_err(|source| match source.kind() {
                ErrorKind::UnexpectedEof => DecodeError::Truncated {
                    context: "dataset",
                    offset: start,
                },
                _ => DecodeError::Io { source },
            })?;
        self.payload_offset = self.consumed;
        self.consumed = self.consumed.saturating_add(widen(length));
        self.position = 0;
        self.section_end = length;
        self.phase = Phase::Idle;
        Ok(())
    }

    fn varint_error(&self, error: VarintError, context: &'static str, start: usize) -> DecodeError {
        let offset = self.offset_at(start);
        match error {
            VarintError::Truncated => DecodeError::Truncated { context, offset },
            VarintError::Overflow => DecodeError::Malformed { context, offset },
        }
    }

    fn unsigned(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        let start = self.position;
        let bytes = self.buffer.get(..self.section_end).unwrap_or_default();
        decode_unsigned(bytes, &mut self.position)
            .map_err(|error| self.varint_error(error, context, start))
    }

    fn signed(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        let start = self.position;
        let bytes = self.buffer.get(..self.section_end).unwrap_or_default();
        decode_signed(bytes, &mut self.position)
            .map_err(|error| self.varint_error(error, context, start))
    }

    fn terminated(&mut self, context: &'static str) -> Result<Range<usize>, DecodeError> {
        let start = self.position;
        let length = self
            .buffer
            .get(start..self.section_end)
            .and_then(|window| window.iter().position(|byte| *byte == 0))
            .ok_or(DecodeError::Truncated {
                context,
                offset: self.offset_at(start),
            })?;
        self.position = start + length + 1;
        Ok(start..start + length)
    }

    /// Read an inline string (pair) or a back-reference to a stored one.
    fn read_string(
        &mut self,
        pair: bool,
        context: &'static str,
    ) -> Result<StringSlot, DecodeError> {
        let start = self.position;
        let lead = self
            .buffer
            .get(start)
            .copied()
            .filter(|_| start < self.section_end)
            .ok_or(DecodeError::Truncated {
                context,
                offset: self.offset_at(start),
            })?;
        if lead != 0 {
            let reference = self.unsigned(context)?;
            if self.strings.get(reference).is_none() {
                return Err(DecodeError::InvalidStringReference {
                    reference,
                    available: self.strings.len(),
                    offset: self.offset_at(start),
                });
            }
            return Ok(StringSlot::Stored { start, reference });
        }
        self.position += 1;
        let first = self.terminated(context)?;
        let second = if pair {
            self.terminated(context)?
        } else {
            first.end..first.end
        };
        let first_bytes = self.buffer.get(first.clone()).unwrap_or_default();
        let second_bytes = self.buffer.get(second.clone()).unwrap_or_default();
        self.strings.push(first_bytes, second_bytes);
        Ok(StringSlot::Inline {
            start,
            first,
            second,
        })
    }

    fn resolve(&self, slot: &StringSlot) -> Result<(&[u8], &[u8]), DecodeError> {
        match slot {
            StringSlot::Inline { first, second, .. } => Ok((
                self.buffer.get(first.clone()).unwrap_or_default(),
                self.buffer.get(second.clone()).unwrap_or_default(),
            )),
            StringSlot::Stored { start, reference } => {
                self.strings
                    .get(*reference)
                    .ok_or(DecodeError::InvalidStringReference {
                        reference: *reference,
                        available: self.strings.len(),
                        offset: self.offset_at(*start),
                    })
            }
        }
    }

    /// Version, timestamp, changeset and author are decoded for their side
    /// effects on the delta state and string table, then dropped.
    fn skip_version(&mut self) -> Result<(), DecodeError> {
        if self.unsigned("version")? == 0 {
            return Ok(());
        }
        let timestamp = self.signed("timestamp")?;
        if apply_delta(&mut self.deltas.timestamp, timestamp) == 0 {
            return Ok(());
        }
        let changeset = self.signed("changeset")?;
        apply_delta(&mut self.deltas.changeset, changeset);
        self.read_string(true, "author").map(|_| ())
    }

    fn coordinate_delta(&mut self) -> Result<i32, DecodeError> {
        let start = self.position;
        let delta = self.signed("coordinate")?;
        i32::try_from(delta).map_err(|_| DecodeError::Malformed {
            context: "coordinate",
            offset: self.offset_at(start),
        })
    }

    fn begin_node(&mut self) -> Result<Element, DecodeError> {
        let delta = self.signed("node id")?;
        let id = apply_delta(&mut self.deltas.node_id, delta);
        self.skip_version()?;
        let coordinate = if self.position < self.section_end {
            let lon = self.coordinate_delta()?;
            let lat = self.coordinate_delta()?;
            self.deltas.lon = self.deltas.lon.wrapping_add(lon);
            self.deltas.lat = self.deltas.lat.wrapping_add(lat);
            Some(FixedCoordinate::new(self.deltas.lat, self.deltas.lon))
        } else {
            None
        };
        self.phase = Phase::Tags;
        Ok(Element::Node { id, coordinate })
    }

    fn begin_way(&mut self) -> Result<Element, DecodeError> {
        let delta = self.signed("way id")?;
        let id = apply_delta(&mut self.deltas.way_id, delta);
        self.skip_version()?;
        self.open_reference_section(Phase::WayNodes)?;
        Ok(Element::Way { id })
    }

    fn begin_relation(&mut self) -> Result<Element, DecodeError> {
        let delta = self.signed("relation id")?;
        let id = apply_delta(&mut self.deltas.relation_id, delta);
        self.skip_version()?;
        self.open_reference_section(Phase::Members)?;
        Ok(Element::Relation { id })
    }

    /// Ways and relations without a reference section are deletions in
    /// change files and carry neither members nor tags.
    fn open_reference_section(&mut self, phase: Phase) -> Result<(), DecodeError> {
        if self.position >= self.buffer.len() {
            self.phase = Phase::Idle;
            return Ok(());
        }
        let start = self.position;
        let length = self.unsigned("reference section length")?;
        let end = usize::try_from(length)
            .ok()
            .and_then(|length| self.position.checked_add(length))
            .filter(|end| *end <= self.buffer.len())
            .ok_or(DecodeError::Truncated {
                context: "reference section",
                offset: self.offset_at(start),
            })?;
        self.section_end = end;
        self.phase = phase;
        Ok(())
    }

    fn check_header(&self) -> Result<(), DecodeError> {
        if SUPPORTED_HEADERS.contains(&self.buffer.as_slice()) {
            Ok(())
        } else {
            Err(DecodeError::UnsupportedHeader {
                found: String::from_utf8_lossy(&self.buffer).into_owned(),
            })
        }
    }

    fn enter_tags(&mut self) {
        self.section_end = self.buffer.len();
        self.phase = Phase::Tags;
    }

    fn advance_way_node(&mut self) -> Result<Option<i64>, DecodeError> {
        if self.phase != Phase::WayNodes {
            return Ok(None);
        }
        if self.position >= self.section_end {
            self.enter_tags();
            return Ok(None);
        }
        let delta = self.signed("way node reference")?;
        Ok(Some(apply_delta(&mut self.deltas.way_node, delta)))
    }

    fn advance_member(&mut self) -> Result<Option<(MemberKind, i64, StringSlot)>, DecodeError> {
        if self.phase != Phase::Members {
            return Ok(None);
        }
        if self.position >= self.section_end {
            self.enter_tags();
            return Ok(None);
        }
        let delta = self.signed("relation member reference")?;
        let slot = self.read_string(false, "relation member type")?;
        let (type_role, _) = self.resolve(&slot)?;
        let kind = type_role
            .first()
            .copied()
            .map(member_kind)
            .ok_or(DecodeError::Malformed {
                context: "relation member type",
                offset: self.offset_at(slot.start()),
            })?;
        let id = apply_delta(self.deltas.member_counter(kind), delta);
        Ok(Some((kind, id, slot)))
    }

    fn advance_tag(&mut self) -> Result<Option<StringSlot>, DecodeError> {
        match self.phase {
            Phase::WayNodes => while self.advance_way_node()?.is_some() {},
            Phase::Members => while self.advance_member()?.is_some() {},
            Phase::Tags | Phase::Idle => {}
        }
        if self.phase != Phase::Tags {
            return Ok(None);
        }
        if self.position >= self.section_end {
            self.phase = Phase::Idle;
            return Ok(None);
        }
        self.read_string(true, "tag").map(Some)
    }

    fn drain_current(&mut self) -> Result<(), DecodeError> {
        while self.advance_tag()?.is_some() {}
        self.phase = Phase::Idle;
        Ok(())
    }
}

impl<R: Read> ElementSource for O5mReader<R> {
    fn next_element(&mut self) -> Result<Option<Element>, DecodeError> {
        self.drain_current()?;
        if !self.started {
            self.start_stream()?;
        }
        while !self.finished {
            let start = self.consumed;
            let Some(kind) = self.read_byte()? else {
                self.finished = true;
                break;
            };
            match kind {
                RESET => self.reset(),
                END_OF_FILE => self.finished = true,
                0xf0..=0xfd => debug!("skipping single-byte dataset {kind:#04x} at offset {start}"),
                _ => {
                    self.load_payload(start)?;
                    match kind {
                        NODE => return self.begin_node().map(Some),
                        WAY => return self.begin_way().map(Some),
                        RELATION => return self.begin_relation().map(Some),
                        HEADER => self.check_header()?,
                        BOUNDING_BOX | FILE_TIMESTAMP | SYNC | JUMP => {}
                        other => return Ok(Some(Element::Unknown { kind: other })),
                    }
                }
            }
        }
        Ok(None)
    }

    fn next_tag(&mut self) -> Result<Option<Tag<'_>>, DecodeError> {
        let Some(slot) = self.advance_tag()? else {
            return Ok(None);
        };
        let offset = self.offset_at(slot.start());
        let (key, value) = self.resolve(&slot)?;
        Ok(Some(Tag {
            key: text(key, offset)?,
            value: text(value, offset)?,
        }))
    }

    fn next_way_node(&mut self) -> Result<Option<i64>, DecodeError> {
        self.advance_way_node()
    }

    fn next_member(&mut self) -> Result<Option<Member<'_>>, DecodeError> {
        let Some((kind, id, slot)) = self.advance_member()? else {
            return Ok(None);
        };
        let offset = self.offset_at(slot.start());
        let (type_role, _) = self.resolve(&slot)?;
        let role = text(type_role.get(1..).unwrap_or_default(), offset)?;
        Ok(Some(Member { kind, id, role }))
    }
}
