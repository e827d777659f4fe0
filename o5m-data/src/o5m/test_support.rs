//! Minimal `o5m` encoder used to build decoder inputs in tests.
//!
//! The encoder keeps the same delta and string-table state a real writer
//! would, so the bytes it produces exercise back-references and running
//! deltas exactly like files produced by `osmconvert`.

use o5m_core::MemberKind;

use super::strings::{MAX_STORED_LEN, STRING_TABLE_SIZE};
use super::varint::{encode_signed, encode_unsigned};

/// Version block attached to subsequent elements.
#[derive(Debug, Clone)]
pub(crate) struct Author {
    pub(crate) version: u64,
    pub(crate) timestamp: i64,
    pub(crate) changeset: i64,
    pub(crate) uid: u64,
    pub(crate) user: String,
}

#[derive(Debug, Default)]
struct WriterDeltas {
    node_id: i64,
    way_id: i64,
    relation_id: i64,
    way_node: i64,
    members: [i64; 4],
    lat: i32,
    lon: i32,
    timestamp: i64,
    changeset: i64,
}

#[derive(Debug, Default)]
pub(crate) struct O5mWriter {
    bytes: Vec<u8>,
    deltas: WriterDeltas,
    table: Vec<(Vec<u8>, Vec<u8>)>,
    author: Option<Author>,
}

const fn member_slot(kind: MemberKind) -> (usize, u8) {
    match kind {
        MemberKind::Node => (0, b'0'),
        MemberKind::Way => (1, b'1'),
        MemberKind::Relation => (2, b'2'),
        MemberKind::Unknown(byte) => (3, byte),
    }
}

fn delta(counter: &mut i64, value: i64) -> i64 {
    let step = value.wrapping_sub(*counter);
    *counter = value;
    step
}

impl O5mWriter {
    /// Start a stream with a reset marker and an `o5m2` header.
    pub(crate) fn new() -> Self {
        let mut writer = Self::without_header();
        writer.dataset(0xe0, b"o5m2");
        writer
    }

    /// Start a stream with only the reset marker.
    pub(crate) fn without_header() -> Self {
        Self {
            bytes: vec![0xff],
            ..Self::default()
        }
    }

    pub(crate) fn with_author(mut self, author: Author) -> Self {
        self.author = Some(author);
        self
    }

    /// Emit a reset marker and forget all encoder state.
    pub(crate) fn reset(&mut self) -> &mut Self {
        self.bytes.push(0xff);
        self.deltas = WriterDeltas::default();
        self.table.clear();
        self
    }

    /// Emit a raw single byte such as a sync marker.
    pub(crate) fn raw_byte(&mut self, byte: u8) -> &mut Self {
        self.bytes.push(byte);
        self
    }

    /// Emit a length-prefixed dataset with an arbitrary payload.
    pub(crate) fn dataset(&mut self, kind: u8, payload: &[u8]) -> &mut Self {
        self.bytes.push(kind);
        encode_unsigned(u64::try_from(payload.len()).unwrap_or_default(), &mut self.bytes);
        self.bytes.extend_from_slice(payload);
        self
    }

    pub(crate) fn node(
        &mut self,
        id: i64,
        position: Option<(i32, i32)>,
        tags: &[(&str, &str)],
    ) -> &mut Self {
        let mut payload = Vec::new();
        encode_signed(delta(&mut self.deltas.node_id, id), &mut payload);
        self.version(&mut payload);
        if let Some((lat, lon)) = position {
            encode_signed(i64::from(lon.wrapping_sub(self.deltas.lon)), &mut payload);
            encode_signed(i64::from(lat.wrapping_sub(self.deltas.lat)), &mut payload);
            self.deltas.lon = lon;
            self.deltas.lat = lat;
        }
        self.tags(tags, &mut payload);
        self.dataset(0x10, &payload)
    }

    pub(crate) fn way(&mut self, id: i64, refs: &[i64], tags: &[(&str, &str)]) -> &mut Self {
        let mut payload = Vec::new();
        encode_signed(delta(&mut self.deltas.way_id, id), &mut payload);
        self.version(&mut payload);
        let mut section = Vec::new();
        for node in refs {
            encode_signed(delta(&mut self.deltas.way_node, *node), &mut section);
        }
        encode_unsigned(u64::try_from(section.len()).unwrap_or_default(), &mut payload);
        payload.extend_from_slice(&section);
        self.tags(tags, &mut payload);
        self.dataset(0x11, &payload)
    }

    /// A way carrying only its id and version, as deletions do in change
    /// files.
    pub(crate) fn deleted_way(&mut self, id: i64) -> &mut Self {
        let mut payload = Vec::new();
        encode_signed(delta(&mut self.deltas.way_id, id), &mut payload);
        self.version(&mut payload);
        self.dataset(0x11, &payload)
    }

    pub(crate) fn relation(
        &mut self,
        id: i64,
        members: &[(MemberKind, i64, &str)],
        tags: &[(&str, &str)],
    ) -> &mut Self {
        let mut payload = Vec::new();
        encode_signed(delta(&mut self.deltas.relation_id, id), &mut payload);
        self.version(&mut payload);
        let mut section = Vec::new();
        for (kind, member, role) in members {
            let (slot, type_byte) = member_slot(*kind);
            let counter = self.deltas.members.get_mut(slot).expect("member slot in range");
            encode_signed(delta(counter, *member), &mut section);
            let mut type_role = vec![type_byte];
            type_role.extend_from_slice(role.as_bytes());
            self.string(&type_role, None, &mut section);
        }
        encode_unsigned(u64::try_from(section.len()).unwrap_or_default(), &mut payload);
        payload.extend_from_slice(&section);
        self.tags(tags, &mut payload);
        self.dataset(0x12, &payload)
    }

    /// Finish with an end-of-file marker.
    pub(crate) fn finish(&mut self) -> Vec<u8> {
        self.bytes.push(0xfe);
        std::mem::take(&mut self.bytes)
    }

    /// Finish without an end-of-file marker.
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    fn version(&mut self, payload: &mut Vec<u8>) {
        let Some(author) = self.author.clone() else {
            payload.push(0);
            return;
        };
        encode_unsigned(author.version, payload);
        encode_signed(delta(&mut self.deltas.timestamp, author.timestamp), payload);
        if author.timestamp != 0 {
            encode_signed(delta(&mut self.deltas.changeset, author.changeset), payload);
            let mut uid = Vec::new();
            encode_unsigned(author.uid, &mut uid);
            self.string(&uid, Some(author.user.as_bytes()), payload);
        }
    }

    fn tags(&mut self, tags: &[(&str, &str)], payload: &mut Vec<u8>) {
        for (key, value) in tags {
            self.string(key.as_bytes(), Some(value.as_bytes()), payload);
        }
    }

    fn string(&mut self, first: &[u8], second: Option<&[u8]>, out: &mut Vec<u8>) {
        let stored_second = second.unwrap_or_default();
        let newest_first = self
            .table
            .iter()
            .rev()
            .position(|(a, b)| a == first && b == stored_second);
        if let Some(index) = newest_first {
            encode_unsigned(u64::try_from(index + 1).unwrap_or_default(), out);
            return;
        }
        out.push(0);
        out.extend_from_slice(first);
        out.push(0);
        if let Some(second) = second {
            out.extend_from_slice(second);
            out.push(0);
        }
        if first.len() + stored_second.len() <= MAX_STORED_LEN {
            if self.table.len() == STRING_TABLE_SIZE {
                self.table.remove(0);
            }
            self.table.push((first.to_vec(), stored_second.to_vec()));
        }
    }
}
