//! Back-reference table for `o5m` strings.
//!
//! Inline strings short enough to be reused are appended to a ring of the
//! most recent 15 000 entries. A reference `n` addresses the `n`-th most
//! recently stored entry, starting at 1.

/// Capacity of the ring.
pub(crate) const STRING_TABLE_SIZE: usize = 15_000;

/// Longest combined length of a pair that is stored for reuse.
pub(crate) const MAX_STORED_LEN: usize = 250;

#[derive(Debug, Default)]
struct StoredString {
    bytes: Vec<u8>,
    split: usize,
}

#[derive(Debug, Default)]
pub(crate) struct StringTable {
    entries: Vec<StoredString>,
    next: usize,
}

impl StringTable {
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.next = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Store a pair; single strings pass an empty `second`.
    pub(crate) fn push(&mut self, first: &[u8], second: &[u8]) {
        if first.len() + second.len() > MAX_STORED_LEN {
            return;
        }
        if let Some(slot) = self.entries.get_mut(self.next) {
            slot.bytes.clear();
            slot.bytes.extend_from_slice(first);
            slot.bytes.extend_from_slice(second);
            slot.split = first.len();
        } else {
            let mut bytes = Vec::with_capacity(first.len() + second.len());
            bytes.extend_from_slice(first);
            bytes.extend_from_slice(second);
            self.entries.push(StoredString {
                bytes,
                split: first.len(),
            });
        }
        self.next += 1;
        if self.next == STRING_TABLE_SIZE {
            self.next = 0;
        }
    }

    pub(crate) fn get(&self, reference: u64) -> Option<(&[u8], &[u8])> {
        let reference = usize::try_from(reference).ok()?;
        if reference == 0 || reference > self.entries.len() {
            return None;
        }
        let index = if reference <= self.next {
            self.next - reference
        } else {
            STRING_TABLE_SIZE - (reference - self.next)
        };
        self.entries
            .get(index)
            .map(|entry| entry.bytes.split_at(entry.split))
    }
}
