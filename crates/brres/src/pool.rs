//! Deduplicating string pool shared by a whole container.
//!
//! Every name and string referenced anywhere in a container is stored
//! exactly once in a table at the tail of the file. On the wire each
//! string is a 4-byte big-endian length, the bytes, a NUL terminator,
//! and padding to the next 4-byte boundary; references point at the
//! first character, past the length prefix.

use byteorder::{BigEndian, ByteOrder};
use indexmap::IndexMap;

/// Opaque handle to a pooled string, valid for the pool that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringToken(usize);

/// Wire size of a string record: length prefix, bytes, NUL.
fn record_len(s: &[u8]) -> u32 {
    4 + s.len() as u32 + 1
}

fn align_up(at: u32, alignment: u32) -> u32 {
    at.div_ceil(alignment) * alignment
}

/// Insertion-ordered pool of unique strings. Offsets exist only after
/// [`StringPool::finalize`]; inserting after that point is a contract
/// violation.
#[derive(Debug, Default)]
pub struct StringPool {
    strings: IndexMap<Vec<u8>, Option<u32>>,
    finalized: bool,
    end: u32,
}

impl StringPool {
    pub fn new() -> StringPool {
        StringPool::default()
    }

    /// Number of unique strings held.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Insert `s`, returning the same token for repeated content.
    pub fn insert(&mut self, s: &[u8]) -> StringToken {
        assert!(!self.finalized, "insert into a finalized pool");
        if let Some(index) = self.strings.get_index_of(s) {
            return StringToken(index);
        }
        let (index, _) = self.strings.insert_full(s.to_vec(), None);
        StringToken(index)
    }

    /// Assign every string an absolute offset, in insertion order,
    /// starting at `base` aligned to `alignment`. Returns the offset one
    /// past the last record, which equals `base` for an empty pool.
    pub fn finalize(&mut self, base: u32, alignment: u32) -> u32 {
        assert!(!self.finalized, "pool finalized twice");
        self.finalized = true;

        if self.strings.is_empty() {
            self.end = base;
            return base;
        }

        let mut at = align_up(base, alignment.max(1));
        for (s, slot) in self.strings.iter_mut() {
            at = align_up(at, 4);
            // references point past the length prefix
            *slot = Some(at + 4);
            at += record_len(s);
        }
        self.end = at;
        at
    }

    /// Offset one past the last record.
    ///
    /// # Panics
    ///
    /// Panics when the pool is not finalized.
    pub fn end(&self) -> u32 {
        assert!(self.finalized, "pool layout not finalized");
        self.end
    }

    /// Absolute offset of the string behind `token`.
    ///
    /// # Panics
    ///
    /// Resolving before [`StringPool::finalize`] is a contract violation.
    pub fn resolve(&self, token: StringToken) -> u32 {
        let (_, slot) = self
            .strings
            .get_index(token.0)
            .expect("token from a different pool");
        slot.expect("resolve before the pool layout is finalized")
    }

    /// Absolute offset of the string with content `s`, if pooled.
    ///
    /// # Panics
    ///
    /// Resolving before [`StringPool::finalize`] is a contract violation.
    pub fn resolve_bytes(&self, s: &[u8]) -> Option<u32> {
        self.strings
            .get(s)
            .map(|slot| slot.expect("resolve before the pool layout is finalized"))
    }

    /// Append every record to `out`, zero-padding from the current end of
    /// `out` up to each record's assigned offset.
    pub fn emit(&self, out: &mut Vec<u8>) {
        assert!(self.finalized, "emit before the pool layout is finalized");
        for (s, slot) in &self.strings {
            let start = slot.expect("finalized pool holds offsets") as usize - 4;
            debug_assert!(out.len() <= start);
            out.resize(start, 0);

            let mut prefix = [0u8; 4];
            BigEndian::write_u32(&mut prefix, s.len() as u32);
            out.extend_from_slice(&prefix);
            out.extend_from_slice(s);
            out.push(0);
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::StringPool;

    #[test]
    fn insert_is_idempotent() {
        let mut pool = StringPool::new();
        let a = pool.insert(b"course");
        let b = pool.insert(b"vrcorn");
        let c = pool.insert(b"course");

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn finalize_assigns_offsets_in_insertion_order() {
        let mut pool = StringPool::new();
        let b = pool.insert(b"b.bin");
        let aa = pool.insert(b"aa.bin");
        let c = pool.insert(b"c.bin");

        let end = pool.finalize(0xA4, 0x20);

        // records at 0xC0, 0xCC, 0xD8; references point past the prefix
        assert_eq!(pool.resolve(b), 0xC4);
        assert_eq!(pool.resolve(aa), 0xD0);
        assert_eq!(pool.resolve(c), 0xDC);
        assert_eq!(end, 0xE2);
        assert_eq!(pool.end(), 0xE2);

        assert_eq!(pool.resolve_bytes(b"aa.bin"), Some(0xD0));
        assert_eq!(pool.resolve_bytes(b"missing"), None);
    }

    #[test]
    fn finalize_of_empty_pool_adds_no_padding() {
        let mut pool = StringPool::new();
        assert_eq!(pool.finalize(0x30, 0x20), 0x30);
    }

    #[test]
    fn emit_writes_length_prefixed_records() {
        let mut pool = StringPool::new();
        pool.insert(b"ab");
        pool.insert(b"c");
        pool.finalize(0, 4);

        let mut out = Vec::new();
        pool.emit(&mut out);

        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x02,
            b'a', b'b', 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01,
            b'c', 0x00,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    #[should_panic(expected = "finalized")]
    fn resolve_before_finalize_panics() {
        let mut pool = StringPool::new();
        let token = pool.insert(b"early");
        pool.resolve(token);
    }

    #[test]
    #[should_panic(expected = "finalized")]
    fn insert_after_finalize_panics() {
        let mut pool = StringPool::new();
        pool.finalize(0, 4);
        pool.insert(b"late");
    }
}
