//! Bit-discriminator trie indexing one directory group.
//!
//! The target platform's loader resolves names with a radix walk over the
//! entry records, so the exact discriminator encoding and link layout are
//! dictated by the on-disk format, not a design choice. Entries live in a
//! flat arena and link to each other through `u16` indices only; nodes are
//! inserted into a partially built structure, so the links may briefly
//! point at positions that are rewritten before the group is serialized.

use brres_sub::types::SENTINEL_ID;

/// Position of the most significant set bit of `byte`, counted from the
/// least significant end. Table-lookup semantics: a zero byte yields bit
/// zero, not "no bit".
pub fn highest_set_bit(byte: u8) -> u16 {
    if byte == 0 {
        0
    } else {
        7 - byte.leading_zeros() as u16
    }
}

/// Encoded bit position at which `cur` first differs from `prev`, scanning
/// bytes from the tail of the shorter name toward the head and bits from
/// most to least significant: `(byte_index << 3) | bit_index`.
///
/// When `prev` is shorter than `cur` the discriminator comes from the last
/// byte of `cur` alone. Byte-identical names yield [`SENTINEL_ID`].
pub fn discriminator(prev: &[u8], cur: &[u8]) -> u16 {
    if prev.len() < cur.len() {
        return ((cur.len() - 1) as u16) << 3 | highest_set_bit(cur[cur.len() - 1]);
    }

    for i in (0..cur.len()).rev() {
        if prev[i] != cur[i] {
            return (i as u16) << 3 | highest_set_bit(prev[i] ^ cur[i]);
        }
    }

    SENTINEL_ID
}

/// Test the bit addressed by `id` inside `name`; bits past the end of the
/// name read as zero.
fn id_bit(name: &[u8], id: u16) -> bool {
    let byte = (id >> 3) as usize;
    byte < name.len() && name[byte] >> (id & 7) & 1 == 1
}

/// One arena node of a directory trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieEntry {
    /// Bit discriminator, [`SENTINEL_ID`] for the sentinel at index 0
    pub id: u16,
    /// Arena index of the left child
    pub left: u16,
    /// Arena index of the right child
    pub right: u16,
    /// Entry name (empty for the sentinel)
    pub name: Vec<u8>,
}

/// One directory group under construction: the sentinel plus one node per
/// child, fully linked after every insertion.
#[derive(Debug, Clone)]
pub struct TrieGroup {
    entries: Vec<TrieEntry>,
}

impl Default for TrieGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl TrieGroup {
    /// An empty group holding only the root sentinel.
    pub fn new() -> TrieGroup {
        TrieGroup {
            entries: vec![TrieEntry {
                id: SENTINEL_ID,
                left: 0,
                right: 0,
                name: Vec::new(),
            }],
        }
    }

    /// All nodes including the sentinel at index 0.
    pub fn entries(&self) -> &[TrieEntry] {
        &self.entries
    }

    /// Number of nodes including the sentinel.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the group holds no real entry.
    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }

    /// Whether `name` was already inserted.
    pub fn contains(&self, name: &[u8]) -> bool {
        self.entries[1..].iter().any(|e| e.name == name)
    }

    /// Insert `name` and relink the trie around it, returning the new
    /// node's arena index.
    ///
    /// # Panics
    ///
    /// Inserting past the `u16` index space or inserting a name the group
    /// already holds is a contract violation; callers reject duplicates
    /// before insertion.
    pub fn insert(&mut self, name: impl Into<Vec<u8>>) -> u16 {
        let name = name.into();
        assert!(self.entries.len() < usize::from(u16::MAX), "group is full");
        debug_assert!(!self.contains(&name), "duplicate name in group");

        let index = self.entries.len() as u16;
        let mut id = discriminator(b"", &name);
        let mut left = index;
        let mut right = index;

        let mut prev_idx = 0u16;
        let mut curr_idx = self.entries[0].left;
        let mut is_right = false;

        loop {
            let prev_id = self.entries[prev_idx as usize].id;
            let curr_id = self.entries[curr_idx as usize].id;
            if !(id <= curr_id && curr_id < prev_id) {
                break;
            }

            if id == curr_id {
                // the anticipated discriminator was only a lower bound
                let curr_name = &self.entries[curr_idx as usize].name;
                id = discriminator(curr_name, &name);
                if id_bit(curr_name, id) {
                    left = index;
                    right = curr_idx;
                } else {
                    left = curr_idx;
                    right = index;
                }
            }

            prev_idx = curr_idx;
            is_right = id_bit(&name, curr_id);
            let curr = &self.entries[curr_idx as usize];
            curr_idx = if is_right { curr.right } else { curr.left };
        }

        let curr = &self.entries[curr_idx as usize];
        if curr.name.len() == name.len() && id_bit(&curr.name, id) {
            right = curr_idx;
        } else {
            left = curr_idx;
        }

        self.entries.push(TrieEntry {
            id,
            left,
            right,
            name,
        });
        let prev = &mut self.entries[prev_idx as usize];
        if is_right {
            prev.right = index;
        } else {
            prev.left = index;
        }

        index
    }

    /// Bit-directed walk from the sentinel, exactly as the target
    /// platform's loader resolves a name. Returns the arena index of the
    /// matching entry, if any.
    pub fn lookup(&self, name: &[u8]) -> Option<u16> {
        let mut prev_id = self.entries[0].id;
        let mut curr_idx = self.entries[0].left;

        loop {
            let curr = &self.entries[curr_idx as usize];
            if curr.id >= prev_id {
                return (curr.name == name).then_some(curr_idx);
            }
            prev_id = curr.id;
            curr_idx = if id_bit(name, curr.id) {
                curr.right
            } else {
                curr.left
            };
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{discriminator, highest_set_bit, TrieGroup};
    use brres_sub::types::SENTINEL_ID;

    #[test]
    fn highest_bit_table_semantics() {
        assert_eq!(highest_set_bit(0x00), 0);
        assert_eq!(highest_set_bit(0x01), 0);
        assert_eq!(highest_set_bit(0x02), 1);
        assert_eq!(highest_set_bit(0x6E), 6);
        assert_eq!(highest_set_bit(0x80), 7);
        assert_eq!(highest_set_bit(0xFF), 7);
    }

    #[test]
    fn discriminator_of_identical_names_is_sentinel() {
        assert_eq!(discriminator(b"", b""), SENTINEL_ID);
        assert_eq!(discriminator(b"course", b"course"), SENTINEL_ID);
    }

    #[test]
    fn discriminator_from_last_byte_when_previous_is_shorter() {
        // 'n' = 0x6E, highest bit 6; byte index 4 resp. 5
        assert_eq!(discriminator(b"", b"b.bin"), 4 << 3 | 6);
        assert_eq!(discriminator(b"b.bin", b"aa.bin"), 5 << 3 | 6);
    }

    #[test]
    fn discriminator_from_first_difference() {
        // 'b' ^ 'c' = 0x01, bit 0, at byte 0
        assert_eq!(discriminator(b"b.bin", b"c.bin"), 0);
        // 'a' ^ 'b' = 0x03, bit 1
        assert_eq!(discriminator(b"a", b"b"), 1);
    }

    #[test]
    fn insert_links_match_known_layout() {
        let mut group = TrieGroup::new();
        assert_eq!(group.insert(b"b.bin".as_slice()), 1);
        assert_eq!(group.insert(b"aa.bin".as_slice()), 2);
        assert_eq!(group.insert(b"c.bin".as_slice()), 3);

        let e = group.entries();
        assert_eq!((e[0].id, e[0].left, e[0].right), (SENTINEL_ID, 2, 0));
        assert_eq!((e[1].id, e[1].left, e[1].right), (38, 0, 3));
        assert_eq!((e[2].id, e[2].left, e[2].right), (46, 1, 2));
        assert_eq!((e[3].id, e[3].left, e[3].right), (0, 1, 3));
    }

    #[test]
    fn lookup_resolves_every_inserted_name() {
        let names: &[&[u8]] = &[
            b"3DModels(NW4R)",
            b"Textures(NW4R)",
            b"Palettes(NW4R)",
            b"AnmTexPat(NW4R)",
            b"AnmTexSrt(NW4R)",
            b"AnmChr(NW4R)",
            b"course",
            b"course.0",
            b"vrcorn",
            b"farm_course",
            b"old_winter_gc",
            b"a",
            b"aa",
            b"ab",
        ];

        let mut group = TrieGroup::new();
        for name in names {
            group.insert(*name);
        }

        for (i, name) in names.iter().enumerate() {
            assert_eq!(
                group.lookup(name),
                Some((i + 1) as u16),
                "lookup failed for {:?}",
                String::from_utf8_lossy(name)
            );
        }
        assert_eq!(group.lookup(b"missing"), None);
    }

    #[test]
    fn lookup_succeeds_regardless_of_insertion_order() {
        let names: &[&[u8]] = &[b"alpha", b"beta", b"gamma", b"delta", b"epsilon"];

        let mut forward = TrieGroup::new();
        for name in names {
            forward.insert(*name);
        }
        let mut backward = TrieGroup::new();
        for name in names.iter().rev() {
            backward.insert(*name);
        }

        for name in names {
            assert!(forward.lookup(name).is_some());
            assert!(backward.lookup(name).is_some());
        }
    }

    #[test]
    fn empty_group_resolves_nothing() {
        let group = TrieGroup::new();
        assert!(group.is_empty());
        assert_eq!(group.lookup(b"anything"), None);
    }
}
