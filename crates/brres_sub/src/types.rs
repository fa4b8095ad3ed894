//! Base wire types of the BRSUB skeleton.
//!
//! Every sub-resource stored inside a BRRES container, whatever its type,
//! starts with the same header and indexes its members through the same
//! group/entry structures. All data is stored in big endian format.

use binrw::{BinRead, BinWrite};

/// Byte size of [`SubHeader`] on the wire.
pub const SUB_HEADER_LEN: usize = 12;

/// Byte size of [`GroupHeader`] on the wire.
pub const GROUP_HEADER_LEN: usize = 8;

/// Byte size of [`EntryRecord`] on the wire.
pub const ENTRY_LEN: usize = 16;

/// Discriminator value marking the sentinel entry at index 0 of a group.
pub const SENTINEL_ID: u16 = 0xFFFF;

/// Generic sub-resource header
///
/// The magic is kept as a plain field because it differs per format
/// ("MDL0", "TEX0", ...). After this header follow the format/version
/// dependent group offset slots and the trailing name-string slot.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(big)]
pub struct SubHeader {
    /// Four character type tag of the sub-resource
    pub magic: [u8; 4],

    /// Declared byte size of the whole sub-resource body
    pub size: u32,

    /// Format version, selects the group layout
    pub version: u32,
}

/// Directory group header
///
/// A group is followed by `count + 1` entry records; the record at index 0
/// is the root sentinel of the group's lookup trie.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(big)]
pub struct GroupHeader {
    /// Total byte size of the group including this header and all entries
    pub size: u32,

    /// Number of real entries (the sentinel is not counted)
    pub count: u32,
}

/// One directory entry
///
/// `name_off` and `data_off` are relative to the start of the owning group;
/// zero means "none".
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(big)]
pub struct EntryRecord {
    /// Bit discriminator routing the trie walk, [`SENTINEL_ID`] for index 0
    pub id: u16,

    /// Reserved, always zero
    pub reserved: u16,

    /// Index of the left child inside the owning group
    pub left: u16,

    /// Index of the right child inside the owning group
    pub right: u16,

    /// Offset of the entry name, relative to the group base
    pub name_off: u32,

    /// Offset of the entry payload or child group, relative to the group base
    pub data_off: u32,
}
