//! This library handles the generic **BRSUB** skeleton shared by every
//! sub-resource stored inside a BRRES container.
//!
//! # BRSUB Skeleton Documentation
//!
//! Model, texture, animation and pattern sub-resources ("BRSUB" files) all
//! share the same outer structure: a small header, a run of group offset
//! slots, a trailing name slot and a format specific body. The group and
//! entry structures are identical to the ones the outer container uses for
//! its directories. All multi-byte integers are big-endian.
//!
//! ## Sub-resource header
//!
//! | Offset (bytes) | Field         | Description                                        |
//! |----------------|---------------|----------------------------------------------------|
//! | 0x0000         | Magic         | 4 bytes: format tag ("MDL0", "TEX0", ...)          |
//! | 0x0004         | Body Size     | 4 bytes: declared size of the whole sub-resource   |
//! | 0x0008         | Version       | 4 bytes: format version, selects the group layout  |
//! | 0x000C         | Group Offsets | 4 bytes each: N slots, N depends on format+version |
//! | ...            | Name Slot     | 4 bytes: offset of this sub-resource's own name    |
//! | ...            | Body          | format specific                                    |
//!
//! ## Group
//!
//! | Offset (bytes) | Field       | Description                                  |
//! |----------------|-------------|----------------------------------------------|
//! | 0x0000         | Size        | 4 bytes: group byte size including entries   |
//! | 0x0004         | Count       | 4 bytes: number of real entries              |
//! | 0x0008         | Entries     | 16 bytes each: count + 1, index 0 = sentinel |
//!
//! ## Entry
//!
//! | Offset (bytes) | Field         | Description                                   |
//! |----------------|---------------|-----------------------------------------------|
//! | 0x0000         | Id            | 2 bytes: trie bit discriminator               |
//! | 0x0002         | Reserved      | 2 bytes: always zero                          |
//! | 0x0004         | Left Index    | 2 bytes: left trie child                      |
//! | 0x0006         | Right Index   | 2 bytes: right trie child                     |
//! | 0x0008         | Name Offset   | 4 bytes: group-relative, 0 = none             |
//! | 0x000C         | Data Offset   | 4 bytes: group-relative, 0 = none             |
//!
//! The string references scattered through the version specific bodies are
//! described by static [`schema`] tables and visited generically by
//! [`walk`]; repacking a sub-resource into a new container only needs those
//! two pieces, never a full decoder for the body.

pub mod error;
pub mod schema;
pub mod types;
pub mod walk;

pub use schema::{Compat, FieldRule, FormatId, SchemaSet, SubSchema};
pub use walk::{walk, SubVisitor, WalkReport};
