//! A library for creating and inspecting BRRES resource containers used
//! by Wii games.
//!
//! A container bundles sub-resources (models, textures, animations)
//! behind named directory entries that the target platform resolves with
//! a bit-discriminator trie. All multi-byte values are big-endian.
//!
//! ## Container layout
//!
//! | Offset | Size | Description                                  |
//! |--------|------|----------------------------------------------|
//! | 0x00   | 4    | Magic `bres`                                 |
//! | 0x04   | 2    | Byte order mark, always 0xFEFF               |
//! | 0x06   | 2    | Version, zero                                |
//! | 0x08   | 4    | Total file size                              |
//! | 0x0C   | 2    | Root section offset, 0x10                    |
//! | 0x0E   | 2    | Section count (root plus one per payload)    |
//!
//! The root section starts with the magic `root` and its own size, then
//! holds every directory group. Each group is a size, a child count, and
//! `count + 1` entry records of 16 bytes; index 0 is the trie sentinel.
//! Entry name and data offsets are relative to their group. Payloads
//! follow the root section aligned to the configured boundary, and a
//! deduplicated string table closes the file.
//!
//! ## Building
//!
//! ```no_run
//! use brres::write::BrresWriter;
//!
//! # fn main() -> brres::error::Result<()> {
//! let mut writer = BrresWriter::default();
//! writer.add_file("3DModels(NW4R)/course", std::fs::read("course.mdl0")?)?;
//! writer.add_file("Textures(NW4R)/grass", std::fs::read("grass.tex0")?)?;
//! let output = writer.build()?;
//! std::fs::write("course_model.brres", &output.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! String references inside recognized payloads are rewritten to the
//! shared table; unrecognized payloads are copied verbatim. The build
//! report carries compatibility findings instead of failing the build.

pub mod dump;
pub mod error;
pub mod pool;
pub mod trie;
pub mod types;
pub mod write;

pub use dump::{dump, dump_to_string};
pub use error::{Error, Result};
pub use pool::{StringPool, StringToken};
pub use trie::TrieGroup;
pub use types::{BrresHeader, RootHeader};
pub use write::{BrresOutput, BrresWriter, BrresWriterOptions, BuildReport, BuildStatus};
