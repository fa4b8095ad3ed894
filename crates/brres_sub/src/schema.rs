//! Static per-(format, version) section tables.
//!
//! The relocation walk never hard-codes knowledge about a particular
//! sub-resource type. Everything version specific lives here as data:
//! the expected number of group offset slots, a compatibility rating for
//! the target platform's loader, and the positions of string references
//! embedded in each group's entry data. Supporting a new format or
//! version means adding a row, not new control flow.

/// Identifies a known BRSUB format family by its magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatId {
    /// Bone animation
    Chr0,
    /// Color animation
    Clr0,
    /// Model
    Mdl0,
    /// Texture pattern animation
    Pat0,
    /// Palette
    Plt0,
    /// Scene settings
    Scn0,
    /// Vertex morph animation
    Shp0,
    /// Texture coordinate animation
    Srt0,
    /// Texture
    Tex0,
}

impl FormatId {
    /// Map a four byte magic to a format family.
    pub fn from_magic(magic: &[u8; 4]) -> Option<FormatId> {
        match magic {
            b"CHR0" => Some(FormatId::Chr0),
            b"CLR0" => Some(FormatId::Clr0),
            b"MDL0" => Some(FormatId::Mdl0),
            b"PAT0" => Some(FormatId::Pat0),
            b"PLT0" => Some(FormatId::Plt0),
            b"SCN0" => Some(FormatId::Scn0),
            b"SHP0" => Some(FormatId::Shp0),
            b"SRT0" => Some(FormatId::Srt0),
            b"TEX0" => Some(FormatId::Tex0),
            _ => None,
        }
    }

    /// The magic bytes of this format family.
    pub fn magic(self) -> &'static [u8; 4] {
        match self {
            FormatId::Chr0 => b"CHR0",
            FormatId::Clr0 => b"CLR0",
            FormatId::Mdl0 => b"MDL0",
            FormatId::Pat0 => b"PAT0",
            FormatId::Plt0 => b"PLT0",
            FormatId::Scn0 => b"SCN0",
            FormatId::Shp0 => b"SHP0",
            FormatId::Srt0 => b"SRT0",
            FormatId::Tex0 => b"TEX0",
        }
    }

    /// Compatibility rating applied when the magic is known but the
    /// version has no schema row and the walk falls back to heuristic
    /// group discovery.
    pub fn fallback_compat(self) -> Compat {
        match self {
            // the loader dereferences version specific model tables
            FormatId::Mdl0 => Compat::FreezeTarget,
            FormatId::Scn0 => Compat::DisplayError,
            _ => Compat::Hint,
        }
    }
}

/// How well the target platform is expected to cope with a sub-resource.
///
/// Ordered by severity; a build report keeps the worst value seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Compat {
    /// Known good
    #[default]
    Ok,
    /// Works, but the version is unusual for this format
    Hint,
    /// The target will load the file but display it incorrectly
    DisplayError,
    /// The target is expected to freeze on this file
    FreezeTarget,
}

/// Where string references live inside one group's entry data.
///
/// All offsets are relative to the start of the entry's data structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// A single 4-byte string offset at a fixed position.
    String {
        /// offset of the string-offset field
        at: u32,
    },

    /// A counted array of elements, each starting with its own string
    /// offset. Count and first-element offset are read from the entry data.
    StringArray {
        /// offset of the u32 element count
        count_at: u32,
        /// offset of the u32 holding the first element's offset
        base_at: u32,
        /// byte stride between elements
        stride: u32,
    },

    /// A counted array whose elements each hold a further counted list of
    /// string offsets. Inner offsets are relative to the outer element.
    NestedStringArray {
        /// offset of the u32 outer element count
        count_at: u32,
        /// offset of the u32 holding the first outer element's offset
        base_at: u32,
        /// byte stride between outer elements
        stride: u32,
        /// offset of the u32 inner count inside an outer element
        inner_count_at: u32,
        /// offset of the u32 holding the inner list's offset
        inner_base_at: u32,
        /// byte stride between inner string offsets
        inner_stride: u32,
    },
}

/// One `(format, version)` row of the section table.
#[derive(Debug, Clone, Copy)]
pub struct SubSchema {
    /// Format family this row applies to
    pub format: FormatId,
    /// Exact version this row applies to
    pub version: u32,
    /// Number of group offset slots after the sub header
    pub group_count: u32,
    /// Compatibility rating of this version
    pub compat: Compat,
    /// `(group_index, rule)` pairs for embedded string references
    pub fields: &'static [(u32, FieldRule)],
}

/// Material entries carry a variable length layer array; each layer starts
/// with the offset of its texture name.
const MDL0_LAYER_FIELDS: &[(u32, FieldRule)] = &[(
    8,
    FieldRule::StringArray {
        count_at: 0x2C,
        base_at: 0x30,
        stride: 0x34,
    },
)];

/// Pattern animations hold per-material element lists which in turn hold
/// per-frame texture name lists.
const PAT0_FIELDS: &[(u32, FieldRule)] = &[(
    0,
    FieldRule::NestedStringArray {
        count_at: 0x04,
        base_at: 0x08,
        stride: 0x10,
        inner_count_at: 0x04,
        inner_base_at: 0x08,
        inner_stride: 0x08,
    },
)];

const BUILTIN_ROWS: &[SubSchema] = &[
    SubSchema { format: FormatId::Chr0, version: 4, group_count: 1, compat: Compat::Ok, fields: &[] },
    SubSchema { format: FormatId::Chr0, version: 5, group_count: 2, compat: Compat::Hint, fields: &[] },
    SubSchema { format: FormatId::Clr0, version: 3, group_count: 1, compat: Compat::Ok, fields: &[] },
    SubSchema { format: FormatId::Clr0, version: 4, group_count: 2, compat: Compat::Hint, fields: &[] },
    SubSchema { format: FormatId::Mdl0, version: 8, group_count: 11, compat: Compat::Ok, fields: MDL0_LAYER_FIELDS },
    SubSchema { format: FormatId::Mdl0, version: 9, group_count: 11, compat: Compat::Ok, fields: MDL0_LAYER_FIELDS },
    SubSchema { format: FormatId::Mdl0, version: 11, group_count: 14, compat: Compat::Hint, fields: MDL0_LAYER_FIELDS },
    SubSchema { format: FormatId::Pat0, version: 4, group_count: 6, compat: Compat::Ok, fields: PAT0_FIELDS },
    SubSchema { format: FormatId::Plt0, version: 1, group_count: 1, compat: Compat::Ok, fields: &[] },
    SubSchema { format: FormatId::Scn0, version: 4, group_count: 6, compat: Compat::Ok, fields: &[] },
    SubSchema { format: FormatId::Scn0, version: 5, group_count: 7, compat: Compat::Hint, fields: &[] },
    SubSchema { format: FormatId::Shp0, version: 3, group_count: 1, compat: Compat::Ok, fields: &[] },
    SubSchema { format: FormatId::Shp0, version: 4, group_count: 2, compat: Compat::Hint, fields: &[] },
    SubSchema { format: FormatId::Srt0, version: 4, group_count: 1, compat: Compat::Ok, fields: &[] },
    SubSchema { format: FormatId::Srt0, version: 5, group_count: 2, compat: Compat::Hint, fields: &[] },
    SubSchema { format: FormatId::Tex0, version: 1, group_count: 1, compat: Compat::Ok, fields: &[] },
    SubSchema { format: FormatId::Tex0, version: 2, group_count: 2, compat: Compat::Hint, fields: &[] },
    SubSchema { format: FormatId::Tex0, version: 3, group_count: 1, compat: Compat::Ok, fields: &[] },
];

/// A set of schema rows, usually [`SchemaSet::builtin`].
///
/// Tests substitute synthetic tables to exercise the walk without real
/// sub-resource layouts.
#[derive(Debug, Clone, Copy)]
pub struct SchemaSet {
    rows: &'static [SubSchema],
}

impl SchemaSet {
    /// A schema set over caller supplied rows.
    pub const fn new(rows: &'static [SubSchema]) -> SchemaSet {
        SchemaSet { rows }
    }

    /// The built in tables covering the known BRSUB family.
    pub const fn builtin() -> SchemaSet {
        SchemaSet { rows: BUILTIN_ROWS }
    }

    /// Look up the row for an exact `(format, version)` pair.
    pub fn lookup(&self, format: FormatId, version: u32) -> Option<&'static SubSchema> {
        self.rows
            .iter()
            .find(|row| row.format == format && row.version == version)
    }

    /// The field rules of `(format, version)` that apply to `group_index`.
    pub fn fields_for(
        &self,
        format: FormatId,
        version: u32,
        group_index: u32,
    ) -> impl Iterator<Item = FieldRule> {
        self.lookup(format, version)
            .map(|row| row.fields)
            .unwrap_or(&[])
            .iter()
            .filter(move |(group, _)| *group == group_index)
            .map(|(_, rule)| *rule)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{Compat, FieldRule, FormatId, SchemaSet, SubSchema};

    #[test]
    fn lookup_known_version() {
        let schemas = SchemaSet::builtin();
        let row = schemas.lookup(FormatId::Mdl0, 8).unwrap();
        assert_eq!(row.group_count, 11);
        assert_eq!(row.compat, Compat::Ok);
    }

    #[test]
    fn lookup_unknown_version() {
        let schemas = SchemaSet::builtin();
        assert!(schemas.lookup(FormatId::Mdl0, 7).is_none());
        assert!(schemas.lookup(FormatId::Tex0, 9).is_none());
    }

    #[test]
    fn classify_magic() {
        assert_eq!(FormatId::from_magic(b"MDL0"), Some(FormatId::Mdl0));
        assert_eq!(FormatId::from_magic(b"ZZZ0"), None);
        assert_eq!(FormatId::Pat0.magic(), b"PAT0");
    }

    #[test]
    fn fields_filtered_by_group() {
        let schemas = SchemaSet::builtin();

        let material: Vec<_> = schemas.fields_for(FormatId::Mdl0, 8, 8).collect();
        assert_eq!(material.len(), 1);
        assert!(matches!(material[0], FieldRule::StringArray { .. }));

        let bones: Vec<_> = schemas.fields_for(FormatId::Mdl0, 8, 1).collect();
        assert!(bones.is_empty());
    }

    #[test]
    fn severity_ordering() {
        assert!(Compat::Ok < Compat::Hint);
        assert!(Compat::Hint < Compat::DisplayError);
        assert!(Compat::DisplayError < Compat::FreezeTarget);
    }

    #[test]
    fn synthetic_rows() {
        static ROWS: &[SubSchema] = &[SubSchema {
            format: FormatId::Tex0,
            version: 99,
            group_count: 3,
            compat: Compat::DisplayError,
            fields: &[(2, FieldRule::String { at: 4 })],
        }];

        let schemas = SchemaSet::new(ROWS);
        assert_eq!(schemas.lookup(FormatId::Tex0, 99).unwrap().group_count, 3);
        assert_eq!(schemas.fields_for(FormatId::Tex0, 99, 2).count(), 1);
    }
}
