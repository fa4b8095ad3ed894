//! Base types for structure of BRRES containers.

use binrw::{BinRead, BinWrite};

/// Byte size of [`BrresHeader`] on the wire.
pub const HEADER_LEN: usize = 16;

/// Byte size of [`RootHeader`] on the wire.
pub const ROOT_HEADER_LEN: usize = 8;

/// Byte order mark of a valid container; the format is big-endian only.
pub const BOM: u16 = 0xFEFF;

/// BRRES container header
///
/// Always starts with "bres" followed by the byte order mark. All data is
/// stored in big endian format.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"bres", big)]
pub struct BrresHeader {
    /// Byte order mark, always [`BOM`]
    pub bom: u16,

    /// Container version, zero in every known file
    pub version: u16,

    /// Total byte size of the container
    pub size: u32,

    /// Offset of the root section from the start of the file
    pub root_off: u16,

    /// Number of sections: the root section plus one per sub-resource
    pub sections: u16,
}

impl Default for BrresHeader {
    fn default() -> Self {
        Self {
            bom: BOM,
            version: 0,
            size: 0,
            root_off: HEADER_LEN as u16,
            sections: 1,
        }
    }
}

/// Root section header
///
/// The root section holds every directory group of the container; nested
/// directory groups follow the root group inside this section.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(magic = b"root", big)]
pub struct RootHeader {
    /// Byte size of the root section including this 8-byte header
    pub size: u32,
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::BinRead;
    use binrw::BinWrite;
    use pretty_assertions::assert_eq;

    use crate::error::Result;
    use crate::types::{BrresHeader, RootHeader};

    #[test]
    fn read_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x62, 0x72, 0x65, 0x73,
            0xFE, 0xFF,
            0x00, 0x00,
            0x00, 0x00, 0x01, 0x00,
            0x00, 0x10,
            0x00, 0x04,
        ]);

        let expected = BrresHeader {
            size: 0x100,
            sections: 4,
            ..Default::default()
        };

        assert_eq!(BrresHeader::read(&mut input)?, expected);

        Ok(())
    }

    #[test]
    fn write_header() -> Result<()> {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x62, 0x72, 0x65, 0x73,
            0xFE, 0xFF,
            0x00, 0x00,
            0x00, 0x00, 0x01, 0x00,
            0x00, 0x10,
            0x00, 0x04,
        ];

        let header = BrresHeader {
            size: 0x100,
            sections: 4,
            ..Default::default()
        };

        let mut actual = Vec::new();
        header.write(&mut Cursor::new(&mut actual))?;

        assert_eq!(actual, expected);

        Ok(())
    }

    #[test]
    fn read_invalid_magic() {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x62, 0x72, 0x65, 0x7A,
            0xFE, 0xFF,
            0x00, 0x00,
            0x00, 0x00, 0x01, 0x00,
            0x00, 0x10,
            0x00, 0x04,
        ]);

        assert!(BrresHeader::read(&mut input).is_err());
    }

    #[test]
    fn root_roundtrip() -> Result<()> {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x72, 0x6F, 0x6F, 0x74,
            0x00, 0x00, 0x00, 0x50,
        ];

        let root = RootHeader { size: 0x50 };

        let mut actual = Vec::new();
        root.write(&mut Cursor::new(&mut actual))?;
        assert_eq!(actual, expected);

        assert_eq!(RootHeader::read(&mut Cursor::new(&actual))?, root);

        Ok(())
    }
}
