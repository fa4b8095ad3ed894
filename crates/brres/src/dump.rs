//! Human readable dump of a container's structure.
//!
//! Walks the directory groups from the root section and prints one line
//! per group, entry and reference. Payloads are probed with the same
//! traversal the writer uses, so the dump shows exactly which fields a
//! rebuild would rewrite and whether each string target lies inside or
//! outside the payload body.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use binrw::BinRead;
use byteorder::{BigEndian, ByteOrder};

use brres_sub::error::Result as SubResult;
use brres_sub::schema::SchemaSet;
use brres_sub::types::{EntryRecord, GroupHeader, ENTRY_LEN, GROUP_HEADER_LEN, SUB_HEADER_LEN};
use brres_sub::walk::{walk, SubVisitor};

use crate::error::{Error, Result};
use crate::types::{BrresHeader, RootHeader, ROOT_HEADER_LEN};

/// Write a structural dump of `data` to `out`.
pub fn dump<W: Write>(data: &[u8], schemas: &SchemaSet, out: &mut W) -> Result<()> {
    let mut cursor = Cursor::new(data);
    let Ok(header) = BrresHeader::read(&mut cursor) else {
        return Err(Error::InvalidContainer);
    };

    let root_at = header.root_off as usize;
    cursor.set_position(root_at as u64);
    let Ok(root) = RootHeader::read(&mut cursor) else {
        return Err(Error::InvalidContainer);
    };
    let root_end = root_at + root.size as usize;
    if root_end > data.len() {
        return Err(Error::InvalidContainer);
    }

    writeln!(
        out,
        "brres: size=0x{:X} sections={} root=0x{:X}",
        header.size, header.sections, root_at
    )?;
    writeln!(out, "root: size=0x{:X}", root.size)?;

    let mut seen = HashSet::new();
    dump_group(
        data,
        schemas,
        root_at + ROOT_HEADER_LEN,
        root_end,
        0,
        &mut seen,
        out,
    )
}

/// Dump into a string, mostly for tests and logging.
pub fn dump_to_string(data: &[u8], schemas: &SchemaSet) -> Result<String> {
    let mut out = Vec::new();
    dump(data, schemas, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn dump_group<W: Write>(
    data: &[u8],
    schemas: &SchemaSet,
    group_at: usize,
    root_end: usize,
    depth: usize,
    seen: &mut HashSet<usize>,
    out: &mut W,
) -> Result<()> {
    let pad = "  ".repeat(depth);

    // crafted files can link groups in a cycle
    if !seen.insert(group_at) {
        writeln!(out, "{pad}group @0x{group_at:04X}: already shown")?;
        return Ok(());
    }

    let mut cursor = Cursor::new(data);
    cursor.set_position(group_at as u64);
    let Ok(group) = GroupHeader::read(&mut cursor) else {
        return Err(Error::InvalidContainer);
    };
    let count = group.count as usize;
    if group_at + GROUP_HEADER_LEN + ENTRY_LEN * (count + 1) > data.len() {
        return Err(Error::InvalidContainer);
    }

    writeln!(out, "{pad}group @0x{group_at:04X} ({count} children)")?;

    for j in 1..=count {
        let entry_at = group_at + GROUP_HEADER_LEN + ENTRY_LEN * j;
        cursor.set_position(entry_at as u64);
        let Ok(entry) = EntryRecord::read(&mut cursor) else {
            return Err(Error::InvalidContainer);
        };

        let name = read_name(data, group_at + entry.name_off as usize);
        let target = group_at + entry.data_off as usize;

        if target < root_end {
            writeln!(
                out,
                "{pad}  [{j}] id=0x{:04X} L={} R={} dir {name:?} -> group @0x{target:04X}",
                entry.id, entry.left, entry.right
            )?;
            dump_group(data, schemas, target, root_end, depth + 2, seen, out)?;
        } else {
            writeln!(
                out,
                "{pad}  [{j}] id=0x{:04X} L={} R={} file {name:?} -> @0x{target:04X}",
                entry.id, entry.left, entry.right
            )?;
            dump_payload(data, schemas, target, depth + 2, out)?;
        }
    }

    Ok(())
}

fn read_name(data: &[u8], at: usize) -> String {
    let Some(tail) = data.get(at..) else {
        return "<out of range>".to_string();
    };
    match tail.iter().position(|&b| b == 0) {
        Some(len) => String::from_utf8_lossy(&tail[..len]).into_owned(),
        None => "<unterminated>".to_string(),
    }
}

fn dump_payload<W: Write>(
    data: &[u8],
    schemas: &SchemaSet,
    at: usize,
    depth: usize,
    out: &mut W,
) -> Result<()> {
    let pad = "  ".repeat(depth);
    let Some(tail) = data.get(at..) else {
        writeln!(out, "{pad}payload offset out of range")?;
        return Ok(());
    };
    let mut blob = tail.to_vec();

    // summary first, then the reference lines
    let report = walk(&mut blob, schemas, &mut Probe)?;
    let family = match report.format {
        Some(format) => String::from_utf8_lossy(format.magic()).into_owned(),
        None => "data".to_string(),
    };
    writeln!(
        out,
        "{pad}{family} v{} groups={} compat={:?} body=0x{:X}",
        report.version, report.group_count, report.compat, report.body
    )?;

    let body = if blob.len() >= SUB_HEADER_LEN {
        (BigEndian::read_u32(&blob[4..8]) as usize).min(blob.len())
    } else {
        blob.len()
    };
    let mut printer = Printer { out, depth, body };
    walk(&mut blob, schemas, &mut printer)?;

    Ok(())
}

struct Probe;

impl SubVisitor for Probe {}

struct Printer<'a, W: Write> {
    out: &'a mut W,
    depth: usize,
    body: usize,
}

impl<W: Write> SubVisitor for Printer<'_, W> {
    fn raw_block(&mut self, data: &mut [u8]) -> SubResult<()> {
        let pad = "  ".repeat(self.depth + 1);
        writeln!(self.out, "{pad}opaque block ({} bytes)", data.len())?;
        Ok(())
    }

    fn string_ref(&mut self, data: &mut [u8], at: usize, base: usize) -> SubResult<()> {
        let pad = "  ".repeat(self.depth + 1);
        let off = BigEndian::read_u32(&data[at..at + 4]) as usize;
        if off == 0 {
            writeln!(self.out, "{pad}string @0x{at:04X} unset")?;
            return Ok(());
        }
        let target = base + off;
        let place = if target < self.body { "in" } else { "out" };
        let text = read_name(data, target);
        writeln!(
            self.out,
            "{pad}string @0x{at:04X} -> 0x{target:04X} {text:?} ({place})"
        )?;
        Ok(())
    }

    fn offset_ref(&mut self, data: &mut [u8], at: usize, base: usize) -> SubResult<()> {
        let pad = "  ".repeat(self.depth + 1);
        let off = BigEndian::read_u32(&data[at..at + 4]) as usize;
        writeln!(
            self.out,
            "{pad}offset @0x{at:04X} (base 0x{base:04X}) -> 0x{:04X}",
            base + off
        )?;
        Ok(())
    }
}
