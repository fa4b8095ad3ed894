//! Schema-driven traversal of one sub-resource blob.
//!
//! The walk visits the generic skeleton every BRSUB shares (header, group
//! offset slots, entry tables, trailing name slot) and then dispatches on
//! the [`SchemaSet`] field tables to reach the string references embedded
//! in version specific entry data. Callers supply a [`SubVisitor`]; the
//! walk itself never interprets what a reference means, it only locates
//! the 4-byte big-endian field and reports the base its value is relative
//! to.
//!
//! A blob whose magic and version match no schema row is probed with
//! heuristic group discovery. If even that fails the blob is handed to
//! [`SubVisitor::raw_block`] untouched; degradation is never an error.

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::schema::{Compat, FieldRule, FormatId, SchemaSet};
use crate::types::{ENTRY_LEN, GROUP_HEADER_LEN, SUB_HEADER_LEN};

/// Callbacks invoked while walking a sub-resource.
///
/// All methods default to doing nothing, so a visitor only implements the
/// events it cares about. `at` is always an absolute byte position inside
/// the blob; `base` is the position the referenced 4-byte offset field is
/// relative to.
pub trait SubVisitor {
    /// The blob could not be interpreted and is treated as opaque bytes.
    fn raw_block(&mut self, _data: &mut [u8]) -> Result<()> {
        Ok(())
    }

    /// A directory group was found at `group_at` for slot `index`.
    fn group(&mut self, _data: &mut [u8], _group_at: usize, _index: u32) -> Result<()> {
        Ok(())
    }

    /// A non-sentinel entry record starts at `entry_at`.
    fn entry(&mut self, _data: &mut [u8], _group_at: usize, _entry_at: usize) -> Result<()> {
        Ok(())
    }

    /// A 4-byte string offset lives at `at`, relative to `base`.
    fn string_ref(&mut self, _data: &mut [u8], _at: usize, _base: usize) -> Result<()> {
        Ok(())
    }

    /// A 4-byte relocatable data offset lives at `at`, relative to `base`.
    fn offset_ref(&mut self, _data: &mut [u8], _at: usize, _base: usize) -> Result<()> {
        Ok(())
    }
}

/// What a [`walk`] discovered about one sub-resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkReport {
    /// A schema row matched the magic and version
    pub recognized: bool,

    /// Format family, if the magic is known
    pub format: Option<FormatId>,

    /// Version read from the header (zero for raw blocks)
    pub version: u32,

    /// Number of group offset slots walked
    pub group_count: u32,

    /// Compatibility rating (schema row, or the format's fallback)
    pub compat: Compat,

    /// Start of a trailing embedded string table, when heuristic
    /// discovery hit its self-description
    pub string_table_at: Option<usize>,

    /// End of the last structural byte the walk touched; bytes past this
    /// can only be payload or embedded strings
    pub structures_end: usize,

    /// Declared body size
    pub body: usize,
}

impl WalkReport {
    fn raw(len: usize) -> WalkReport {
        WalkReport {
            recognized: false,
            format: None,
            version: 0,
            group_count: 0,
            compat: Compat::Ok,
            string_table_at: None,
            structures_end: len,
            body: len,
        }
    }
}

fn read_u32(data: &[u8], at: usize) -> Result<u32> {
    data.get(at..at + 4)
        .map(BigEndian::read_u32)
        .ok_or(Error::Truncated {
            offset: at,
            needed: 4,
            available: data.len(),
        })
}

/// Walk one sub-resource blob, invoking `visitor` on every structural
/// element and every string or offset reference.
#[instrument(skip_all, fields(len = data.len()))]
pub fn walk<V: SubVisitor>(
    data: &mut [u8],
    schemas: &SchemaSet,
    visitor: &mut V,
) -> Result<WalkReport> {
    if data.len() < SUB_HEADER_LEN {
        visitor.raw_block(data)?;
        return Ok(WalkReport::raw(data.len()));
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&data[0..4]);
    let body = read_u32(data, 4)? as usize;
    let version = read_u32(data, 8)?;

    if body < SUB_HEADER_LEN || body > data.len() {
        debug!(body, "declared size inconsistent, treating as raw block");
        visitor.raw_block(data)?;
        return Ok(WalkReport::raw(data.len()));
    }

    let format = FormatId::from_magic(&magic);
    let row = format.and_then(|f| schemas.lookup(f, version));

    let (group_count, compat, recognized, string_table_at) = match row {
        Some(row) => {
            // a known version still has to leave room for its slots and
            // the trailing name slot
            let slots_end = SUB_HEADER_LEN + 4 * row.group_count as usize + 4;
            if slots_end > body {
                debug!(
                    group_count = row.group_count,
                    body, "no room for the declared group slots, treating as raw block"
                );
                visitor.raw_block(data)?;
                return Ok(WalkReport::raw(data.len()));
            }
            (row.group_count, row.compat, true, None)
        }
        None => {
            let Some((count, table)) = discover_groups(data, body) else {
                debug!(?format, version, "group discovery failed, treating as raw block");
                visitor.raw_block(data)?;
                return Ok(WalkReport::raw(data.len()));
            };
            let compat = format.map(FormatId::fallback_compat).unwrap_or(Compat::Hint);
            (count, compat, false, table)
        }
    };

    let name_slot = SUB_HEADER_LEN + 4 * group_count as usize;
    let mut structures_end = (name_slot + 4).min(body);

    for index in 0..group_count {
        let slot = SUB_HEADER_LEN + 4 * index as usize;
        let group_at = read_u32(data, slot)? as usize;
        if group_at == 0 {
            continue;
        }
        if group_at + GROUP_HEADER_LEN > body {
            warn!(index, group_at, "group offset outside declared body, skipping");
            continue;
        }
        visitor.offset_ref(data, slot, 0)?;
        visitor.group(data, group_at, index)?;
        let end = walk_group(
            data, body, group_at, index, format, version, schemas, visitor, recognized,
        )?;
        structures_end = structures_end.max(end);
    }

    if name_slot + 4 <= body {
        visitor.string_ref(data, name_slot, 0)?;
    }

    Ok(WalkReport {
        recognized,
        format,
        version,
        group_count,
        compat,
        string_table_at,
        structures_end,
        body,
    })
}

#[allow(clippy::too_many_arguments)]
fn walk_group<V: SubVisitor>(
    data: &mut [u8],
    body: usize,
    group_at: usize,
    index: u32,
    format: Option<FormatId>,
    version: u32,
    schemas: &SchemaSet,
    visitor: &mut V,
    apply_fields: bool,
) -> Result<usize> {
    let count = read_u32(data, group_at + 4)? as usize;
    let entries_end = group_at + GROUP_HEADER_LEN + ENTRY_LEN * (count + 1);
    if entries_end > body {
        warn!(index, count, "group entry table outside declared body, skipping entries");
        return Ok(group_at + GROUP_HEADER_LEN);
    }
    let mut end = entries_end;

    // index 0 is the trie sentinel and references nothing
    for j in 1..=count {
        let entry_at = group_at + GROUP_HEADER_LEN + ENTRY_LEN * j;
        visitor.entry(data, group_at, entry_at)?;
        visitor.string_ref(data, entry_at + 8, group_at)?;
        visitor.offset_ref(data, entry_at + 12, group_at)?;

        if !apply_fields {
            continue;
        }
        let Some(format) = format else {
            continue;
        };
        let data_off = read_u32(data, entry_at + 12)? as usize;
        if data_off == 0 {
            continue;
        }
        let entry_data = group_at + data_off;
        for rule in schemas.fields_for(format, version, index) {
            end = end.max(apply_rule(data, body, entry_data, rule, visitor)?);
        }
    }

    Ok(end)
}

fn apply_rule<V: SubVisitor>(
    data: &mut [u8],
    body: usize,
    entry_data: usize,
    rule: FieldRule,
    visitor: &mut V,
) -> Result<usize> {
    match rule {
        FieldRule::String { at } => {
            let pos = entry_data + at as usize;
            if pos + 4 > body {
                warn!(pos, "string field outside declared body, skipping");
                return Ok(entry_data);
            }
            visitor.string_ref(data, pos, entry_data)?;
            Ok(pos + 4)
        }

        FieldRule::StringArray {
            count_at,
            base_at,
            stride,
        } => {
            let Some((count, first)) = read_array_head(data, body, entry_data, count_at, base_at)
            else {
                return Ok(entry_data);
            };
            let mut end = entry_data;
            for i in 0..count {
                let elem = first + i * stride as usize;
                if elem + 4 > body {
                    warn!(elem, "array element outside declared body, stopping");
                    break;
                }
                visitor.string_ref(data, elem, elem)?;
                end = end.max(elem + 4);
            }
            Ok(end)
        }

        FieldRule::NestedStringArray {
            count_at,
            base_at,
            stride,
            inner_count_at,
            inner_base_at,
            inner_stride,
        } => {
            let Some((count, first)) = read_array_head(data, body, entry_data, count_at, base_at)
            else {
                return Ok(entry_data);
            };
            let mut end = entry_data;
            for i in 0..count {
                let elem = first + i * stride as usize;
                let Some((inner_count, inner_first)) =
                    read_array_head(data, body, elem, inner_count_at, inner_base_at)
                else {
                    break;
                };
                for k in 0..inner_count {
                    let pos = inner_first + k * inner_stride as usize;
                    if pos + 4 > body {
                        warn!(pos, "inner array element outside declared body, stopping");
                        break;
                    }
                    visitor.string_ref(data, pos, elem)?;
                    end = end.max(pos + 4);
                }
            }
            Ok(end)
        }
    }
}

/// Read a counted array head: `(count, absolute first element position)`.
fn read_array_head(
    data: &[u8],
    body: usize,
    base: usize,
    count_at: u32,
    base_at: u32,
) -> Option<(usize, usize)> {
    let count_pos = base + count_at as usize;
    let base_pos = base + base_at as usize;
    if count_pos + 4 > body || base_pos + 4 > body {
        warn!(base, "array descriptor outside declared body, skipping");
        return None;
    }
    let count = BigEndian::read_u32(&data[count_pos..count_pos + 4]) as usize;
    let first = base + BigEndian::read_u32(&data[base_pos..base_pos + 4]) as usize;
    Some((count, first))
}

/// Heuristic group discovery for unknown `(format, version)` pairs.
///
/// Scans the offset slots after the fixed header. A slot counts as a
/// group offset only if it is non-zero, word aligned, strictly beyond its
/// own position and inside the declared body. Scanning stops at the first
/// slot whose target looks like a length-prefixed string record, since
/// that slot is the trailing name slot and its target marks the start of
/// the embedded string table.
///
/// Returns `None` when the blob has no room for a single slot.
fn discover_groups(data: &[u8], body: usize) -> Option<(u32, Option<usize>)> {
    if body < SUB_HEADER_LEN + 4 {
        return None;
    }

    let mut count = 0u32;
    let mut table = None;
    loop {
        let slot = SUB_HEADER_LEN + 4 * count as usize;
        if slot + 4 > body {
            break;
        }
        let value = BigEndian::read_u32(&data[slot..slot + 4]) as usize;
        if value == 0 || value % 4 != 0 || value <= slot || value >= body {
            break;
        }
        if looks_like_string_record(data, body, value) {
            table = Some(value - 4);
            break;
        }
        count += 1;
    }

    Some((count, table))
}

/// Does `at` point at the first character of a `u32 length` + NUL
/// terminated string record?
fn looks_like_string_record(data: &[u8], body: usize, at: usize) -> bool {
    if at < SUB_HEADER_LEN + 4 || at >= body {
        return false;
    }
    let declared = BigEndian::read_u32(&data[at - 4..at]) as usize;
    match data[at..body].iter().position(|&b| b == 0) {
        Some(nul) => nul == declared,
        None => false,
    }
}
