//! Types for building BRRES containers.
//!
//! A [`BrresWriter`] collects directory and file records, then assembles
//! the container in one [`BrresWriter::build`] call: names go through the
//! shared [`StringPool`], every directory becomes a bit-discriminator
//! group, and each payload is walked twice. The first walk collects every
//! string the payload references into the pool; the second rewrites the
//! reference fields to point at the pooled records, once the final layout
//! is known. Payloads whose trailing bytes are nothing but their own
//! embedded copy of those strings are shrunk to the structural part.

use std::collections::HashSet;
use std::fmt;
use std::io::Cursor;
use std::mem;

use binrw::BinWrite;
use bon::Builder;
use byteorder::{BigEndian, ByteOrder};
use tracing::{info, instrument, warn};

use brres_sub::error::Result as SubResult;
use brres_sub::schema::{Compat, FormatId, SchemaSet};
use brres_sub::types::{EntryRecord, GroupHeader, ENTRY_LEN, GROUP_HEADER_LEN};
use brres_sub::walk::{walk, SubVisitor, WalkReport};

use crate::error::{Error, Result};
use crate::pool::StringPool;
use crate::trie::TrieGroup;
use crate::types::{BrresHeader, RootHeader, HEADER_LEN, ROOT_HEADER_LEN};

/// Options for how a container is laid out.
#[derive(Debug, Clone, Copy, Builder)]
pub struct BrresWriterOptions {
    /// Byte alignment of each sub-resource payload
    #[builder(default = 0x20)]
    pub alignment: u32,

    /// Schema rows used to locate string references inside payloads
    #[builder(default = SchemaSet::builtin())]
    pub schemas: SchemaSet,
}

impl Default for BrresWriterOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

type Loader = Box<dyn FnOnce() -> std::io::Result<Vec<u8>>>;

/// Backing bytes of one file record.
pub enum InputSource {
    /// Bytes already in memory
    Bytes(Vec<u8>),
    /// Deferred read, invoked once during [`BrresWriter::build`]
    Deferred(Loader),
}

impl InputSource {
    fn load(self) -> std::io::Result<Vec<u8>> {
        match self {
            InputSource::Bytes(bytes) => Ok(bytes),
            InputSource::Deferred(loader) => loader(),
        }
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            InputSource::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Worst condition seen while building, ordered by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildStatus {
    /// Every payload is known good
    #[default]
    Ok,
    /// An unusual but harmless sub-resource version was kept
    Hint,
    /// The target platform will display a sub-resource incorrectly
    DisplayError,
    /// The target platform is expected to freeze on a sub-resource
    FreezeTarget,
    /// A deferred file read failed and its payload was left empty
    ReadFailure,
}

impl From<Compat> for BuildStatus {
    fn from(compat: Compat) -> BuildStatus {
        match compat {
            Compat::Ok => BuildStatus::Ok,
            Compat::Hint => BuildStatus::Hint,
            Compat::DisplayError => BuildStatus::DisplayError,
            Compat::FreezeTarget => BuildStatus::FreezeTarget,
        }
    }
}

/// One compatibility finding about a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatNote {
    /// record path of the payload
    pub path: String,
    /// format family, if recognized
    pub format: Option<FormatId>,
    /// declared sub-resource version
    pub version: u32,
    /// rating the walk assigned
    pub compat: Compat,
}

/// One failed deferred read.
#[derive(Debug)]
pub struct ReadFailure {
    /// record path of the payload
    pub path: String,
    /// error returned by the loader
    pub error: std::io::Error,
}

/// Everything [`BrresWriter::build`] reports besides the bytes. Payload
/// problems never abort a build; they degrade the status instead.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// worst condition seen across all payloads
    pub status: BuildStatus,
    /// per-payload compatibility findings
    pub notes: Vec<CompatNote>,
    /// deferred reads that failed
    pub failures: Vec<ReadFailure>,
}

impl BuildReport {
    fn rate(&mut self, status: BuildStatus) {
        self.status = self.status.max(status);
    }
}

/// Finished container bytes plus the build report.
#[derive(Debug)]
pub struct BrresOutput {
    /// the assembled container
    pub bytes: Vec<u8>,
    /// findings collected along the way
    pub report: BuildReport,
}

#[derive(Debug)]
enum ChildKind {
    Directory(usize),
    File(InputSource),
}

#[derive(Debug)]
struct ChildRecord {
    dir: usize,
    name: Vec<u8>,
    path: String,
    kind: ChildKind,
}

/// Builds a container from directory and file records added in call
/// order. Identical inputs added in identical order produce identical
/// bytes.
#[derive(Debug)]
pub struct BrresWriter {
    options: BrresWriterOptions,
    dir_paths: Vec<String>,
    records: Vec<ChildRecord>,
}

impl Default for BrresWriter {
    fn default() -> Self {
        BrresWriter::new(BrresWriterOptions::default())
    }
}

fn split_path(path: &str) -> Result<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(str::is_empty) {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(trimmed.split('/').collect())
}

fn align_up(at: usize, alignment: usize) -> usize {
    at.div_ceil(alignment) * alignment
}

impl BrresWriter {
    pub fn new(options: BrresWriterOptions) -> BrresWriter {
        BrresWriter {
            options,
            dir_paths: vec![String::new()],
            records: Vec::new(),
        }
    }

    /// Add an empty directory, creating missing parents. Re-adding an
    /// existing directory is a no-op.
    pub fn add_directory(&mut self, path: &str) -> Result<()> {
        let components = split_path(path)?;
        self.ensure_dir(&components)?;
        Ok(())
    }

    /// Add a file record with its payload bytes, creating missing parent
    /// directories.
    pub fn add_file(&mut self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.add_source(path, InputSource::Bytes(bytes))
    }

    /// Add a file record whose payload is read during
    /// [`BrresWriter::build`]. A failing loader does not abort the build;
    /// the record keeps an empty payload and the failure lands in the
    /// report.
    pub fn add_file_with<F>(&mut self, path: &str, loader: F) -> Result<()>
    where
        F: FnOnce() -> std::io::Result<Vec<u8>> + 'static,
    {
        self.add_source(path, InputSource::Deferred(Box::new(loader)))
    }

    fn add_source(&mut self, path: &str, source: InputSource) -> Result<()> {
        let components = split_path(path)?;
        let (name, parents) = components
            .split_last()
            .expect("split_path rejects empty paths");
        let dir = self.ensure_dir(parents)?;
        self.check_free(dir, name.as_bytes())?;

        self.records.push(ChildRecord {
            dir,
            name: name.as_bytes().to_vec(),
            path: components.join("/"),
            kind: ChildKind::File(source),
        });
        Ok(())
    }

    /// Resolve `components` to a directory id, creating records for every
    /// missing level. Parents always receive a lower id than their
    /// children, so group serialization can resolve forward references in
    /// a single pass.
    fn ensure_dir(&mut self, components: &[&str]) -> Result<usize> {
        let mut dir = 0;
        let mut path = String::new();
        for comp in components {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(comp);

            dir = match self.dir_paths.iter().position(|p| p == &path) {
                Some(id) => id,
                None => {
                    self.check_free(dir, comp.as_bytes())?;
                    let id = self.dir_paths.len();
                    self.dir_paths.push(path.clone());
                    self.records.push(ChildRecord {
                        dir,
                        name: comp.as_bytes().to_vec(),
                        path: path.clone(),
                        kind: ChildKind::Directory(id),
                    });
                    id
                }
            };
        }
        Ok(dir)
    }

    fn check_free(&self, dir: usize, name: &[u8]) -> Result<()> {
        if self.records.iter().any(|r| r.dir == dir && r.name == name) {
            return Err(Error::DuplicateName {
                directory: self.dir_paths[dir].clone(),
                name: String::from_utf8_lossy(name).into_owned(),
            });
        }
        Ok(())
    }

    /// Assemble the container.
    #[instrument(skip(self), fields(records = self.records.len()))]
    pub fn build(mut self) -> Result<BrresOutput> {
        let schemas = self.options.schemas;
        let mut report = BuildReport::default();
        let mut pool = StringPool::new();

        // one trie per directory, entries inserted in record order
        let mut groups: Vec<TrieGroup> = self.dir_paths.iter().map(|_| TrieGroup::new()).collect();
        let mut targets: Vec<Vec<EntryTarget>> = self
            .dir_paths
            .iter()
            .map(|_| vec![EntryTarget::Sentinel])
            .collect();
        let mut loaded: Vec<(String, Vec<u8>)> = Vec::new();

        for rec in &mut self.records {
            let index = groups[rec.dir].insert(rec.name.as_slice());
            debug_assert_eq!(usize::from(index), targets[rec.dir].len());
            pool.insert(&rec.name);

            match &mut rec.kind {
                ChildKind::Directory(child) => targets[rec.dir].push(EntryTarget::Dir(*child)),
                ChildKind::File(source) => {
                    let source = mem::replace(source, InputSource::Bytes(Vec::new()));
                    let bytes = match source.load() {
                        Ok(bytes) => bytes,
                        Err(error) => {
                            warn!(path = %rec.path, %error, "deferred read failed, writing an empty payload");
                            report.failures.push(ReadFailure {
                                path: rec.path.clone(),
                                error,
                            });
                            report.rate(BuildStatus::ReadFailure);
                            Vec::new()
                        }
                    };
                    targets[rec.dir].push(EntryTarget::File(loaded.len()));
                    loaded.push((rec.path.clone(), bytes));
                }
            }
        }

        // the header's section count is 16 bits wide and the root counts
        assert!(
            loaded.len() < usize::from(u16::MAX),
            "too many sections in one container"
        );

        // first walk: pull every referenced string into the pool
        let mut payloads: Vec<Payload> = Vec::with_capacity(loaded.len());
        for (path, mut bytes) in loaded {
            let mut collect = Collect {
                pool: &mut pool,
                lowest_record: None,
            };
            let walked = walk(&mut bytes, &schemas, &mut collect)?;

            if walked.compat > Compat::Ok {
                if walked.compat == Compat::FreezeTarget {
                    warn!(
                        path = %path,
                        format = ?walked.format,
                        version = walked.version,
                        "sub-resource version is expected to freeze the target"
                    );
                }
                report.rate(walked.compat.into());
                report.notes.push(CompatNote {
                    path: path.clone(),
                    format: walked.format,
                    version: walked.version,
                    compat: walked.compat,
                });
            }

            let effective = effective_len(&bytes, &walked, collect.lowest_record);
            payloads.push(Payload {
                bytes,
                effective,
                at: 0,
            });
        }

        // layout: header, root section with every group, aligned payloads,
        // string table, total rounded up
        let mut at = HEADER_LEN + ROOT_HEADER_LEN;
        let mut group_offsets = Vec::with_capacity(groups.len());
        for group in &groups {
            group_offsets.push(at);
            at += GROUP_HEADER_LEN + ENTRY_LEN * group.len();
        }
        let root_size = at - HEADER_LEN;

        let alignment = self.options.alignment.max(1) as usize;
        for payload in &mut payloads {
            at = align_up(at, alignment);
            payload.at = at;
            at += payload.effective;
        }

        let pool_end = pool.finalize(at as u32, self.options.alignment.max(0x20)) as usize;
        let total = align_up(pool_end, 0x80);

        let mut out: Vec<u8> = Vec::with_capacity(total);
        let mut cursor = Cursor::new(&mut out);
        BrresHeader {
            size: total as u32,
            sections: (payloads.len() + 1) as u16,
            ..Default::default()
        }
        .write(&mut cursor)?;
        RootHeader {
            size: root_size as u32,
        }
        .write(&mut cursor)?;

        // (field position, owning group base, directory) awaiting that
        // directory's group position
        let mut backpatches: Vec<(usize, usize, usize)> = Vec::new();

        for (dir, group) in groups.iter().enumerate() {
            let group_at = group_offsets[dir];
            debug_assert_eq!(cursor.position() as usize, group_at);

            GroupHeader {
                size: (GROUP_HEADER_LEN + ENTRY_LEN * group.len()) as u32,
                count: (group.len() - 1) as u32,
            }
            .write(&mut cursor)?;

            for (index, entry) in group.entries().iter().enumerate() {
                let entry_at = group_at + GROUP_HEADER_LEN + ENTRY_LEN * index;
                let (name_off, data_off) = match &targets[dir][index] {
                    EntryTarget::Sentinel => (0, 0),
                    EntryTarget::Dir(child) => {
                        let name = pool
                            .resolve_bytes(&entry.name)
                            .expect("every record name is pooled");
                        backpatches.push((entry_at + 12, group_at, *child));
                        (name as usize - group_at, 0)
                    }
                    EntryTarget::File(i) => {
                        let name = pool
                            .resolve_bytes(&entry.name)
                            .expect("every record name is pooled");
                        (name as usize - group_at, payloads[*i].at - group_at)
                    }
                };
                EntryRecord {
                    id: entry.id,
                    reserved: 0,
                    left: entry.left,
                    right: entry.right,
                    name_off: name_off as u32,
                    data_off: data_off as u32,
                }
                .write(&mut cursor)?;
            }

            // every record pointing here learns its slot now
            let mut i = 0;
            while i < backpatches.len() {
                if backpatches[i].2 == dir {
                    let (field_at, owner, _) = backpatches.swap_remove(i);
                    let buf = cursor.get_mut().as_mut_slice();
                    BigEndian::write_u32(&mut buf[field_at..field_at + 4], (group_at - owner) as u32);
                } else {
                    i += 1;
                }
            }
        }
        debug_assert!(backpatches.is_empty(), "a group was never serialized");
        drop(cursor);

        // second walk: rewrite every string reference against the final
        // layout, then copy the (possibly shrunk) payloads
        for payload in &mut payloads {
            let mut adjust = Adjust {
                pool: &pool,
                blob_at: payload.at,
                rewritten: HashSet::new(),
            };
            walk(&mut payload.bytes, &schemas, &mut adjust)?;

            out.resize(payload.at, 0);
            out.extend_from_slice(&payload.bytes[..payload.effective]);
        }

        pool.emit(&mut out);
        out.resize(total, 0);

        info!(
            size = total,
            sections = payloads.len() + 1,
            status = ?report.status,
            "container assembled"
        );
        Ok(BrresOutput { bytes: out, report })
    }
}

enum EntryTarget {
    Sentinel,
    Dir(usize),
    File(usize),
}

struct Payload {
    bytes: Vec<u8>,
    effective: usize,
    at: usize,
}

/// First-pass visitor: pools every referenced string and remembers the
/// lowest embedded record start.
struct Collect<'a> {
    pool: &'a mut StringPool,
    lowest_record: Option<usize>,
}

impl SubVisitor for Collect<'_> {
    fn string_ref(&mut self, data: &mut [u8], at: usize, base: usize) -> SubResult<()> {
        let off = BigEndian::read_u32(&data[at..at + 4]) as usize;
        if off == 0 {
            return Ok(());
        }
        let target = base + off;
        let Some(len) = data
            .get(target..)
            .and_then(|tail| tail.iter().position(|&b| b == 0))
        else {
            warn!(at, base, "string reference points outside the blob, leaving it");
            return Ok(());
        };
        self.pool.insert(&data[target..target + len]);
        if target >= 4 {
            let record = target - 4;
            self.lowest_record = Some(self.lowest_record.map_or(record, |r| r.min(record)));
        }
        Ok(())
    }
}

/// Second-pass visitor: rewrites reference fields to the pooled records.
/// Field positions already rewritten are skipped, so aliased entry data
/// is only adjusted once.
struct Adjust<'a> {
    pool: &'a StringPool,
    blob_at: usize,
    rewritten: HashSet<usize>,
}

impl SubVisitor for Adjust<'_> {
    fn string_ref(&mut self, data: &mut [u8], at: usize, base: usize) -> SubResult<()> {
        if !self.rewritten.insert(at) {
            return Ok(());
        }
        let off = BigEndian::read_u32(&data[at..at + 4]) as usize;
        if off == 0 {
            return Ok(());
        }
        let target = base + off;
        let Some(len) = data
            .get(target..)
            .and_then(|tail| tail.iter().position(|&b| b == 0))
        else {
            return Ok(());
        };
        let Some(resolved) = self.pool.resolve_bytes(&data[target..target + len]) else {
            warn!(at, "string missing from the pool, leaving the reference");
            return Ok(());
        };
        let relative = resolved as usize - (self.blob_at + base);
        BigEndian::write_u32(&mut data[at..at + 4], relative as u32);
        Ok(())
    }
}

/// Length of the payload prefix worth copying into the container.
///
/// A payload shrinks only when everything past the candidate cut is
/// provably its own embedded string table, now superseded by the shared
/// pool. Anything else, pixel data included, keeps the payload intact.
fn effective_len(data: &[u8], report: &WalkReport, lowest_record: Option<usize>) -> usize {
    let full = data.len();
    let candidate = match (report.string_table_at, lowest_record) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return full,
    };
    if candidate < report.structures_end || candidate >= full {
        return full;
    }
    if !trailing_strings_only(data, candidate, report.body.min(full)) {
        return full;
    }
    candidate
}

/// Are the bytes of `data[from..to]` nothing but length-prefixed string
/// records and zero padding?
fn trailing_strings_only(data: &[u8], from: usize, to: usize) -> bool {
    let mut at = from;
    while at < to {
        if data[at..to].iter().all(|&b| b == 0) {
            return true;
        }
        if at % 4 != 0 {
            return false;
        }
        let Some(prefix) = data.get(at..at + 4) else {
            return false;
        };
        let len = BigEndian::read_u32(prefix) as usize;
        let end = at + 4 + len;
        if end >= to || data[end] != 0 {
            return false;
        }
        if data[at + 4..end].iter().any(|&b| b == 0) {
            return false;
        }
        at = align_up(end + 1, 4);
    }
    true
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{BrresWriter, BrresWriterOptions, BuildStatus, ChildKind, ChildRecord, InputSource};
    use crate::error::Error;

    #[traced_test]
    #[test]
    fn empty_container_is_one_section() {
        let output = BrresWriter::default().build().unwrap();

        // header, root with the empty root group, rounded up
        assert_eq!(output.bytes.len(), 0x80);
        assert_eq!(&output.bytes[0..4], b"bres");
        assert_eq!(output.bytes[15], 1, "root is the only section");
        assert_eq!(output.report.status, BuildStatus::Ok);
    }

    #[test]
    fn duplicate_file_name_is_rejected() {
        let mut writer = BrresWriter::default();
        writer.add_file("dir/a.bin", vec![1]).unwrap();
        let err = writer.add_file("dir/a.bin", vec![2]).unwrap_err();

        assert!(matches!(
            err,
            Error::DuplicateName { directory, name } if directory == "dir" && name == "a.bin"
        ));
    }

    #[test]
    fn file_colliding_with_directory_is_rejected() {
        let mut writer = BrresWriter::default();
        writer.add_directory("models").unwrap();
        assert!(writer.add_file("models", vec![]).is_err());
    }

    #[test]
    fn invalid_paths_are_rejected() {
        let mut writer = BrresWriter::default();
        assert!(matches!(
            writer.add_file("", vec![]),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            writer.add_file("a//b", vec![]),
            Err(Error::InvalidPath(_))
        ));
        assert!(writer.add_directory("/models/").is_ok());
    }

    #[traced_test]
    #[test]
    fn failing_loader_degrades_instead_of_aborting() {
        let mut writer = BrresWriter::default();
        writer.add_file("good.bin", vec![0xAA; 4]).unwrap();
        writer
            .add_file_with("bad.bin", || {
                Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))
            })
            .unwrap();

        let output = writer.build().unwrap();

        assert_eq!(output.report.status, BuildStatus::ReadFailure);
        assert_eq!(output.report.failures.len(), 1);
        assert_eq!(output.report.failures[0].path, "bad.bin");
        assert_eq!(&output.bytes[0..4], b"bres");
    }

    #[test]
    #[should_panic(expected = "too many sections")]
    fn section_count_past_capacity_fails_fast() {
        // records pushed directly, skipping the per-add duplicate scan
        let mut writer = BrresWriter::default();
        for d in 0..257usize {
            let dir = format!("d{d:03}");
            writer.dir_paths.push(dir.clone());
            writer.records.push(ChildRecord {
                dir: 0,
                name: dir.as_bytes().to_vec(),
                path: dir.clone(),
                kind: ChildKind::Directory(d + 1),
            });
            for f in 0..256 {
                let name = format!("f{f:03}");
                writer.records.push(ChildRecord {
                    dir: d + 1,
                    name: name.as_bytes().to_vec(),
                    path: format!("{dir}/{name}"),
                    kind: ChildKind::File(InputSource::Bytes(Vec::new())),
                });
            }
        }

        let _ = writer.build();
    }

    #[test]
    fn identical_inputs_build_identical_bytes() {
        let build = || {
            let mut writer = BrresWriter::new(BrresWriterOptions::default());
            writer.add_file("dir/a.bin", vec![1, 2, 3]).unwrap();
            writer.add_file("dir/b.bin", vec![4, 5, 6]).unwrap();
            writer.add_file("top.bin", vec![7]).unwrap();
            writer.build().unwrap().bytes
        };

        assert_eq!(build(), build());
    }
}
