//! Pluggable on-disk message containers (spec §4.4): every segment
//! kind exposes the same `Reader`/`Writer`/`Checker` triplet; dispatch
//! between kinds happens once, at `detect_*` time, by inspecting the
//! segment's abspath (extension or directory-ness) the way the teacher
//! dispatches between its own storage engines (`src/robt.rs` vs
//! `src/llrb.rs`) at construction time rather than through a shared
//! trait object hierarchy.

pub mod concat;
pub mod dir;
pub mod gz;
pub mod lines;
pub mod tar;
pub mod zip;

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::err_at;
use crate::error::Result;
use crate::metadata::{DataFormat, Metadata};

/// Identifies one segment: `abspath = root/relpath` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentId {
    pub format: DataFormat,
    pub root: PathBuf,
    pub relpath: PathBuf,
}

impl SegmentId {
    pub fn new(format: DataFormat, root: impl Into<PathBuf>, relpath: impl Into<PathBuf>) -> SegmentId {
        SegmentId {
            format,
            root: root.into(),
            relpath: relpath.into(),
        }
    }

    pub fn abspath(&self) -> PathBuf {
        self.root.join(&self.relpath)
    }

    pub fn metadata_path(&self) -> PathBuf {
        append_ext(&self.abspath(), "metadata")
    }

    pub fn summary_path(&self) -> PathBuf {
        append_ext(&self.abspath(), "summary")
    }
}

fn append_ext(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

/// Where one message's bytes live within a segment, relative to the
/// segment's own `root` (spec §3 `Source::Blob` minus `format`/`root`,
/// since those are constant for every blob produced by one segment).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLocation {
    pub relpath: PathBuf,
    pub offset: u64,
    pub size: u64,
}

/// The container kind, determined once from the segment's abspath
/// shape (spec §4.4 "Format dispatch").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Concat,
    Lines,
    Dir,
    Tar,
    Zip,
    GzConcat,
    GzLines,
}

impl Kind {
    /// Whether this container kind can store messages of `format`
    /// (spec §4.4 "Each format declares `can_store`").
    pub fn can_store(&self, format: DataFormat) -> bool {
        match self {
            Kind::Lines | Kind::GzLines => format == DataFormat::Vm2,
            _ => format != DataFormat::Vm2,
        }
    }
}

/// Inspect `id`'s abspath and classify its container kind. `is_dir`
/// lets callers (and tests) avoid a real stat call when the segment
/// doesn't exist on disk yet (a brand-new segment about to be created
/// defaults to `Concat`/`Dir` depending on the dataset's `segments`
/// config, decided by the caller, not here).
pub fn detect_kind(id: &SegmentId) -> Result<Kind> {
    let path = id.abspath();
    let relpath_str = id.relpath.to_string_lossy();
    if relpath_str.ends_with(".tar") {
        return Ok(Kind::Tar);
    }
    if relpath_str.ends_with(".zip") {
        return Ok(Kind::Zip);
    }
    if relpath_str.ends_with(".gz") {
        return Ok(if id.format == DataFormat::Vm2 {
            Kind::GzLines
        } else {
            Kind::GzConcat
        });
    }
    if path.is_dir() {
        return Ok(Kind::Dir);
    }
    Ok(if id.format == DataFormat::Vm2 { Kind::Lines } else { Kind::Concat })
}

/// `check(quick)`/`repack` outcome: a bitfield so multiple conditions
/// can be reported together (spec §4.4, §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct State(u16);

impl State {
    pub const OK: State = State(0);
    pub const DIRTY: State = State(1 << 0);
    pub const UNALIGNED: State = State(1 << 1);
    pub const MISSING: State = State(1 << 2);
    pub const DELETED: State = State(1 << 3);
    pub const CORRUPTED: State = State(1 << 4);
    pub const ARCHIVE_AGE: State = State(1 << 5);
    pub const DELETE_AGE: State = State(1 << 6);
    /// Index rows present but tombstoned offsets leave holes in the
    /// segment's bytes (spec §4.10 "TO_PACK").
    pub const HOLES: State = State(1 << 7);

    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, flag: State) -> bool {
        flag.0 != 0 && self.0 & flag.0 == flag.0
    }
}

impl std::ops::BitOr for State {
    type Output = State;
    fn bitor(self, rhs: State) -> State {
        State(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for State {
    fn bitor_assign(&mut self, rhs: State) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "OK");
        }
        let mut names = Vec::new();
        for (flag, name) in [
            (State::DIRTY, "DIRTY"),
            (State::UNALIGNED, "UNALIGNED"),
            (State::MISSING, "MISSING"),
            (State::DELETED, "DELETED"),
            (State::CORRUPTED, "CORRUPTED"),
            (State::ARCHIVE_AGE, "ARCHIVE_AGE"),
            (State::DELETE_AGE, "DELETE_AGE"),
            (State::HOLES, "HOLES"),
        ] {
            if self.contains(flag) {
                names.push(name);
            }
        }
        write!(f, "{}", names.join("|"))
    }
}

/// Reads message metadata and bytes out of a sealed or in-progress
/// segment (spec §4.4 `Reader`). `Send + Sync` so the process-global
/// reader pool (spec §5) can share one instance across threads.
pub trait SegmentReader: Send + Sync {
    /// Scan every message in file order, calling `dest` with metadata
    /// carrying a `Source`-less `Blob` location (the caller sets format
    /// and root). Returning `false` from `dest` cancels the scan.
    fn scan_data(&self, dest: &mut dyn FnMut(Metadata, BlobLocation) -> bool) -> Result<()>;

    fn read(&self, loc: &BlobLocation) -> Result<Vec<u8>>;

    fn stream(&self, loc: &BlobLocation, out: &mut dyn Write) -> Result<u64> {
        let data = self.read(loc)?;
        out.write_all(&data)?;
        Ok(data.len() as u64)
    }
}

/// Appends new messages to a segment (spec §4.4 `Writer`). Two-phase:
/// [`SegmentWriter::append`] writes bytes to durable storage
/// immediately; [`SegmentWriter::commit`] only needs to fsync (concat/
/// lines) or rename staged files into place (dir), matching the
/// dataset writer's "fsync every touched segment, then SQL COMMIT"
/// ordering (spec §4.7, §5).
pub trait SegmentWriter {
    fn next_offset(&self) -> u64;

    fn append(&mut self, data: &[u8]) -> Result<BlobLocation>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Infallible best-effort cleanup for `Drop` paths; never panics,
    /// logs instead (spec §4.4, §9 "two-phase append").
    fn rollback_nothrow(&mut self) {
        if let Err(err) = self.rollback() {
            log::warn!("rollback_nothrow: cleanup failed: {}", err);
        }
    }
}

/// True if any two `(offset, size)` ranges overlap, checked after
/// sorting by `offset` (spec data model invariant 6, §4.4 `Checker`:
/// "no overlap"). Used by the byte-addressed container checkers
/// (concat, lines); `dir` checks index collisions instead, since its
/// `expected` positions are sequence numbers, not byte ranges.
fn ranges_overlap(expected: &[(u64, u64)]) -> bool {
    let mut sorted: Vec<(u64, u64)> = expected.to_vec();
    sorted.sort_by_key(|(offset, _)| *offset);
    sorted.windows(2).any(|w| {
        let (offset, size) = w[0];
        let (next_offset, _) = w[1];
        offset + size > next_offset
    })
}

/// True if any position (first element) appears more than once in
/// `expected` — the `dir` segment's analogue of the byte-range overlap
/// check, since one sequence number can only ever name one file.
fn positions_collide(expected: &[(u64, u64)]) -> bool {
    let mut positions: Vec<u64> = expected.iter().map(|(p, _)| *p).collect();
    positions.sort_unstable();
    positions.windows(2).any(|w| w[0] == w[1])
}

/// Checks and repairs a segment (spec §4.4 `Checker`, §4.10).
pub trait SegmentChecker {
    /// Validate the segment's bytes against `expected` (offset, size)
    /// ranges. `quick` skips deep per-message validation.
    fn check(&self, expected: &[(u64, u64)], quick: bool) -> Result<State>;

    /// Rewrite the segment retaining only `keep` ranges (in order),
    /// returning their new `(offset, size)` locations after the
    /// rewrite (spec §4.10 "Pack").
    fn repack(&self, keep: &[(u64, u64)]) -> Result<Vec<(u64, u64)>>;

    fn remove(&self) -> Result<()>;

    /// Seal this segment into a tar archive in place, returning the new
    /// `Kind::Tar` segment's id (spec §4.4 `Checker::tar`). Only
    /// concat/dir segments can be sealed; already-sealed kinds return
    /// `Unsupported`.
    fn tar(&self) -> Result<SegmentId> {
        err_at!(Unsupported, "tar: not supported for this segment kind")
    }

    /// Seal this segment into a zip archive in place (spec §4.4
    /// `Checker::zip`).
    fn zip(&self) -> Result<SegmentId> {
        err_at!(Unsupported, "zip: not supported for this segment kind")
    }

    /// Seal this segment into `groupsize`-message gzip groups in place
    /// (spec §4.4 `Checker::compress`).
    fn compress(&self, groupsize: usize) -> Result<SegmentId> {
        let _ = groupsize;
        err_at!(Unsupported, "compress: not supported for this segment kind")
    }

    /// Test-suite seeding hooks (spec §4.4 `Checker`, §8's quantified
    /// segment-lifecycle property): deliberately corrupt the segment so
    /// a subsequent `check()`/`repack()` has something to find. Default
    /// to `Unsupported` for sealed kinds that these don't apply to.
    fn test_truncate(&self, size: u64) -> Result<()> {
        let _ = size;
        err_at!(Unsupported, "test_truncate: not supported for this segment kind")
    }

    /// Overwrite the bytes at `offset..offset+size` with zeroes,
    /// simulating a hole torn in an existing record.
    fn make_hole(&self, offset: u64, size: u64) -> Result<()> {
        let _ = (offset, size);
        err_at!(Unsupported, "make_hole: not supported for this segment kind")
    }

    /// Duplicate the segment's first record's bytes over the start of
    /// its second, seeding an overlap for `check()` to detect.
    fn make_overlap(&self) -> Result<()> {
        err_at!(Unsupported, "make_overlap: not supported for this segment kind")
    }

    /// Flip a byte inside the segment's first record, seeding a
    /// validation failure for `check()` to detect.
    fn corrupt(&self) -> Result<()> {
        err_at!(Unsupported, "corrupt: not supported for this segment kind")
    }
}

/// Construct the reader for `id`'s container kind.
pub fn detect_reader(id: &SegmentId) -> Result<Box<dyn SegmentReader>> {
    match detect_kind(id)? {
        Kind::Concat => Ok(Box::new(concat::ConcatReader::open(id.clone())?)),
        Kind::Lines => Ok(Box::new(lines::LinesReader::open(id.clone())?)),
        Kind::Dir => Ok(Box::new(dir::DirReader::open(id.clone())?)),
        Kind::Tar => Ok(Box::new(tar::TarReader::open(id.clone())?)),
        Kind::Zip => Ok(Box::new(zip::ZipReader::open(id.clone())?)),
        Kind::GzConcat => Ok(Box::new(gz::GzConcatReader::open(id.clone())?)),
        Kind::GzLines => Ok(Box::new(gz::GzLinesReader::open(id.clone())?)),
    }
}

/// Construct the writer for `id`'s container kind. `kind` is passed in
/// explicitly (rather than re-detected) since a brand-new segment has
/// nothing on disk yet to detect from; the dataset writer decides
/// `Concat` vs `Dir` from the `segments` config key (spec §6).
pub fn detect_writer(id: &SegmentId, kind: Kind) -> Result<Box<dyn SegmentWriter>> {
    match kind {
        Kind::Concat => Ok(Box::new(concat::ConcatWriter::open(id.clone())?)),
        Kind::Lines => Ok(Box::new(lines::LinesWriter::open(id.clone())?)),
        Kind::Dir => Ok(Box::new(dir::DirWriter::open(id.clone())?)),
        Kind::Tar | Kind::Zip | Kind::GzConcat | Kind::GzLines => {
            err_at!(Unsupported, "cannot append to a sealed/compressed segment ({:?})", kind)
        }
    }
}

pub fn detect_checker(id: &SegmentId) -> Result<Box<dyn SegmentChecker>> {
    match detect_kind(id)? {
        Kind::Concat => Ok(Box::new(concat::ConcatChecker::new(id.clone()))),
        Kind::Lines => Ok(Box::new(lines::LinesChecker::new(id.clone()))),
        Kind::Dir => Ok(Box::new(dir::DirChecker::new(id.clone()))),
        Kind::Tar => Ok(Box::new(tar::TarChecker::new(id.clone()))),
        Kind::Zip => Ok(Box::new(zip::ZipChecker::new(id.clone()))),
        Kind::GzConcat | Kind::GzLines => Ok(Box::new(gz::GzChecker::new(id.clone()))),
    }
}
