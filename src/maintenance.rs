//! Dataset maintenance (spec §4.10): classify every segment against
//! the index/manifest and, optionally, remediate what's found.
//! Segment-level work fans out across `rayon`, the teacher's own
//! parallelism crate for bulk index/btree scans.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::dataset::config::{Config, Kind};
use crate::error::Result;
use crate::file_lock::FileLock;
use crate::index::manifest::Manifest;
use crate::index::ondisk2::OnDisk2Index;
use crate::reader_pool;
use crate::scanner;
use crate::segment::{self, SegmentId, State};
use crate::summary::Summary;
use crate::time::Time;
use crate::util;

use crate::dataset::writer::read_metadata_sidecar;

const SENTINEL: &str = "needs-check-do-not-pack";

/// One segment's classified state (spec §4.10's classification table).
#[derive(Debug, Clone)]
pub struct SegmentStatus {
    pub relpath: PathBuf,
    pub state: State,
}

/// Accumulated counters and a human-readable log (spec §4.10
/// "Reports... one line per action").
#[derive(Debug, Default)]
pub struct Report {
    pub statuses: Vec<SegmentStatus>,
    pub rescanned: u64,
    pub packed: u64,
    pub archived: u64,
    pub deleted: u64,
    pub bytes_reclaimed: u64,
    pub lines: Vec<String>,
}

impl Report {
    fn log(&mut self, line: String) {
        log::info!("{}", line);
        self.lines.push(line);
    }
}

fn now() -> Time {
    use chrono::{Datelike, Utc};
    let n = Utc::now();
    Time::new(n.year(), n.month(), n.day(), 0, 0, 0)
}

fn age_days(end: Time, now: Time) -> i64 {
    use chrono::NaiveDate;
    let a = NaiveDate::from_ymd_opt(end.year, end.month, end.day).unwrap();
    let b = NaiveDate::from_ymd_opt(now.year, now.month, now.day).unwrap();
    (b - a).num_days()
}

fn segment_id(config: &Config, relpath: &Path) -> SegmentId {
    SegmentId::new(config.format, config.path.clone(), relpath.to_path_buf())
}

/// Segments the index/manifest knows about, each with its expected
/// `(offset, size)` byte ranges (for segments with no uniqueness index
/// at all, this is every record currently in the `.metadata` sidecar).
fn expected_segments(config: &Config) -> Result<Vec<(PathBuf, Vec<(u64, u64)>)>> {
    match config.kind {
        Kind::OnDisk2 => {
            let index = OnDisk2Index::open_read_only(
                &config.path.join("index.sqlite"),
                config.unique_fields.clone(),
                config.indexed_fields.clone(),
            )?;
            let mut out = Vec::new();
            for file in index.all_files()? {
                let ranges = index
                    .rows_for_file(&file)?
                    .into_iter()
                    .map(|(_id, offset, size)| (offset, size))
                    .collect();
                out.push((PathBuf::from(file), ranges));
            }
            Ok(out)
        }
        Kind::Simple => {
            let manifest = Manifest::open(&config.path)?;
            let mut out = Vec::new();
            for entry in manifest.entries() {
                let relpath = PathBuf::from(&entry.file);
                let id = segment_id(config, &relpath);
                let ranges = read_metadata_sidecar(&id.metadata_path())?
                    .into_iter()
                    .filter_map(|md| match md.source() {
                        Some(crate::metadata::Source::Blob { offset, size, .. }) => Some((*offset, *size)),
                        _ => None,
                    })
                    .collect();
                out.push((relpath, ranges));
            }
            Ok(out)
        }
    }
}

/// Every segment-shaped file actually present under the dataset root,
/// ignoring sidecars, the lock file, config and `.archive/`.
fn actual_segments(config: &Config) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    walk(&config.path, &config.path, config, &mut out)?;
    Ok(out)
}

fn walk(root: &Path, dir: &Path, config: &Config, out: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == ".archive" || name == "lock" || name == "config" || name == "index.sqlite" || name == "MANIFEST" {
            continue;
        }
        if name.ends_with(".metadata") || name.ends_with(".summary") || name.ends_with(".tmp") {
            continue;
        }
        let ext = format!(".{}", config.format.as_str());
        if path.is_dir() {
            if name.ends_with(&ext) {
                out.push(path.strip_prefix(root).unwrap().to_path_buf());
            } else {
                walk(root, &path, config, out)?;
            }
            continue;
        }
        if name.ends_with(&ext) {
            out.push(path.strip_prefix(root).unwrap().to_path_buf());
        }
    }
    Ok(())
}

fn classify_one(config: &Config, relpath: &Path, expected: Option<&[(u64, u64)]>, quick: bool) -> Result<State> {
    let id = segment_id(config, relpath);
    let checker = segment::detect_checker(&id)?;

    let state = match expected {
        Some(ranges) => {
            let mut state = checker.check(ranges, quick)?;
            if !ranges.is_empty() {
                let mut sorted = ranges.to_vec();
                sorted.sort_by_key(|(o, _)| *o);
                let covered: u64 = sorted.iter().map(|(_, s)| s).sum();
                let span = sorted.last().map(|(o, s)| o + s).unwrap_or(0) - sorted.first().map(|(o, _)| *o).unwrap_or(0);
                if covered < span {
                    state |= State::HOLES;
                }
            }
            let summary_path = id.summary_path();
            if summary_path.exists() {
                let summary = Summary::decode(&std::fs::read(&summary_path)?)?;
                if let Some(interval) = summary.date_extremes() {
                    if let Some(end) = interval.end {
                        let n = now();
                        if let Some(days) = config.delete_age_days {
                            if age_days(end, n) >= days {
                                state |= State::DELETE_AGE;
                            }
                        }
                        if let Some(days) = config.archive_age_days {
                            if age_days(end, n) >= days {
                                state |= State::ARCHIVE_AGE;
                            }
                        }
                    }
                }
            }
            state
        }
        None => State::UNALIGNED,
    };
    Ok(state)
}

/// Classify every known/actual segment (spec §4.10 `check`).
pub fn check(config: &Config, quick: bool) -> Result<Report> {
    let expected = expected_segments(config)?;
    let actual = actual_segments(config)?;

    let mut all: Vec<PathBuf> = expected.iter().map(|(p, _)| p.clone()).collect();
    for relpath in &actual {
        if !all.contains(relpath) {
            all.push(relpath.clone());
        }
    }

    let statuses: Result<Vec<SegmentStatus>> = all
        .par_iter()
        .map(|relpath| {
            let ranges = expected.iter().find(|(p, _)| p == relpath).map(|(_, r)| r.as_slice());
            let state = classify_one(config, relpath, ranges, quick)?;
            Ok(SegmentStatus {
                relpath: relpath.clone(),
                state,
            })
        })
        .collect();
    let statuses = statuses?;

    let mut report = Report::default();
    for status in &statuses {
        report.log(format!("{}: {}", status.relpath.display(), status.state));
    }
    report.statuses = statuses;
    Ok(report)
}

/// Rescan a DIRTY/CORRUPTED segment: regenerate `.metadata`/`.summary`
/// from the raw bytes and replace its index rows (spec §4.10 step 1).
fn rescan_segment(config: &Config, relpath: &Path, index: Option<&mut OnDisk2Index>) -> Result<u64> {
    let id = segment_id(config, relpath);
    let scanner = scanner::get(id.format)
        .ok_or_else(|| crate::error::Error::Unsupported(format!("no scanner registered for {}", id.format.as_str())))?;
    let data = std::fs::read(id.abspath())?;

    let mut records = Vec::new();
    let mut summary = Summary::new();
    for (offset, size) in scanner.split(&data)? {
        let end = (offset + size) as usize;
        let mut md = scanner.scan_message(&data[offset as usize..end])?;
        md.set_source(crate::metadata::Source::Blob {
            format: id.format,
            root: id.root.clone(),
            relpath: id.relpath.clone(),
            offset,
            size,
        });
        summary.add(&md, size);
        records.push(md);
    }

    let mut bytes = Vec::new();
    for md in &records {
        bytes.extend(crate::codec::binary::encode_bundle(&crate::codec::binary::Bundle::Md(md.clone()))?);
    }
    util::atomic_rewrite(&id.metadata_path(), &bytes)?;
    util::atomic_rewrite(&id.summary_path(), &summary.encode())?;

    if let Some(index) = index {
        index.remove_file(&relpath.to_string_lossy())?;
        for md in &records {
            let (offset, size) = match md.source() {
                Some(crate::metadata::Source::Blob { offset, size, .. }) => (*offset, *size),
                _ => continue,
            };
            index.insert(md, &relpath.to_string_lossy(), offset, size)?;
        }
    }
    reader_pool::evict(&id);
    Ok(records.len() as u64)
}

/// Pack one segment: rewrite it with its tombstoned ranges dropped and
/// move every surviving row to its new offset (spec §4.10 step 2).
fn pack_segment(config: &Config, relpath: &Path, index: &mut OnDisk2Index) -> Result<u64> {
    let id = segment_id(config, relpath);
    let rows = index.rows_for_file(&relpath.to_string_lossy())?;
    let ids: Vec<i64> = rows.iter().map(|(id, _, _)| *id).collect();
    let keep: Vec<(u64, u64)> = rows.iter().map(|(_, o, s)| (*o, *s)).collect();
    let old_len = std::fs::metadata(id.abspath())?.len();

    let checker = segment::detect_checker(&id)?;
    let new_ranges = checker.repack(&keep)?;
    let new_len: u64 = new_ranges.iter().map(|(_, s)| s).sum();
    index.relocate_rows(&ids, &new_ranges)?;
    reader_pool::evict(&id);
    Ok(old_len.saturating_sub(new_len))
}

/// Archive one segment past `archive age` into `<dataset>/.archive/last/`
/// and record it in that archive's own simple-dataset manifest (spec
/// §4.10 step 3).
fn archive_segment(config: &Config, relpath: &Path, index: Option<&mut OnDisk2Index>) -> Result<()> {
    let id = segment_id(config, relpath);
    let archive_root = config.path.join(".archive").join("last");
    let dest_id = segment_id(&Config { path: archive_root.clone(), ..config.clone() }, relpath);
    if let Some(parent) = dest_id.abspath().parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::rename(id.abspath(), dest_id.abspath())?;
    if id.metadata_path().exists() {
        std::fs::rename(id.metadata_path(), dest_id.metadata_path())?;
    }
    if id.summary_path().exists() {
        std::fs::rename(id.summary_path(), dest_id.summary_path())?;
    }

    if let Some(index) = index {
        index.remove_file(&relpath.to_string_lossy())?;
    }

    let mut archive_manifest = Manifest::open(&archive_root)?;
    if dest_id.summary_path().exists() {
        let summary = Summary::decode(&std::fs::read(dest_id.summary_path())?)?;
        if let Some(interval) = summary.date_extremes() {
            archive_manifest.upsert(crate::index::manifest::Entry {
                file: relpath.to_string_lossy().to_string(),
                mtime: util::mtime_secs(&dest_id.abspath())?,
                start_time: interval.begin.unwrap_or(Time::UNDEFINED),
                end_time: interval.end.unwrap_or(Time::UNDEFINED),
            });
        }
    }
    archive_manifest.save()?;
    reader_pool::evict(&id);
    Ok(())
}

fn delete_segment(config: &Config, relpath: &Path, index: Option<&mut OnDisk2Index>, manifest: Option<&mut Manifest>) -> Result<u64> {
    let id = segment_id(config, relpath);
    let len = std::fs::metadata(id.abspath()).map(|m| m.len()).unwrap_or(0);
    std::fs::remove_file(id.abspath()).ok();
    std::fs::remove_file(id.metadata_path()).ok();
    std::fs::remove_file(id.summary_path()).ok();
    if let Some(index) = index {
        index.remove_file(&relpath.to_string_lossy())?;
    }
    if let Some(manifest) = manifest {
        manifest.remove(&relpath.to_string_lossy());
    }
    reader_pool::evict(&id);
    Ok(len)
}

/// Run the full remediation pipeline (spec §4.10 `repack`): rescan,
/// pack, archive, delete, deindex orphans, in that order, under the
/// dataset's exclusive write lock. `write = false` only classifies and
/// logs what would happen.
pub fn repack(config: &Config, write: bool) -> Result<Report> {
    let lock = FileLock::open(&config.path.join("lock"))?;
    lock.try_lock_exclusive()?;

    let sentinel = config.path.join(SENTINEL);
    let mut report = check(config, false)?;

    let mut index = match config.kind {
        Kind::OnDisk2 => Some(OnDisk2Index::open(
            &config.path.join("index.sqlite"),
            config.unique_fields.clone(),
            config.indexed_fields.clone(),
        )?),
        Kind::Simple => None,
    };
    let mut manifest = match config.kind {
        Kind::Simple => Some(Manifest::open(&config.path)?),
        Kind::OnDisk2 => None,
    };

    for status in report.statuses.clone() {
        if status.state.contains(State::DIRTY) || status.state.contains(State::CORRUPTED) || status.state.contains(State::UNALIGNED) {
            if write {
                match rescan_segment(config, &status.relpath, index.as_mut()) {
                    Ok(n) => {
                        report.rescanned += 1;
                        report.log(format!("rescanned {} ({} records)", status.relpath.display(), n));
                    }
                    Err(e) => report.log(format!("rescan failed for {}: {}", status.relpath.display(), e)),
                }
            } else {
                report.log(format!("would rescan {}", status.relpath.display()));
            }
        }

        if status.state.contains(State::HOLES) {
            if let Some(index) = index.as_mut() {
                if write {
                    let reclaimed = pack_segment(config, &status.relpath, index)?;
                    report.packed += 1;
                    report.bytes_reclaimed += reclaimed;
                    report.log(format!("packed {} ({} bytes reclaimed)", status.relpath.display(), reclaimed));
                } else {
                    report.log(format!("would pack {}", status.relpath.display()));
                }
            }
        }

        if status.state.contains(State::ARCHIVE_AGE) {
            if write {
                archive_segment(config, &status.relpath, index.as_mut())?;
                report.archived += 1;
                report.log(format!("archived {}", status.relpath.display()));
            } else {
                report.log(format!("would archive {}", status.relpath.display()));
            }
        } else if status.state.contains(State::DELETE_AGE) {
            if write {
                let freed = delete_segment(config, &status.relpath, index.as_mut(), manifest.as_mut())?;
                report.deleted += 1;
                report.bytes_reclaimed += freed;
                report.log(format!("deleted {} ({} bytes)", status.relpath.display(), freed));
            } else {
                report.log(format!("would delete {}", status.relpath.display()));
            }
        }

        if status.state.contains(State::DELETED) && write {
            if let Some(index) = index.as_mut() {
                index.remove_file(&status.relpath.to_string_lossy())?;
            }
            if let Some(manifest) = manifest.as_mut() {
                manifest.remove(&status.relpath.to_string_lossy());
            }
            report.log(format!("deindexed orphan {}", status.relpath.display()));
        }
    }

    if write {
        if let Some(index) = index.as_mut() {
            index.commit()?;
        }
        if let Some(manifest) = manifest.as_mut() {
            manifest.save()?;
        }
        std::fs::remove_file(&sentinel).ok();
    }

    Ok(report)
}

#[path = "maintenance_test.rs"]
#[cfg(test)]
mod maintenance_test;
