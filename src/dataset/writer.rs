//! The dataset writer (spec §4.7): computes a segment relpath from a
//! record's reftime, applies the replace policy, appends the bytes,
//! and drives whichever index backend the dataset's `type` selects.
//! Both backends always maintain the per-segment `.metadata`/`.summary`
//! sidecars (spec §6 on-disk layout shows them for `ondisk2` and
//! `simple` alike); only `ondisk2` additionally drives a SQL index,
//! since `simple` datasets have no uniqueness index at all (spec §4.6).

use std::collections::HashMap;
use std::path::PathBuf;

use crate::codec::binary::{decode_bundle, encode_bundle, Bundle};
use crate::error::{Error, Result};
use crate::file_lock::FileLock;
use crate::index::manifest::{Entry as ManifestEntry, Manifest};
use crate::index::ondisk2::{extract_usn, DuplicateCheck, OnDisk2Index};
use crate::index::{AcquireResult, ReplacePolicy};
use crate::metadata::{Metadata, Source};
use crate::segment::{self, SegmentId, SegmentWriter};
use crate::summary::Summary;
use crate::util;

use super::config::{Config, Kind, SegmentsMode};

enum Backend {
    OnDisk2(OnDisk2Index),
    Simple(Manifest),
}

struct PendingRecord {
    relpath: PathBuf,
    md: Metadata,
}

/// Handle for one open write transaction against a dataset (spec
/// §4.7). Holds the dataset's exclusive advisory lock for its whole
/// lifetime, the way the teacher's `Wal`/`Bogn` writers hold their own
/// append lock across a batch.
pub struct Writer {
    config: Config,
    _lock: FileLock,
    backend: Backend,
    segment_writers: HashMap<PathBuf, Box<dyn SegmentWriter>>,
    touched: Vec<PathBuf>,
    pending: Vec<PendingRecord>,
    summaries: HashMap<PathBuf, Summary>,
}

fn segment_kind(mode: SegmentsMode, format: crate::metadata::DataFormat) -> segment::Kind {
    match mode {
        SegmentsMode::Dir => segment::Kind::Dir,
        SegmentsMode::Default => {
            if format == crate::metadata::DataFormat::Vm2 {
                segment::Kind::Lines
            } else {
                segment::Kind::Concat
            }
        }
    }
}

impl Writer {
    pub fn open(config: Config) -> Result<Writer> {
        let sentinel = config.path.join("needs-check-do-not-pack");
        if sentinel.exists() {
            return crate::err_at!(
                IndexBusy,
                "dataset {:?} needs a check before it can accept writes",
                config.name
            );
        }
        std::fs::create_dir_all(&config.path)?;
        let lock = FileLock::open(&config.path.join("lock"))?;
        lock.try_lock_exclusive()?;

        // Left behind if the process dies before `commit()` clears it,
        // so maintenance refuses to repack a dataset with a possibly
        // half-written transaction (spec §4.10).
        std::fs::write(&sentinel, b"")?;

        let backend = match config.kind {
            Kind::OnDisk2 => Backend::OnDisk2(OnDisk2Index::open(
                &config.path.join("index.sqlite"),
                config.unique_fields.clone(),
                config.indexed_fields.clone(),
            )?),
            Kind::Simple => Backend::Simple(Manifest::open(&config.path)?),
        };

        Ok(Writer {
            config,
            _lock: lock,
            backend,
            segment_writers: HashMap::new(),
            touched: Vec::new(),
            pending: Vec::new(),
            summaries: HashMap::new(),
        })
    }

    fn segment_writer(&mut self, relpath: &PathBuf) -> Result<&mut Box<dyn SegmentWriter>> {
        if !self.segment_writers.contains_key(relpath) {
            let id = SegmentId::new(self.config.format, self.config.path.clone(), relpath.clone());
            let kind = segment_kind(self.config.segments, self.config.format);
            let writer = segment::detect_writer(&id, kind)?;
            self.segment_writers.insert(relpath.clone(), writer);
        }
        Ok(self.segment_writers.get_mut(relpath).unwrap())
    }

    /// Acquire one record into the dataset (spec §4.7): compute its
    /// segment, apply the replace policy, append the bytes, update the
    /// index/manifest. Nothing is visible to readers until [`Writer::commit`].
    pub fn acquire(&mut self, mut md: Metadata, data: &[u8]) -> Result<AcquireResult> {
        let reftime = md
            .reftime()
            .cloned()
            .ok_or_else(|| Error::Validator("record has no reftime".to_string()))?;
        let relpath = self
            .config
            .step
            .relpath(&reftime.sort_key(), self.config.format, &self.config.name);

        let mut delete_id = None;
        if let Backend::OnDisk2(index) = &mut self.backend {
            match index.check_duplicate(&md)? {
                DuplicateCheck::NotDuplicate => {}
                DuplicateCheck::Duplicate { id, usn } => match self.config.replace {
                    ReplacePolicy::Error => {
                        log::warn!("acquire: duplicate rejected for dataset {:?}", self.config.name);
                        return Ok(AcquireResult::ErrorDuplicate);
                    }
                    ReplacePolicy::Replace => {
                        log::warn!("acquire: replacing existing record in dataset {:?}", self.config.name);
                        delete_id = Some(id);
                    }
                    ReplacePolicy::Usn => {
                        let new_usn = extract_usn(&md);
                        let should_replace = match (new_usn, usn) {
                            (Some(n), Some(o)) => n >= o,
                            (Some(_), None) => true,
                            _ => false,
                        };
                        if !should_replace {
                            log::warn!(
                                "acquire: duplicate rejected for dataset {:?} (USN not newer)",
                                self.config.name
                            );
                            return Ok(AcquireResult::ErrorDuplicate);
                        }
                        log::warn!("acquire: replacing by USN in dataset {:?}", self.config.name);
                        delete_id = Some(id);
                    }
                },
            }
        }

        let loc = {
            let writer = self.segment_writer(&relpath)?;
            writer.append(data)?
        };
        md.set_source(Source::Blob {
            format: self.config.format,
            root: self.config.path.clone(),
            relpath: relpath.clone(),
            offset: loc.offset,
            size: loc.size,
        });

        if let Backend::OnDisk2(index) = &mut self.backend {
            if let Some(id) = delete_id {
                index.delete_row(id)?;
            }
            index.insert(&md, &relpath.to_string_lossy(), loc.offset, loc.size)?;
        }

        self.summaries
            .entry(relpath.clone())
            .or_insert_with(Summary::new)
            .add(&md, loc.size);
        if !self.touched.contains(&relpath) {
            self.touched.push(relpath.clone());
        }
        self.pending.push(PendingRecord { relpath, md });
        Ok(AcquireResult::Ok)
    }

    /// Fsync every touched segment, flush sidecars, then make the index
    /// change visible (spec §4.7, §5 commit ordering).
    pub fn commit(&mut self) -> Result<()> {
        for relpath in self.touched.clone() {
            if let Some(writer) = self.segment_writers.get_mut(&relpath) {
                writer.commit()?;
            }
            self.flush_metadata_sidecar(&relpath)?;
        }

        if let Backend::OnDisk2(index) = &mut self.backend {
            index.commit()?;
        }

        for relpath in self.touched.clone() {
            self.flush_summary_sidecar(&relpath)?;
            if let Backend::Simple(manifest) = &mut self.backend {
                self.update_manifest_entry(manifest, &relpath)?;
            }
        }
        if let Backend::Simple(manifest) = &mut self.backend {
            manifest.save()?;
        }

        let count = self.pending.len();
        let bytes: u64 = self
            .pending
            .iter()
            .filter_map(|p| p.md.source())
            .filter_map(|s| match s {
                Source::Blob { size, .. } => Some(*size),
                _ => None,
            })
            .sum();
        log::info!(
            "commit: dataset {:?}: {} record(s), {} byte(s) across {} segment(s)",
            self.config.name,
            count,
            bytes,
            self.touched.len()
        );

        self.pending.clear();
        self.touched.clear();
        self.summaries.clear();
        std::fs::remove_file(self.config.path.join("needs-check-do-not-pack")).ok();
        Ok(())
    }

    /// Discard every pending record and segment append from this
    /// transaction (spec §4.7 "two-phase append").
    pub fn rollback(&mut self) -> Result<()> {
        for relpath in self.touched.clone() {
            if let Some(writer) = self.segment_writers.get_mut(&relpath) {
                writer.rollback_nothrow();
            }
        }
        if let Backend::OnDisk2(index) = &mut self.backend {
            index.rollback()?;
        }
        log::error!(
            "rollback: dataset {:?}: discarding {} pending record(s)",
            self.config.name,
            self.pending.len()
        );
        self.pending.clear();
        self.touched.clear();
        self.summaries.clear();
        std::fs::remove_file(self.config.path.join("needs-check-do-not-pack")).ok();
        Ok(())
    }

    fn segment_id(&self, relpath: &PathBuf) -> SegmentId {
        SegmentId::new(self.config.format, self.config.path.clone(), relpath.clone())
    }

    fn flush_metadata_sidecar(&self, relpath: &PathBuf) -> Result<()> {
        let id = self.segment_id(relpath);
        let mut bytes = Vec::new();
        for record in self.pending.iter().filter(|p| &p.relpath == relpath) {
            bytes.extend(encode_bundle(&Bundle::Md(record.md.clone()))?);
        }
        if bytes.is_empty() {
            return Ok(());
        }
        let mut fd = util::open_file_w(&id.metadata_path(), true)?;
        util::write_fsync(&mut fd, &bytes)
    }

    fn flush_summary_sidecar(&self, relpath: &PathBuf) -> Result<()> {
        let id = self.segment_id(relpath);
        let path = id.summary_path();
        let mut merged = if path.exists() {
            Summary::decode(&std::fs::read(&path)?)?
        } else {
            Summary::new()
        };
        if let Some(delta) = self.summaries.get(relpath) {
            merged.merge(delta);
        }
        util::atomic_rewrite(&path, &merged.encode())
    }

    fn update_manifest_entry(&self, manifest: &mut Manifest, relpath: &PathBuf) -> Result<()> {
        let id = self.segment_id(relpath);
        let mtime = util::mtime_secs(&id.abspath())?;
        let existing = manifest.get(&relpath.to_string_lossy()).cloned();
        let new_interval = self
            .summaries
            .get(relpath)
            .and_then(|s| s.date_extremes())
            .ok_or_else(|| Error::Validator("commit produced an empty summary delta".to_string()))?;
        let (start_time, end_time) = match existing {
            Some(e) => {
                let extended = e.interval().extend(&new_interval);
                (extended.begin.unwrap(), extended.end.unwrap())
            }
            None => (new_interval.begin.unwrap(), new_interval.end.unwrap()),
        };
        manifest.upsert(ManifestEntry {
            file: relpath.to_string_lossy().to_string(),
            mtime,
            start_time,
            end_time,
        });
        Ok(())
    }
}

/// Decode every `Bundle::Md` record out of a `.metadata` sidecar,
/// skipping tombstoned (`Bundle::Deleted`) slots (spec §4.6, §4.7).
pub(crate) fn read_metadata_sidecar(path: &std::path::Path) -> Result<Vec<Metadata>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let buf = std::fs::read(path)?;
    let mut out = Vec::new();
    let mut off = 0;
    while off < buf.len() {
        let (bundle, n) = decode_bundle(&buf[off..])?;
        off += n;
        if let Bundle::Md(md) = bundle {
            out.push(md);
        }
    }
    Ok(out)
}

#[path = "writer_test.rs"]
#[cfg(test)]
mod writer_test;
