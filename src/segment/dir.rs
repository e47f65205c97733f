//! Dir-kind segments (spec §4.4): one file per message under
//! `id.abspath()/`, named by a zero-padded sequence number
//! (`000001.<format>`). Since every file holds exactly one whole
//! message, `BlobLocation::offset` is repurposed here to carry that
//! sequence number rather than a byte offset — still a stable,
//! orderable identifier, which is all callers need from it.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::err_at;
use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::scanner;
use crate::util;

use super::{BlobLocation, SegmentChecker, SegmentId, SegmentReader, SegmentWriter, State};

fn filename(format_ext: &str, index: u64) -> String {
    format!("{:06}.{}", index, format_ext)
}

fn index_of(id: &SegmentId, filename: &str) -> Option<u64> {
    let ext = format!(".{}", id.format.as_str());
    filename.strip_suffix(&ext)?.parse().ok()
}

fn sorted_entries(id: &SegmentId) -> Result<Vec<(u64, PathBuf)>> {
    let dir = id.abspath();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(index) = index_of(id, &name) {
            entries.push((index, entry.path()));
        }
    }
    entries.sort_by_key(|(index, _)| *index);
    Ok(entries)
}

pub struct DirReader {
    id: SegmentId,
}

impl DirReader {
    pub fn open(id: SegmentId) -> Result<DirReader> {
        Ok(DirReader { id })
    }
}

impl SegmentReader for DirReader {
    fn scan_data(&self, dest: &mut dyn FnMut(Metadata, BlobLocation) -> bool) -> Result<()> {
        let scanner = scanner::get(self.id.format)
            .ok_or_else(|| Error::Unsupported(format!("no scanner registered for {}", self.id.format)))?;
        for (index, path) in sorted_entries(&self.id)? {
            let data = fs::read(&path)?;
            let md = scanner.scan_message(&data)?;
            let loc = BlobLocation {
                relpath: self.id.relpath.join(path.file_name().unwrap()),
                offset: index,
                size: data.len() as u64,
            };
            if !dest(md, loc) {
                break;
            }
        }
        Ok(())
    }

    fn read(&self, loc: &BlobLocation) -> Result<Vec<u8>> {
        let path = self.id.root.join(&loc.relpath);
        Ok(fs::read(path)?)
    }
}

pub struct DirWriter {
    id: SegmentId,
    next_index: u64,
    pending: Vec<PathBuf>,
}

impl DirWriter {
    pub fn open(id: SegmentId) -> Result<DirWriter> {
        fs::create_dir_all(id.abspath())?;
        let next_index = sorted_entries(&id)?.last().map(|(i, _)| i + 1).unwrap_or(0);
        Ok(DirWriter {
            id,
            next_index,
            pending: Vec::new(),
        })
    }
}

impl SegmentWriter for DirWriter {
    fn next_offset(&self) -> u64 {
        self.next_index
    }

    fn append(&mut self, data: &[u8]) -> Result<BlobLocation> {
        let index = self.next_index;
        let name = filename(self.id.format.as_str(), index);
        let path = self.id.abspath().join(&name);
        let mut fd = fs::OpenOptions::new().write(true).create_new(true).open(&path)?;
        fd.write_all(data)?;
        fd.sync_all()?;
        self.pending.push(path);
        self.next_index += 1;
        Ok(BlobLocation {
            relpath: self.id.relpath.join(&name),
            offset: index,
            size: data.len() as u64,
        })
    }

    fn commit(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        for path in self.pending.drain(..) {
            fs::remove_file(&path).ok();
        }
        // next_index is left as-is: a reopened writer simply skips the
        // now-missing indices rather than reusing them.
        Ok(())
    }
}

pub struct DirChecker {
    id: SegmentId,
}

impl DirChecker {
    pub fn new(id: SegmentId) -> DirChecker {
        DirChecker { id }
    }
}

impl SegmentChecker for DirChecker {
    fn check(&self, expected: &[(u64, u64)], quick: bool) -> Result<State> {
        if !self.id.abspath().is_dir() {
            return Ok(State::MISSING);
        }
        let actual = sorted_entries(&self.id)?;
        let mut state = State::OK;
        if actual.len() < expected.len() {
            state |= State::DIRTY;
        } else if actual.len() > expected.len() {
            state |= State::UNALIGNED;
        }
        if super::positions_collide(expected) {
            state |= State::CORRUPTED;
        }

        let scanner = scanner::get(self.id.format);
        for (index, size) in expected {
            match actual.iter().find(|(i, _)| i == index) {
                None => state |= State::MISSING,
                Some((_, path)) => {
                    let len = fs::metadata(path)?.len();
                    if len != *size {
                        state |= State::CORRUPTED;
                    } else if !quick {
                        if let Some(scanner) = &scanner {
                            let data = fs::read(path)?;
                            if scanner.validate(&data).is_err() {
                                state |= State::CORRUPTED;
                            }
                        }
                    }
                }
            }
        }
        Ok(state)
    }

    fn repack(&self, keep: &[(u64, u64)]) -> Result<Vec<(u64, u64)>> {
        let actual = sorted_entries(&self.id)?;
        let ext = self.id.format.as_str();
        let mut new_locs = Vec::with_capacity(keep.len());
        let mut staged = Vec::with_capacity(keep.len());
        for (new_index, (old_index, size)) in keep.iter().enumerate() {
            let (_, path) = actual
                .iter()
                .find(|(i, _)| i == old_index)
                .ok_or_else(|| Error::SegmentCorrupt(format!("repack: missing entry {}", old_index)))?;
            let staging = append_suffix(path, ".repack");
            fs::copy(path, &staging)?;
            staged.push((staging, new_index as u64, *size));
        }
        // remove every current file, then move staged files into their
        // final renumbered names, so a crash mid-repack never leaves a
        // half-renumbered directory that looks complete.
        for (_, path) in &actual {
            fs::remove_file(path)?;
        }
        for (staging, new_index, size) in staged {
            let dest = self.id.abspath().join(filename(ext, new_index));
            fs::rename(&staging, &dest)?;
            new_locs.push((new_index, size));
        }
        Ok(new_locs)
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_dir_all(self.id.abspath()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn tar(&self) -> Result<SegmentId> {
        let entries = sorted_entries(&self.id)?;
        let new_id = SegmentId::new(self.id.format, self.id.root.clone(), super::append_ext(&self.id.relpath, "tar"));
        let file = util::open_file_w(&new_id.abspath(), false)?;
        let mut builder = tar::Builder::new(file);
        for (index, path) in &entries {
            let bytes = fs::read(path)?;
            let name = filename(self.id.format.as_str(), *index);
            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, bytes.as_slice())?;
        }
        builder.into_inner()?.sync_all()?;
        fs::remove_dir_all(self.id.abspath())?;
        Ok(new_id)
    }

    fn zip(&self) -> Result<SegmentId> {
        let entries = sorted_entries(&self.id)?;
        let mut data = Vec::new();
        let mut ranges = Vec::with_capacity(entries.len());
        for (_, path) in &entries {
            let bytes = fs::read(path)?;
            ranges.push((data.len() as u64, bytes.len() as u64));
            data.extend_from_slice(&bytes);
        }
        let bytes = super::concat::build_zip(self.id.format.as_str(), &data, &ranges);
        let new_id = SegmentId::new(self.id.format, self.id.root.clone(), super::append_ext(&self.id.relpath, "zip"));
        util::atomic_rewrite(&new_id.abspath(), &bytes)?;
        fs::remove_dir_all(self.id.abspath())?;
        Ok(new_id)
    }

    fn test_truncate(&self, size: u64) -> Result<()> {
        let entries = sorted_entries(&self.id)?;
        let (_, path) = entries.last().ok_or_else(|| Error::Validator("test_truncate: segment has no messages".to_string()))?;
        let file = fs::OpenOptions::new().write(true).open(path)?;
        file.set_len(size)?;
        Ok(())
    }

    fn make_hole(&self, offset: u64, size: u64) -> Result<()> {
        let entries = sorted_entries(&self.id)?;
        let (_, path) = entries.first().ok_or_else(|| Error::Validator("make_hole: segment has no messages".to_string()))?;
        let mut data = fs::read(path)?;
        let end = std::cmp::min((offset + size) as usize, data.len());
        for byte in &mut data[offset as usize..end] {
            *byte = 0;
        }
        util::atomic_rewrite(path, &data)
    }

    fn corrupt(&self) -> Result<()> {
        let entries = sorted_entries(&self.id)?;
        let (_, path) = entries.first().ok_or_else(|| Error::Validator("corrupt: segment has no messages".to_string()))?;
        let mut data = fs::read(path)?;
        data[0] ^= 0xff;
        util::atomic_rewrite(path, &data)
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(suffix);
    PathBuf::from(os)
}

#[path = "dir_test.rs"]
#[cfg(test)]
mod dir_test;
