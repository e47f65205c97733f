//! Lines-kind segments (spec §4.4): used for VM2, where each message is
//! one newline-terminated text line. Boundary detection is a plain
//! `\n` split done by this module itself, not delegated to the
//! `Scanner` (unlike `concat`, where self-framing binary formats find
//! their own boundaries); `Scanner::scan_message` is still called per
//! line to parse the fields out of it.

use std::fs::File;
use std::io::Write;

use crate::err_at;
use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::scanner;
use crate::util;

use super::{BlobLocation, SegmentChecker, SegmentId, SegmentReader, SegmentWriter, State};

pub(crate) fn split_lines(data: &[u8]) -> Vec<(u64, u64)> {
    let mut out = Vec::new();
    let mut start = 0usize;
    for (i, b) in data.iter().enumerate() {
        if *b == b'\n' {
            out.push((start as u64, (i - start) as u64));
            start = i + 1;
        }
    }
    out
}

pub struct LinesReader {
    id: SegmentId,
}

impl LinesReader {
    pub fn open(id: SegmentId) -> Result<LinesReader> {
        Ok(LinesReader { id })
    }
}

impl SegmentReader for LinesReader {
    fn scan_data(&self, dest: &mut dyn FnMut(Metadata, BlobLocation) -> bool) -> Result<()> {
        let data = std::fs::read(self.id.abspath())?;
        let scanner = scanner::get(self.id.format)
            .ok_or_else(|| Error::Unsupported(format!("no scanner registered for {}", self.id.format)))?;
        for (offset, size) in split_lines(&data) {
            let end = (offset + size) as usize;
            let md = scanner.scan_message(&data[offset as usize..end])?;
            let loc = BlobLocation {
                relpath: self.id.relpath.clone(),
                offset,
                size,
            };
            if !dest(md, loc) {
                break;
            }
        }
        Ok(())
    }

    fn read(&self, loc: &BlobLocation) -> Result<Vec<u8>> {
        let mut fd = util::open_file_r(&self.id.root.join(&loc.relpath))?;
        util::read_buffer(&mut fd, loc.offset, loc.size, "lines segment read")
    }
}

pub struct LinesWriter {
    id: SegmentId,
    file: File,
    next_offset: u64,
    committed_len: u64,
}

impl LinesWriter {
    pub fn open(id: SegmentId) -> Result<LinesWriter> {
        let path = id.abspath();
        let file = util::open_file_w(&path, true)?;
        let len = file.metadata()?.len();
        Ok(LinesWriter {
            id,
            file,
            next_offset: len,
            committed_len: len,
        })
    }
}

impl SegmentWriter for LinesWriter {
    fn next_offset(&self) -> u64 {
        self.next_offset
    }

    fn append(&mut self, data: &[u8]) -> Result<BlobLocation> {
        let offset = self.next_offset;
        self.file.write_all(data)?;
        self.file.write_all(b"\n")?;
        self.next_offset += data.len() as u64 + 1;
        Ok(BlobLocation {
            relpath: self.id.relpath.clone(),
            offset,
            size: data.len() as u64,
        })
    }

    fn commit(&mut self) -> Result<()> {
        self.file.sync_all()?;
        self.committed_len = self.next_offset;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.file.set_len(self.committed_len)?;
        self.next_offset = self.committed_len;
        Ok(())
    }
}

pub struct LinesChecker {
    id: SegmentId,
}

impl LinesChecker {
    pub fn new(id: SegmentId) -> LinesChecker {
        LinesChecker { id }
    }
}

impl SegmentChecker for LinesChecker {
    fn check(&self, expected: &[(u64, u64)], quick: bool) -> Result<State> {
        let path = self.id.abspath();
        if !path.exists() {
            return Ok(State::MISSING);
        }
        let data = std::fs::read(&path)?;
        let actual = split_lines(&data);
        let mut state = State::OK;
        if actual.len() < expected.len() {
            state |= State::DIRTY;
        } else if actual.len() > expected.len() {
            state |= State::UNALIGNED;
        }
        if super::ranges_overlap(expected) {
            state |= State::CORRUPTED;
        }
        if !quick {
            let scanner = scanner::get(self.id.format);
            for (offset, size) in expected {
                let end = (*offset + *size) as usize;
                if data.len() < end {
                    state |= State::CORRUPTED;
                    continue;
                }
                if let Some(scanner) = &scanner {
                    if scanner.validate(&data[*offset as usize..end]).is_err() {
                        state |= State::CORRUPTED;
                    }
                }
            }
        }
        Ok(state)
    }

    fn repack(&self, keep: &[(u64, u64)]) -> Result<Vec<(u64, u64)>> {
        let path = self.id.abspath();
        let data = std::fs::read(&path)?;
        let mut out = Vec::with_capacity(data.len());
        let mut new_locs = Vec::with_capacity(keep.len());
        let mut offset = 0u64;
        for (o, s) in keep {
            let end = (*o + *s) as usize;
            if data.len() < end {
                return err_at!(
                    SegmentCorrupt,
                    "repack: range {}..{} beyond segment length {}",
                    o,
                    end,
                    data.len()
                );
            }
            out.extend_from_slice(&data[*o as usize..end]);
            out.push(b'\n');
            new_locs.push((offset, *s));
            offset += *s + 1;
        }
        util::atomic_rewrite(&path, &out)?;
        Ok(new_locs)
    }

    fn remove(&self) -> Result<()> {
        match std::fs::remove_file(self.id.abspath()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    }

    fn test_truncate(&self, size: u64) -> Result<()> {
        let file = std::fs::OpenOptions::new().write(true).open(self.id.abspath())?;
        file.set_len(size)?;
        Ok(())
    }

    fn make_hole(&self, offset: u64, size: u64) -> Result<()> {
        let path = self.id.abspath();
        let mut data = std::fs::read(&path)?;
        let end = std::cmp::min((offset + size) as usize, data.len());
        for byte in &mut data[offset as usize..end] {
            *byte = b'x';
        }
        util::atomic_rewrite(&path, &data)
    }

    fn make_overlap(&self) -> Result<()> {
        let path = self.id.abspath();
        let mut data = std::fs::read(&path)?;
        let ranges = split_lines(&data);
        if ranges.len() < 2 {
            return err_at!(Validator, "make_overlap: segment needs at least two lines");
        }
        let (first_offset, first_size) = ranges[0];
        let (second_offset, second_size) = ranges[1];
        let n = std::cmp::min(first_size, second_size) as usize;
        let first: Vec<u8> = data[first_offset as usize..first_offset as usize + n].to_vec();
        data[second_offset as usize..second_offset as usize + n].copy_from_slice(&first);
        util::atomic_rewrite(&path, &data)
    }

    fn corrupt(&self) -> Result<()> {
        let path = self.id.abspath();
        let mut data = std::fs::read(&path)?;
        let ranges = split_lines(&data);
        let (offset, _) = *ranges.first().ok_or_else(|| Error::Validator("corrupt: segment has no messages".to_string()))?;
        data[offset as usize] ^= 0xff;
        util::atomic_rewrite(&path, &data)
    }
}

#[path = "lines_test.rs"]
#[cfg(test)]
mod lines_test;
