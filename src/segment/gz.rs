//! Gz-kind segments (spec §4.4): a `concat` or `lines` segment whose
//! whole file is gzip-compressed. Sealed and read-only, same as
//! `tar`/`zip`. Real arkimet keeps a `.gz.idx` sidecar of seek points
//! for random access into the compressed stream without a full
//! decompress; that sidecar format is an open question (see
//! DESIGN.md) and this reader instead decompresses the whole segment
//! on every access, which is correct but not the fast path real
//! archival reads would want.

use std::io::Read;

use flate2::read::GzDecoder;

use crate::err_at;
use crate::error::{Error, Result};
use crate::metadata::{DataFormat, Metadata};
use crate::scanner;

use super::lines::split_lines;
use super::{BlobLocation, SegmentChecker, SegmentId, SegmentReader, State};

fn decompress(id: &SegmentId) -> Result<Vec<u8>> {
    let file = std::fs::File::open(id.abspath())?;
    let mut decoder = GzDecoder::new(file);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::SegmentCorrupt(format!("gz: decompress: {}", e)))?;
    Ok(out)
}

fn boundaries(id: &SegmentId, data: &[u8]) -> Result<Vec<(u64, u64)>> {
    if id.format == DataFormat::Vm2 {
        Ok(split_lines(data))
    } else {
        scanner::get(id.format)
            .ok_or_else(|| Error::Unsupported(format!("no scanner registered for {}", id.format)))?
            .split(data)
    }
}

pub struct GzConcatReader {
    id: SegmentId,
}

impl GzConcatReader {
    pub fn open(id: SegmentId) -> Result<GzConcatReader> {
        Ok(GzConcatReader { id })
    }
}

impl SegmentReader for GzConcatReader {
    fn scan_data(&self, dest: &mut dyn FnMut(Metadata, BlobLocation) -> bool) -> Result<()> {
        scan_gz(&self.id, dest)
    }

    fn read(&self, loc: &BlobLocation) -> Result<Vec<u8>> {
        read_gz(&self.id, loc)
    }
}

pub struct GzLinesReader {
    id: SegmentId,
}

impl GzLinesReader {
    pub fn open(id: SegmentId) -> Result<GzLinesReader> {
        Ok(GzLinesReader { id })
    }
}

impl SegmentReader for GzLinesReader {
    fn scan_data(&self, dest: &mut dyn FnMut(Metadata, BlobLocation) -> bool) -> Result<()> {
        scan_gz(&self.id, dest)
    }

    fn read(&self, loc: &BlobLocation) -> Result<Vec<u8>> {
        read_gz(&self.id, loc)
    }
}

fn scan_gz(id: &SegmentId, dest: &mut dyn FnMut(Metadata, BlobLocation) -> bool) -> Result<()> {
    let data = decompress(id)?;
    let scanner = scanner::get(id.format)
        .ok_or_else(|| Error::Unsupported(format!("no scanner registered for {}", id.format)))?;
    for (offset, size) in boundaries(id, &data)? {
        let end = (offset + size) as usize;
        if data.len() < end {
            return err_at!(SegmentCorrupt, "gz: boundary past end of decompressed data");
        }
        let md = scanner.scan_message(&data[offset as usize..end])?;
        let loc = BlobLocation {
            relpath: id.relpath.clone(),
            offset,
            size,
        };
        if !dest(md, loc) {
            break;
        }
    }
    Ok(())
}

fn read_gz(id: &SegmentId, loc: &BlobLocation) -> Result<Vec<u8>> {
    let data = decompress(id)?;
    let end = (loc.offset + loc.size) as usize;
    if data.len() < end {
        return err_at!(SegmentCorrupt, "gz: requested range past end of decompressed data");
    }
    Ok(data[loc.offset as usize..end].to_vec())
}

pub struct GzChecker {
    id: SegmentId,
}

impl GzChecker {
    pub fn new(id: SegmentId) -> GzChecker {
        GzChecker { id }
    }
}

impl SegmentChecker for GzChecker {
    fn check(&self, expected: &[(u64, u64)], quick: bool) -> Result<State> {
        if !self.id.abspath().exists() {
            return Ok(State::MISSING);
        }
        let data = match decompress(&self.id) {
            Ok(d) => d,
            Err(_) => return Ok(State::CORRUPTED),
        };
        let actual = match boundaries(&self.id, &data) {
            Ok(b) => b,
            Err(_) => return Ok(State::CORRUPTED),
        };
        let mut state = State::OK;
        if actual.len() != expected.len() {
            state |= State::UNALIGNED;
        }
        if !quick {
            if let Some(scanner) = scanner::get(self.id.format) {
                for (offset, size) in expected {
                    let end = (*offset + *size) as usize;
                    if data.len() < end || scanner.validate(&data[*offset as usize..end]).is_err() {
                        state |= State::CORRUPTED;
                    }
                }
            }
        }
        Ok(state)
    }

    fn repack(&self, _keep: &[(u64, u64)]) -> Result<Vec<(u64, u64)>> {
        err_at!(Unsupported, "gz segments are sealed and archival: repack is not supported")
    }

    fn remove(&self) -> Result<()> {
        match std::fs::remove_file(self.id.abspath()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    }
}

#[path = "gz_test.rs"]
#[cfg(test)]
mod gz_test;
