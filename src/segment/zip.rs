//! Zip-kind segments (spec §4.4): a sealed, read-only archive of one
//! message per entry. Parsed directly against the ZIP central-directory
//! format rather than pulling in a dedicated crate — this engine only
//! ever needs to read a handful of stored or deflated entries, which
//! `flate2::read::DeflateDecoder` already covers for the one
//! compression method ZIP uses that isn't a straight copy.

use std::convert::TryInto;
use std::io::Read;

use flate2::read::DeflateDecoder;

use crate::err_at;
use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::scanner;

use super::{BlobLocation, SegmentChecker, SegmentId, SegmentReader, State};

const EOCD_SIG: u32 = 0x0605_4b50;
const CD_SIG: u32 = 0x0201_4b50;
const LOCAL_SIG: u32 = 0x0403_4b50;

struct CentralEntry {
    name: String,
    method: u16,
    comp_size: u32,
    uncomp_size: u32,
    local_offset: u32,
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes(buf[off..off + 2].try_into().unwrap())
}

fn find_eocd(data: &[u8]) -> Result<usize> {
    if data.len() < 22 {
        return err_at!(SegmentCorrupt, "zip: file shorter than an EOCD record");
    }
    // search backward through the trailing comment (max 64KiB) for the
    // signature; with no comment this is just the last 22 bytes.
    let search_from = data.len().saturating_sub(22 + 65536);
    for start in (search_from..=data.len() - 22).rev() {
        if read_u32(data, start) == EOCD_SIG {
            return Ok(start);
        }
    }
    err_at!(SegmentCorrupt, "zip: end-of-central-directory record not found")
}

fn parse_central_directory(data: &[u8]) -> Result<Vec<CentralEntry>> {
    let eocd = find_eocd(data)?;
    let cd_size = read_u32(data, eocd + 12) as usize;
    let cd_offset = read_u32(data, eocd + 16) as usize;
    if data.len() < cd_offset + cd_size {
        return err_at!(SegmentCorrupt, "zip: central directory extends past file");
    }
    let mut entries = Vec::new();
    let mut off = cd_offset;
    let end = cd_offset + cd_size;
    while off < end {
        if data.len() < off + 46 || read_u32(data, off) != CD_SIG {
            return err_at!(SegmentCorrupt, "zip: malformed central directory entry");
        }
        let method = read_u16(data, off + 10);
        let comp_size = read_u32(data, off + 20);
        let uncomp_size = read_u32(data, off + 24);
        let name_len = read_u16(data, off + 28) as usize;
        let extra_len = read_u16(data, off + 30) as usize;
        let comment_len = read_u16(data, off + 32) as usize;
        let local_offset = read_u32(data, off + 42);
        let name_start = off + 46;
        let name = std::str::from_utf8(&data[name_start..name_start + name_len])
            .map_err(|e| Error::SegmentCorrupt(format!("zip: non-utf8 entry name: {}", e)))?
            .to_string();
        entries.push(CentralEntry {
            name,
            method,
            comp_size,
            uncomp_size,
            local_offset,
        });
        off = name_start + name_len + extra_len + comment_len;
    }
    Ok(entries)
}

fn entry_data<'a>(data: &'a [u8], entry: &CentralEntry) -> Result<Vec<u8>> {
    let off = entry.local_offset as usize;
    if data.len() < off + 30 || read_u32(data, off) != LOCAL_SIG {
        return err_at!(SegmentCorrupt, "zip: malformed local file header for {:?}", entry.name);
    }
    let name_len = read_u16(data, off + 26) as usize;
    let extra_len = read_u16(data, off + 28) as usize;
    let data_start = off + 30 + name_len + extra_len;
    let data_end = data_start + entry.comp_size as usize;
    if data.len() < data_end {
        return err_at!(SegmentCorrupt, "zip: entry {:?} data runs past file end", entry.name);
    }
    let raw = &data[data_start..data_end];
    match entry.method {
        0 => Ok(raw.to_vec()),
        8 => {
            let mut decoder = DeflateDecoder::new(raw);
            let mut out = Vec::with_capacity(entry.uncomp_size as usize);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| Error::SegmentCorrupt(format!("zip: inflate {:?}: {}", entry.name, e)))?;
            Ok(out)
        }
        other => err_at!(Unsupported, "zip: compression method {} not supported", other),
    }
}

pub struct ZipReader {
    id: SegmentId,
}

impl ZipReader {
    pub fn open(id: SegmentId) -> Result<ZipReader> {
        Ok(ZipReader { id })
    }
}

impl SegmentReader for ZipReader {
    fn scan_data(&self, dest: &mut dyn FnMut(Metadata, BlobLocation) -> bool) -> Result<()> {
        let data = std::fs::read(self.id.abspath())?;
        let entries = parse_central_directory(&data)?;
        let scanner = scanner::get(self.id.format)
            .ok_or_else(|| Error::Unsupported(format!("no scanner registered for {}", self.id.format)))?;
        for (index, entry) in entries.iter().enumerate() {
            let bytes = entry_data(&data, entry)?;
            let md = scanner.scan_message(&bytes)?;
            let loc = BlobLocation {
                relpath: self.id.relpath.join(&entry.name),
                offset: index as u64,
                size: bytes.len() as u64,
            };
            if !dest(md, loc) {
                break;
            }
        }
        Ok(())
    }

    fn read(&self, loc: &BlobLocation) -> Result<Vec<u8>> {
        let data = std::fs::read(self.id.abspath())?;
        let entries = parse_central_directory(&data)?;
        let entry = entries
            .get(loc.offset as usize)
            .ok_or_else(|| Error::SegmentCorrupt(format!("zip: no entry at index {}", loc.offset)))?;
        entry_data(&data, entry)
    }
}

pub struct ZipChecker {
    id: SegmentId,
}

impl ZipChecker {
    pub fn new(id: SegmentId) -> ZipChecker {
        ZipChecker { id }
    }
}

impl SegmentChecker for ZipChecker {
    fn check(&self, expected: &[(u64, u64)], quick: bool) -> Result<State> {
        let path = self.id.abspath();
        if !path.exists() {
            return Ok(State::MISSING);
        }
        let data = std::fs::read(&path)?;
        let entries = match parse_central_directory(&data) {
            Ok(e) => e,
            Err(_) => return Ok(State::CORRUPTED),
        };
        let mut state = State::OK;
        if entries.len() != expected.len() {
            state |= State::UNALIGNED;
        }
        if !quick {
            for entry in &entries {
                if entry_data(&data, entry).is_err() {
                    state |= State::CORRUPTED;
                }
            }
        }
        Ok(state)
    }

    fn repack(&self, _keep: &[(u64, u64)]) -> Result<Vec<(u64, u64)>> {
        err_at!(Unsupported, "zip segments are sealed and archival: repack is not supported")
    }

    fn remove(&self) -> Result<()> {
        match std::fs::remove_file(self.id.abspath()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    }
}

#[path = "zip_test.rs"]
#[cfg(test)]
mod zip_test;
