//! Aggregate statistics over a set of metadata records: for every
//! distinct combination of non-reftime item values, the reftime
//! interval, record count and byte size it covers (spec §4.11).

use std::convert::TryInto;

use crate::codec::binary::{
    code_from_u8, decode_item, encode_item_payload, read_time, write_envelope, write_time,
};
use crate::err_at;
use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::time::{Interval, Time};
use crate::types::Item;

/// One distinct combination of item values and the aggregate stats for
/// every record sharing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub items: Vec<Item>,
    pub interval: Interval,
    pub count: u64,
    pub size: u64,
}

impl Entry {
    fn matches_key(&self, items: &[Item]) -> bool {
        self.items == items
    }
}

/// The summary itself: an unordered bag of [`Entry`] values. Two
/// summaries covering disjoint record sets combine by concatenating and
/// merging entries that share the same item combination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    entries: Vec<Entry>,
}

impl Summary {
    pub fn new() -> Summary {
        Summary { entries: Vec::new() }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold one record's contribution in, merging into the matching
    /// entry if one already carries the same item combination.
    pub fn add(&mut self, md: &Metadata, size: u64) {
        let items: Vec<Item> = md.items().to_vec();
        let interval = md
            .reftime()
            .map(|r| r.interval())
            .unwrap_or_else(Interval::unbounded);

        if let Some(entry) = self.entries.iter_mut().find(|e| e.matches_key(&items)) {
            entry.interval = entry.interval.extend(&interval);
            entry.count += 1;
            entry.size += size;
        } else {
            self.entries.push(Entry {
                items,
                interval,
                count: 1,
                size,
            });
        }
    }

    /// Merge another summary's entries into this one.
    pub fn merge(&mut self, other: &Summary) {
        for entry in &other.entries {
            if let Some(existing) = self.entries.iter_mut().find(|e| e.matches_key(&entry.items)) {
                existing.interval = existing.interval.extend(&entry.interval);
                existing.count += entry.count;
                existing.size += entry.size;
            } else {
                self.entries.push(entry.clone());
            }
        }
    }

    pub fn count(&self) -> u64 {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// The interval spanning every entry's reftime range, or `None` if
    /// the summary has no entries at all.
    pub fn date_extremes(&self) -> Option<Interval> {
        let mut iter = self.entries.iter();
        let first = iter.next()?.interval;
        Some(iter.fold(first, |acc, e| acc.extend(&e.interval)))
    }

    /// A filtered copy retaining only entries whose items satisfy
    /// `predicate` (used by [`crate::matcher`] pre-filtering).
    pub fn filter(&self, predicate: impl Fn(&[Item]) -> bool) -> Summary {
        Summary {
            entries: self
                .entries
                .iter()
                .filter(|e| predicate(&e.items))
                .cloned()
                .collect(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        for entry in &self.entries {
            let mut item_bytes = Vec::new();
            item_bytes.extend_from_slice(&(entry.items.len() as u16).to_be_bytes());
            for item in &entry.items {
                write_envelope(&mut item_bytes, item.code(), &encode_item_payload(item));
            }
            out.extend_from_slice(&(item_bytes.len() as u32).to_be_bytes());
            out.extend_from_slice(&item_bytes);

            write_optional_time(&mut out, entry.interval.begin);
            write_optional_time(&mut out, entry.interval.end);
            out.extend_from_slice(&entry.count.to_be_bytes());
            out.extend_from_slice(&entry.size.to_be_bytes());
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Summary> {
        if buf.len() < 4 {
            return err_at!(Codec, "ShortRead: summary entry count");
        }
        let entry_count = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let mut off = 4;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            if buf.len() < off + 4 {
                return err_at!(Codec, "ShortRead: summary entry header");
            }
            let item_bytes_len = u32::from_be_bytes(buf[off..off + 4].try_into().unwrap()) as usize;
            off += 4;
            if buf.len() < off + item_bytes_len {
                return err_at!(Codec, "ShortRead: summary entry items");
            }
            let item_bytes = &buf[off..off + item_bytes_len];
            off += item_bytes_len;
            let items = decode_item_list(item_bytes)?;

            let begin = read_optional_time(buf, &mut off)?;
            let end = read_optional_time(buf, &mut off)?;
            if buf.len() < off + 16 {
                return err_at!(Codec, "ShortRead: summary entry stats");
            }
            let count = u64::from_be_bytes(buf[off..off + 8].try_into().unwrap());
            let size = u64::from_be_bytes(buf[off + 8..off + 16].try_into().unwrap());
            off += 16;

            entries.push(Entry {
                items,
                interval: Interval::new(begin, end),
                count,
                size,
            });
        }
        Ok(Summary { entries })
    }
}

fn write_optional_time(out: &mut Vec<u8>, t: Option<Time>) {
    match t {
        Some(t) => {
            out.push(1);
            write_time(out, &t);
        }
        None => out.push(0),
    }
}

fn read_optional_time(buf: &[u8], off: &mut usize) -> Result<Option<Time>> {
    if buf.len() < *off + 1 {
        return err_at!(Codec, "ShortRead: optional time tag");
    }
    let tag = buf[*off];
    *off += 1;
    match tag {
        0 => Ok(None),
        1 => Ok(Some(read_time(buf, off)?)),
        n => err_at!(Codec, "unknown optional-time tag {}", n),
    }
}

fn decode_item_list(buf: &[u8]) -> Result<Vec<Item>> {
    if buf.len() < 2 {
        return err_at!(Codec, "ShortRead: summary item count");
    }
    let count = u16::from_be_bytes(buf[0..2].try_into().unwrap());
    let mut off = 2;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if buf.len() < off + 3 {
            return err_at!(Codec, "MalformedEnvelope: truncated summary item header");
        }
        let code_byte = buf[off];
        let len = u16::from_be_bytes(buf[off + 1..off + 3].try_into().unwrap()) as usize;
        off += 3;
        if buf.len() < off + len {
            return err_at!(Codec, "MalformedEnvelope: truncated summary item payload");
        }
        let payload = &buf[off..off + len];
        off += len;
        let code = code_from_u8(code_byte)
            .ok_or_else(|| Error::Codec(format!("UnknownTypeCode {}", code_byte)))?;
        items.push(decode_item(code, payload)?);
    }
    Ok(items)
}

#[path = "summary_test.rs"]
#[cfg(test)]
mod summary_test;
