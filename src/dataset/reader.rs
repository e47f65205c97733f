//! Dataset queries (spec §4.8): enumerate candidate segments per the
//! index backend, re-check each record against the full [`Matcher`],
//! and hand results back through a [`Sorter`] window.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::index::manifest::Manifest;
use crate::index::ondisk2::OnDisk2Index;
use crate::matcher::Matcher;
use crate::metadata::{Metadata, Source};
use crate::reader_pool;
use crate::segment::{BlobLocation, SegmentId};
use crate::summary::Summary;
use crate::time::Interval;

use super::config::{Config, Kind};
use super::sorter::Sorter;
use super::writer::read_metadata_sidecar;

/// Run `matcher` over every record in the dataset, sorted by `sort`
/// (a [`Sorter`] expression), and return the surviving metadata.
pub fn query_data(config: &Config, matcher: &Matcher, sort: &str) -> Result<Vec<Metadata>> {
    let mut sorter = Sorter::parse(sort)?;
    let mut out = Vec::new();
    for_each_matching_segment(config, matcher, |event| {
        match event {
            SegmentEvent::Record(md) => out.extend(sorter.push(md)),
            SegmentEvent::EndOfSegment => out.extend(sorter.flush_segment_boundary()),
        }
        Ok(())
    })?;
    out.extend(sorter.finish());
    Ok(out)
}

/// Run `matcher` over every record, calling `dest` with each matching
/// record's decoded bytes (spec §4.8 `data` query). Order follows
/// `sort` the same way [`query_data`] does.
pub fn query_bytes(
    config: &Config,
    matcher: &Matcher,
    sort: &str,
    mut dest: impl FnMut(&Metadata, Vec<u8>) -> Result<()>,
) -> Result<()> {
    let mut sorter = Sorter::parse(sort)?;
    let mut flush = |records: Vec<Metadata>, dest: &mut dyn FnMut(&Metadata, Vec<u8>) -> Result<()>| -> Result<()> {
        for md in records {
            let bytes = read_bytes(&md)?;
            dest(&md, bytes)?;
        }
        Ok(())
    };

    for_each_matching_segment(config, matcher, |event| match event {
        SegmentEvent::Record(md) => flush(sorter.push(md), &mut dest),
        SegmentEvent::EndOfSegment => flush(sorter.flush_segment_boundary(), &mut dest),
    })?;
    flush(sorter.finish(), &mut dest)
}

/// Build the dataset's full summary, restricted to entries that could
/// satisfy `matcher` (spec §4.8 `summary` query, §4.11).
pub fn query_summary(config: &Config, matcher: &Matcher) -> Result<Summary> {
    let mut merged = Summary::new();
    for_each_segment_summary(config, matcher, |summary| {
        merged.merge(&summary.filter(|items| entry_matches(matcher, items)));
        Ok(())
    })?;
    Ok(merged)
}

fn read_bytes(md: &Metadata) -> Result<Vec<u8>> {
    match md.source() {
        Some(Source::Blob {
            format,
            root,
            relpath,
            offset,
            size,
        }) => {
            let id = SegmentId::new(*format, root.clone(), relpath.clone());
            let reader = reader_pool::get_or_open(&id)?;
            reader.read(&BlobLocation {
                relpath: relpath.clone(),
                offset: *offset,
                size: *size,
            })
        }
        _ => Err(Error::Validator("record has no on-disk blob source".to_string())),
    }
}

fn entry_matches(matcher: &Matcher, items: &[crate::types::Item]) -> bool {
    let mut probe = Metadata::new();
    for item in items {
        probe.set(item.clone());
    }
    matcher.matches(&probe)
}

/// One event handed to [`for_each_matching_segment`]'s callback: either
/// a matching record, or the boundary between one segment and the
/// next, which [`Sorter::flush_segment_boundary`] needs to implement
/// spec §4.8's "end of segment when no period is given" sort break.
enum SegmentEvent {
    Record(Metadata),
    EndOfSegment,
}

fn for_each_matching_segment(config: &Config, matcher: &Matcher, mut dest: impl FnMut(SegmentEvent) -> Result<()>) -> Result<()> {
    match config.kind {
        Kind::OnDisk2 => {
            let index = OnDisk2Index::open_read_only(
                &config.path.join("index.sqlite"),
                config.unique_fields.clone(),
                config.indexed_fields.clone(),
            )?;
            for file in index.candidate_files(matcher)? {
                let mut err = None;
                index.query_rows_for_file(&file, matcher, &mut |md| match dest(SegmentEvent::Record(md)) {
                    Ok(()) => true,
                    Err(e) => {
                        err = Some(e);
                        false
                    }
                })?;
                if let Some(e) = err {
                    return Err(e);
                }
                dest(SegmentEvent::EndOfSegment)?;
            }
            Ok(())
        }
        Kind::Simple => {
            let manifest = Manifest::open(&config.path)?;
            let interval = matcher.date_extremes().unwrap_or_else(Interval::unbounded);
            for entry in manifest.candidates(&interval) {
                let relpath = PathBuf::from(&entry.file);
                let id = SegmentId::new(config.format, config.path.clone(), relpath);
                if let Some(summary) = read_summary_sidecar(&id)? {
                    if !matcher.summary_could_match(&summary) {
                        dest(SegmentEvent::EndOfSegment)?;
                        continue;
                    }
                }
                for md in read_metadata_sidecar(&id.metadata_path())? {
                    if matcher.matches(&md) {
                        dest(SegmentEvent::Record(md))?;
                    }
                }
                dest(SegmentEvent::EndOfSegment)?;
            }
            Ok(())
        }
    }
}

fn for_each_segment_summary(
    config: &Config,
    matcher: &Matcher,
    mut dest: impl FnMut(&Summary) -> Result<()>,
) -> Result<()> {
    let relpaths: Vec<PathBuf> = match config.kind {
        Kind::OnDisk2 => {
            let index = OnDisk2Index::open_read_only(
                &config.path.join("index.sqlite"),
                config.unique_fields.clone(),
                config.indexed_fields.clone(),
            )?;
            index.candidate_files(matcher)?.into_iter().map(PathBuf::from).collect()
        }
        Kind::Simple => {
            let manifest = Manifest::open(&config.path)?;
            let interval = matcher.date_extremes().unwrap_or_else(Interval::unbounded);
            manifest.candidates(&interval).into_iter().map(|e| PathBuf::from(&e.file)).collect()
        }
    };
    for relpath in relpaths {
        let id = SegmentId::new(config.format, config.path.clone(), relpath);
        if let Some(summary) = read_summary_sidecar(&id)? {
            dest(&summary)?;
        }
    }
    Ok(())
}

fn read_summary_sidecar(id: &SegmentId) -> Result<Option<Summary>> {
    let path = id.summary_path();
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(Summary::decode(&std::fs::read(path)?)?))
}

#[path = "reader_test.rs"]
#[cfg(test)]
mod reader_test;
