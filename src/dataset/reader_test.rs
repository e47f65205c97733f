use super::*;
use crate::dataset::config::{SegmentsMode, Step};
use crate::dataset::writer::Writer;
use crate::index::ReplacePolicy;
use crate::metadata::{DataFormat, Reftime};
use crate::time::Time;
use crate::types::{Item, Origin};

fn record(centre: u8, day: u32) -> (Metadata, Vec<u8>) {
    let mut md = Metadata::new();
    md.set(Item::Origin(Origin::Grib1 {
        centre,
        subcentre: 0,
        process: 0,
    }));
    md.set_reftime(Reftime::Position(Time::new(2007, 7, day, 0, 0, 0)));
    (md, vec![centre, day as u8])
}

fn config(dir: &std::path::Path, kind: Kind) -> Config {
    Config {
        name: "test".to_string(),
        path: dir.to_path_buf(),
        kind,
        format: DataFormat::Grib,
        step: Step::Daily,
        unique_fields: if kind == Kind::OnDisk2 { vec![Code::Reftime, Code::Origin] } else { Vec::new() },
        indexed_fields: vec![Code::Origin],
        segments: SegmentsMode::Default,
        replace: ReplacePolicy::Error,
        archive_age_days: None,
        delete_age_days: None,
        restrict: Vec::new(),
        filter: None,
    }
}

fn populate(config: &Config) {
    let mut writer = Writer::open(config.clone()).unwrap();
    let (md1, d1) = record(200, 1);
    let (md2, d2) = record(100, 2);
    let (md3, d3) = record(200, 15);
    writer.acquire(md1, &d1).unwrap();
    writer.acquire(md2, &d2).unwrap();
    writer.acquire(md3, &d3).unwrap();
    writer.commit().unwrap();
}

#[test]
fn test_query_data_ondisk2_filters_by_matcher() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Kind::OnDisk2);
    populate(&cfg);

    let matcher = Matcher::parse("origin:GRIB1(200,0,0)").unwrap();
    let out = query_data(&cfg, &matcher, "").unwrap();
    assert_eq!(out.len(), 2);
}

#[test]
fn test_query_data_simple_filters_by_matcher_and_reftime() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Kind::Simple);
    populate(&cfg);

    let matcher = Matcher::parse("reftime:>=2007-07-10").unwrap();
    let out = query_data(&cfg, &matcher, "").unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].reftime().unwrap().sort_key().day, 15);
}

#[test]
fn test_query_data_sorts_descending_by_reftime() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Kind::OnDisk2);
    populate(&cfg);

    // An explicit period keeps every record in one window (all three
    // fall in 2007) and sorted dataset-wide; a bare "-reftime" with no
    // period instead flushes per segment (see the test below).
    let out = query_data(&cfg, &Matcher::everything(), "year:-reftime").unwrap();
    let days: Vec<u32> = out.iter().map(|m| m.reftime().unwrap().sort_key().day).collect();
    assert_eq!(days, vec![15, 2, 1]);
}

#[test]
fn test_query_data_no_period_flushes_each_segment_independently() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Kind::Simple);
    populate(&cfg); // day 1, day 2, day 15: three distinct daily segments

    // No period given: spec §4.8's sort-break is "end of segment", so
    // each segment's one-record window is flushed (and sorted) on its
    // own, and the overall order follows segment order rather than a
    // single dataset-wide sort.
    let out = query_data(&cfg, &Matcher::everything(), ":-reftime").unwrap();
    let days: Vec<u32> = out.iter().map(|m| m.reftime().unwrap().sort_key().day).collect();
    assert_eq!(days, vec![1, 2, 15]);
}

#[test]
fn test_query_bytes_returns_decoded_blob_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Kind::OnDisk2);
    populate(&cfg);

    let matcher = Matcher::parse("origin:GRIB1(100,0,0)").unwrap();
    let mut seen = Vec::new();
    query_bytes(&cfg, &matcher, "", |_md, bytes| {
        seen.push(bytes);
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, vec![vec![100u8, 2u8]]);
}

#[test]
fn test_query_summary_merges_matching_segment_summaries() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), Kind::Simple);
    populate(&cfg);

    let summary = query_summary(&cfg, &Matcher::everything()).unwrap();
    assert_eq!(summary.count(), 3);
}
