//! End-to-end scenarios exercising a dataset from writer through
//! maintenance and back out through the reader, plus the calendar
//! algebra scenarios that don't need a whole dataset to demonstrate.
//!
//! This crate ships no real GRIB/BUFR/... scanner (that's out of
//! scope, spec §1), so each test here registers its own minimal
//! format scanner first. `scanner::testing` lives behind `#[cfg(test)]`
//! inside the library and isn't visible to an integration test crate,
//! so the fixtures below are local instead of reused from there.

use std::sync::Arc;
use std::sync::Once;

use arkimet_core::dataset::config::{Config, Kind, SegmentsMode, Step};
use arkimet_core::dataset::query_data;
use arkimet_core::dataset::writer::Writer;
use arkimet_core::error::Result;
use chrono::Datelike;
use arkimet_core::index::{AcquireResult, ReplacePolicy};
use arkimet_core::maintenance;
use arkimet_core::matcher::Matcher;
use arkimet_core::metadata::{DataFormat, Metadata, Reftime};
use arkimet_core::scanner::{self, Scanner};
use arkimet_core::time::{FuzzyTime, Interval, Time};
use arkimet_core::types::{Code, Item, Origin, Value};

/// `<4-byte BE length><payload>` framing; `payload[0]` is the GRIB1
/// centre, `payload[1]` the day of the month, `payload[2]` (if
/// present) a USN stashed as `Code::Value`.
struct FramedScanner;

impl Scanner for FramedScanner {
    fn split(&self, data: &[u8]) -> Result<Vec<(u64, u64)>> {
        let mut out = Vec::new();
        let mut off = 0usize;
        while off + 4 <= data.len() {
            let len = u32::from_be_bytes(data[off..off + 4].try_into().unwrap()) as usize;
            off += 4;
            if off + len > data.len() {
                // Partial trailing message (e.g. a truncated segment):
                // stop cleanly instead of erroring, same as a real
                // streaming scanner recovering what it can.
                break;
            }
            out.push((off as u64, len as u64));
            off += len;
        }
        Ok(out)
    }

    fn scan_message(&self, data: &[u8]) -> Result<Metadata> {
        if data.is_empty() {
            return arkimet_core::err_at!(Validator, "empty scenario message");
        }
        let mut md = Metadata::new();
        md.set(Item::Origin(Origin::Grib1 {
            centre: data[0],
            subcentre: 0,
            process: 101,
        }));
        let day = if data.len() > 1 { data[1] as u32 } else { 8 };
        md.set_reftime(Reftime::Position(Time::new(2007, 7, day, 0, 0, 0)));
        if data.len() > 2 {
            md.set(Item::Value(Value(data[2].to_string())));
        }
        Ok(md)
    }
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

static REGISTER: Once = Once::new();

fn register_scanner() {
    REGISTER.call_once(|| {
        scanner::register_factory(DataFormat::Grib, Arc::new(FramedScanner));
    });
}

fn base_config(dir: &std::path::Path, kind: Kind) -> Config {
    Config {
        name: "test".to_string(),
        path: dir.to_path_buf(),
        kind,
        format: DataFormat::Grib,
        step: Step::Daily,
        unique_fields: if kind == Kind::OnDisk2 {
            vec![Code::Reftime, Code::Origin]
        } else {
            Vec::new()
        },
        indexed_fields: vec![Code::Origin],
        segments: SegmentsMode::Default,
        replace: ReplacePolicy::Error,
        archive_age_days: None,
        delete_age_days: None,
        restrict: Vec::new(),
        filter: None,
    }
}

/// Scenario 1: acquire three messages in one concat segment, query them
/// back out with every origin/reftime/source intact.
#[test]
fn scenario_basic_multi_message_scan() {
    register_scanner();
    let dir = tempfile::tempdir().unwrap();
    let cfg = base_config(dir.path(), Kind::OnDisk2);

    let mut writer = Writer::open(cfg.clone()).unwrap();
    for (centre, day) in [(200u8, 8u32), (201, 8), (202, 8)] {
        let data = frame(&[centre, day as u8]);
        let mut md = Metadata::new();
        md.set(Item::Origin(Origin::Grib1 {
            centre,
            subcentre: 0,
            process: 101,
        }));
        md.set_reftime(Reftime::Position(Time::new(2007, 7, day, 0, 0, 0)));
        assert_eq!(writer.acquire(md, &data).unwrap(), AcquireResult::Ok);
    }
    writer.commit().unwrap();

    let records = query_data(&cfg, &Matcher::everything(), "reftime").unwrap();
    assert_eq!(records.len(), 3);
    for (record, centre) in records.iter().zip([200u8, 201, 202]) {
        match record.get(Code::Origin) {
            Some(Item::Origin(Origin::Grib1 { centre: c, .. })) => assert_eq!(*c, centre),
            other => panic!("unexpected origin: {:?}", other),
        }
        assert!(matches!(record.source(), Some(arkimet_core::metadata::Source::Blob { .. })));
    }
}

/// Scenario 2: replace-by-USN only accepts a higher-or-equal USN.
#[test]
fn scenario_replace_with_usn() {
    register_scanner();
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = base_config(dir.path(), Kind::OnDisk2);
    cfg.replace = ReplacePolicy::Usn;

    let mut writer = Writer::open(cfg.clone()).unwrap();
    let mut md1 = Metadata::new();
    md1.set(Item::Origin(Origin::Grib1 {
        centre: 200,
        subcentre: 0,
        process: 101,
    }));
    md1.set_reftime(Reftime::Position(Time::new(2007, 7, 8, 0, 0, 0)));
    md1.set(Item::Value(Value("5".to_string())));
    assert_eq!(writer.acquire(md1, &frame(&[200, 8, 5])).unwrap(), AcquireResult::Ok);
    writer.commit().unwrap();
    drop(writer);

    // Lower USN: rejected, old record kept.
    let mut writer = Writer::open(cfg.clone()).unwrap();
    let mut md_low = Metadata::new();
    md_low.set(Item::Origin(Origin::Grib1 {
        centre: 200,
        subcentre: 0,
        process: 101,
    }));
    md_low.set_reftime(Reftime::Position(Time::new(2007, 7, 8, 0, 0, 0)));
    md_low.set(Item::Value(Value("3".to_string())));
    assert_eq!(writer.acquire(md_low, &frame(&[200, 8, 3])).unwrap(), AcquireResult::ErrorDuplicate);
    writer.commit().unwrap();
    drop(writer);

    // Higher USN: accepted, replaces the old record.
    let mut writer = Writer::open(cfg.clone()).unwrap();
    let mut md_high = Metadata::new();
    md_high.set(Item::Origin(Origin::Grib1 {
        centre: 200,
        subcentre: 0,
        process: 101,
    }));
    md_high.set_reftime(Reftime::Position(Time::new(2007, 7, 8, 0, 0, 0)));
    md_high.set(Item::Value(Value("9".to_string())));
    assert_eq!(writer.acquire(md_high, &frame(&[200, 8, 9])).unwrap(), AcquireResult::Ok);
    writer.commit().unwrap();

    let records = query_data(&cfg, &Matcher::everything(), "reftime").unwrap();
    assert_eq!(records.len(), 1);
    match records[0].get(Code::Value) {
        Some(Item::Value(Value(s))) => assert_eq!(s, "9"),
        other => panic!("unexpected value item: {:?}", other),
    }
}

/// Scenario 3: archive-by-age moves old segments into
/// `.archive/last/`, which is itself a queryable simple dataset; the
/// main dataset plus the archive together still hold every record.
#[test]
fn scenario_archive_by_age() {
    register_scanner();
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = base_config(dir.path(), Kind::OnDisk2);
    cfg.step = Step::Monthly;
    cfg.archive_age_days = Some(1);

    let mut writer = Writer::open(cfg.clone()).unwrap();
    let mut md_recent = Metadata::new();
    md_recent.set(Item::Origin(Origin::Grib1 {
        centre: 200,
        subcentre: 0,
        process: 101,
    }));
    // today, so this segment never crosses the archive age threshold.
    let n = chrono::Utc::now();
    md_recent.set_reftime(Reftime::Position(Time::new(n.year() as i32, n.month(), n.day(), 0, 0, 0)));
    writer.acquire(md_recent, &frame(&[200, 1])).unwrap();
    writer.commit().unwrap();
    drop(writer);

    let mut writer = Writer::open(cfg.clone()).unwrap();
    for day in [8u32, 9] {
        let mut md = Metadata::new();
        md.set(Item::Origin(Origin::Grib1 {
            centre: 201,
            subcentre: 0,
            process: 101,
        }));
        md.set_reftime(Reftime::Position(Time::new(2007, 7, day, 0, 0, 0)));
        writer.acquire(md, &frame(&[201, day as u8])).unwrap();
    }
    writer.commit().unwrap();
    drop(writer);

    let report = maintenance::repack(&cfg, true).unwrap();
    assert_eq!(report.archived, 1);

    let main_records = query_data(&cfg, &Matcher::everything(), "reftime").unwrap();

    let archive_cfg = Config {
        kind: Kind::Simple,
        unique_fields: Vec::new(),
        indexed_fields: Vec::new(),
        path: dir.path().join(".archive").join("last"),
        ..cfg.clone()
    };
    let archived_records = query_data(&archive_cfg, &Matcher::everything(), "reftime").unwrap();

    assert_eq!(main_records.len() + archived_records.len(), 3);
    assert_eq!(archived_records.len(), 2);
}

/// Scenario 4: a segment truncated mid-message is flagged for rescan
/// and, once repacked, keeps only the messages that survived intact.
#[test]
fn scenario_truncated_segment_rescan() {
    register_scanner();
    let dir = tempfile::tempdir().unwrap();
    let cfg = base_config(dir.path(), Kind::OnDisk2);

    let mut writer = Writer::open(cfg.clone()).unwrap();
    for (centre, day) in [(200u8, 8u32), (201, 9)] {
        let mut md = Metadata::new();
        md.set(Item::Origin(Origin::Grib1 {
            centre,
            subcentre: 0,
            process: 101,
        }));
        md.set_reftime(Reftime::Position(Time::new(2007, 7, day, 0, 0, 0)));
        writer.acquire(md, &frame(&[centre, day as u8])).unwrap();
    }
    writer.commit().unwrap();
    drop(writer);

    let segment_path = dir.path().join("2007/07-08.grib");
    let mut bytes = std::fs::read(&segment_path).unwrap();
    // Chop off the tail so the second message's frame is incomplete.
    bytes.truncate(bytes.len() - 2);
    std::fs::write(&segment_path, &bytes).unwrap();

    let report = maintenance::check(&cfg, false).unwrap();
    let status = report.statuses.iter().find(|s| s.relpath == std::path::Path::new("2007/07-08.grib")).unwrap();
    assert!(status.state.contains(arkimet_core::segment::State::UNALIGNED));

    maintenance::repack(&cfg, true).unwrap();

    let records = query_data(&cfg, &Matcher::everything(), "reftime").unwrap();
    assert_eq!(records.len(), 1);
    match records[0].get(Code::Origin) {
        Some(Item::Origin(Origin::Grib1 { centre, .. })) => assert_eq!(*centre, 200),
        other => panic!("unexpected origin: {:?}", other),
    }
}

/// Scenario 5: half-open interval intersection, including the
/// boundary-touching case that is disjoint rather than a single point.
#[test]
fn scenario_interval_intersection() {
    let a = Interval::new(Some(Time::new(2000, 1, 1, 0, 0, 0)), Some(Time::new(2010, 1, 1, 0, 0, 0)));
    let b = Interval::new(Some(Time::new(2005, 1, 1, 0, 0, 0)), Some(Time::new(2015, 1, 1, 0, 0, 0)));
    let got = a.intersect(&b).unwrap();
    assert_eq!(got.begin, Some(Time::new(2005, 1, 1, 0, 0, 0)));
    assert_eq!(got.end, Some(Time::new(2010, 1, 1, 0, 0, 0)));

    let left = Interval::new(None, Some(Time::new(2000, 1, 1, 0, 0, 0)));
    let right = Interval::new(Some(Time::new(2000, 1, 1, 0, 0, 0)), None);
    assert!(left.intersect(&right).is_none());
}

/// Scenario 6: fuzzy-time validation, including the Feb 29 leap-year
/// rule and hour-24's zeroed minute/second requirement.
#[test]
fn scenario_fuzzy_time_validation() {
    assert!(FuzzyTime::new(2024, 2, 29, -1, -1, -1).validate().is_ok());

    let err = FuzzyTime::new(2023, 2, 29, -1, -1, -1).validate().unwrap_err();
    assert!(err.to_string().contains("day must be between 1 and 28"));

    let err = FuzzyTime::new(2024, 2, 1, 24, 1, 0).validate().unwrap_err();
    assert!(err.to_string().contains("on hour 24, minute must be zero"));
}
