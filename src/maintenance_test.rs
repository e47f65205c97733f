use super::*;
use crate::dataset::config::{Kind, SegmentsMode, Step};
use crate::dataset::writer::Writer;
use crate::index::ReplacePolicy;
use crate::index::ondisk2::OnDisk2Index;
use crate::metadata::{DataFormat, Reftime};
use crate::types::{Code, Item, Origin};

fn record(centre: u8, day: u32) -> (crate::metadata::Metadata, Vec<u8>) {
    let mut md = crate::metadata::Metadata::new();
    md.set(Item::Origin(Origin::Grib1 {
        centre,
        subcentre: 0,
        process: 0,
    }));
    md.set_reftime(Reftime::Position(Time::new(2007, 7, day, 0, 0, 0)));
    (md, vec![centre, day as u8])
}

fn dataset_config(dir: &std::path::Path, kind: Kind) -> Config {
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
    let (md1, d1) = record(200, 8);
    writer.acquire(md1, &d1).unwrap();
    writer.commit().unwrap();
}

#[test]
fn test_check_reports_ok_for_clean_ondisk2_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dataset_config(dir.path(), Kind::OnDisk2);
    populate(&cfg);

    let report = check(&cfg, false).unwrap();
    assert_eq!(report.statuses.len(), 1);
    assert!(report.statuses[0].state.is_ok());
}

#[test]
fn test_check_flags_dirty_segment_with_trailing_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dataset_config(dir.path(), Kind::OnDisk2);
    populate(&cfg);

    let segment_path = dir.path().join("2007/07-08.grib");
    let mut bytes = std::fs::read(&segment_path).unwrap();
    bytes.extend_from_slice(b"garbage-tail");
    std::fs::write(&segment_path, bytes).unwrap();

    let report = check(&cfg, false).unwrap();
    assert_eq!(report.statuses.len(), 1);
    assert!(report.statuses[0].state.contains(State::DIRTY));
}

#[test]
fn test_repack_dry_run_leaves_index_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dataset_config(dir.path(), Kind::OnDisk2);
    populate(&cfg);

    let before = OnDisk2Index::open_read_only(&dir.path().join("index.sqlite"), cfg.unique_fields.clone(), cfg.indexed_fields.clone())
        .unwrap()
        .row_count()
        .unwrap();

    let report = repack(&cfg, false).unwrap();
    assert_eq!(report.deleted, 0);
    assert_eq!(report.archived, 0);

    let after = OnDisk2Index::open_read_only(&dir.path().join("index.sqlite"), cfg.unique_fields.clone(), cfg.indexed_fields.clone())
        .unwrap()
        .row_count()
        .unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_repack_deletes_segments_past_delete_age() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = dataset_config(dir.path(), Kind::OnDisk2);
    cfg.delete_age_days = Some(0);
    populate(&cfg);

    let report = repack(&cfg, true).unwrap();
    assert_eq!(report.deleted, 1);

    let index = OnDisk2Index::open_read_only(&dir.path().join("index.sqlite"), cfg.unique_fields.clone(), cfg.indexed_fields.clone()).unwrap();
    assert_eq!(index.row_count().unwrap(), 0);
    assert!(!dir.path().join("2007/07-08.grib").exists());
}

#[test]
fn test_repack_refuses_when_lock_held() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dataset_config(dir.path(), Kind::OnDisk2);
    populate(&cfg);

    let writer = Writer::open(cfg.clone()).unwrap();
    assert!(repack(&cfg, true).is_err());
    drop(writer);
}

/// Drops the trailing message of a segment, then walks it through a
/// full check/rescan/pack cycle, confirming the segment ends up
/// holding exactly one fewer record and sized to match.
#[test]
fn test_truncated_segment_rescans_to_exact_record_count_and_size() {
    crate::scanner::testing::register();
    let dir = tempfile::tempdir().unwrap();
    let cfg = dataset_config(dir.path(), Kind::OnDisk2);

    let mut writer = Writer::open(cfg.clone()).unwrap();
    for centre in [200u8, 201, 202] {
        let mut md = crate::metadata::Metadata::new();
        md.set(Item::Origin(Origin::Grib1 {
            centre,
            subcentre: 0,
            process: 0,
        }));
        md.set_reftime(Reftime::Position(Time::new(2007, 7, 8, 0, 0, 0)));
        writer.acquire(md, &crate::scanner::testing::frame(&[centre])).unwrap();
    }
    writer.commit().unwrap();

    let relpath = std::path::PathBuf::from("2007/07-08.grib");
    let id = SegmentId::new(DataFormat::Grib, dir.path().to_path_buf(), relpath.clone());

    let before = check(&cfg, false).unwrap();
    assert_eq!(before.statuses.len(), 1);
    assert!(before.statuses[0].state.is_ok());

    // drop the last framed message entirely: the index still expects
    // 3 records' worth of bytes, but only 2 remain on disk.
    let full_len = std::fs::metadata(id.abspath()).unwrap().len();
    let last_size = crate::scanner::testing::frame(&[202]).len() as u64;
    let checker = segment::detect_checker(&id).unwrap();
    checker.test_truncate(full_len - last_size).unwrap();

    let after_truncate = check(&cfg, false).unwrap();
    assert!(!after_truncate.statuses[0].state.is_ok());

    let report = repack(&cfg, true).unwrap();
    assert_eq!(report.rescanned, 1);

    let index = OnDisk2Index::open_read_only(&dir.path().join("index.sqlite"), cfg.unique_fields.clone(), cfg.indexed_fields.clone()).unwrap();
    let rows = index.rows_for_file("2007/07-08.grib").unwrap();
    assert_eq!(rows.len(), 2);

    let after_rescan = check(&cfg, false).unwrap();
    assert!(after_rescan.statuses[0].state.is_ok());

    // each framed test message carries a 4-byte length prefix ahead of
    // its payload, so the file's total size is the payload sizes plus
    // one prefix per surviving record.
    let expected_size: u64 = rows.iter().map(|(_, _, size)| *size).sum::<u64>() + 4 * rows.len() as u64;
    let actual_size = std::fs::metadata(id.abspath()).unwrap().len();
    assert_eq!(actual_size, expected_size);
}
