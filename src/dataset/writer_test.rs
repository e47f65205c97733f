use super::*;
use crate::metadata::Reftime;
use crate::time::Time;
use crate::types::{Item, Origin};

fn sample(centre: u8, day: u32) -> (Metadata, Vec<u8>) {
    let mut md = Metadata::new();
    md.set(Item::Origin(Origin::Grib1 {
        centre,
        subcentre: 0,
        process: 0,
    }));
    md.set_reftime(Reftime::Position(Time::new(2007, 7, day, 0, 0, 0)));
    (md, vec![1, 2, 3, 4])
}

fn ondisk2_config(dir: &std::path::Path) -> Config {
    Config {
        name: "test".to_string(),
        path: dir.to_path_buf(),
        kind: Kind::OnDisk2,
        format: crate::metadata::DataFormat::Grib,
        step: crate::dataset::config::Step::Daily,
        unique_fields: vec![Code::Reftime, Code::Origin],
        indexed_fields: vec![Code::Origin],
        segments: SegmentsMode::Default,
        replace: ReplacePolicy::Error,
        archive_age_days: None,
        delete_age_days: None,
        restrict: Vec::new(),
        filter: None,
    }
}

fn simple_config(dir: &std::path::Path) -> Config {
    Config {
        kind: Kind::Simple,
        unique_fields: Vec::new(),
        indexed_fields: Vec::new(),
        ..ondisk2_config(dir)
    }
}

#[test]
fn test_acquire_and_commit_writes_segment_and_index() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = Writer::open(ondisk2_config(dir.path())).unwrap();
    let (md, data) = sample(200, 8);
    assert_eq!(writer.acquire(md, &data).unwrap(), AcquireResult::Ok);
    writer.commit().unwrap();

    let segment_path = dir.path().join("2007/07-08.grib");
    assert!(segment_path.exists());
    assert_eq!(std::fs::read(&segment_path).unwrap(), data);

    let index = OnDisk2Index::open(&dir.path().join("index.sqlite"), vec![Code::Reftime], Vec::new()).unwrap();
    assert_eq!(index.row_count().unwrap(), 1);
}

#[test]
fn test_acquire_rejects_duplicate_under_error_policy() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = Writer::open(ondisk2_config(dir.path())).unwrap();
    let (md1, data1) = sample(200, 8);
    writer.acquire(md1, &data1).unwrap();
    writer.commit().unwrap();
    drop(writer);

    let mut writer = Writer::open(ondisk2_config(dir.path())).unwrap();
    let (md2, data2) = sample(200, 8);
    assert_eq!(writer.acquire(md2, &data2).unwrap(), AcquireResult::ErrorDuplicate);
}

#[test]
fn test_acquire_replaces_duplicate_under_replace_policy() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ondisk2_config(dir.path());
    config.replace = ReplacePolicy::Replace;

    let mut writer = Writer::open(config.clone()).unwrap();
    let (md1, data1) = sample(200, 8);
    writer.acquire(md1, &data1).unwrap();
    writer.commit().unwrap();
    drop(writer);

    let mut writer = Writer::open(config).unwrap();
    let (md2, data2) = sample(200, 8);
    assert_eq!(writer.acquire(md2, &data2).unwrap(), AcquireResult::Ok);
    writer.commit().unwrap();

    let index = OnDisk2Index::open(&dir.path().join("index.sqlite"), vec![Code::Reftime], Vec::new()).unwrap();
    assert_eq!(index.row_count().unwrap(), 1);
}

#[test]
fn test_rollback_discards_segment_append() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = Writer::open(ondisk2_config(dir.path())).unwrap();
    let (md, data) = sample(200, 8);
    writer.acquire(md, &data).unwrap();
    writer.rollback().unwrap();

    let index = OnDisk2Index::open(&dir.path().join("index.sqlite"), vec![Code::Reftime], Vec::new()).unwrap();
    assert_eq!(index.row_count().unwrap(), 0);
}

#[test]
fn test_simple_dataset_writes_manifest_without_index() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = Writer::open(simple_config(dir.path())).unwrap();
    let (md, data) = sample(200, 8);
    writer.acquire(md, &data).unwrap();
    writer.commit().unwrap();

    let manifest = Manifest::open(dir.path()).unwrap();
    assert!(manifest.get("2007/07-08.grib").is_some());
    assert!(!dir.path().join("index.sqlite").exists());
}

#[test]
fn test_open_rejects_dataset_marked_needs_check() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path()).unwrap();
    std::fs::write(dir.path().join("needs-check-do-not-pack"), b"").unwrap();
    let err = Writer::open(ondisk2_config(dir.path())).unwrap_err();
    assert_eq!(err.kind(), "IndexBusy");
}
