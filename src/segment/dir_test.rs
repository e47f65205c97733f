use super::*;
use crate::metadata::DataFormat;
use crate::scanner::testing;

fn setup() -> (tempfile::TempDir, SegmentId) {
    testing::register();
    let dir = tempfile::tempdir().unwrap();
    let id = SegmentId::new(DataFormat::Grib, dir.path(), "2007/07-08");
    (dir, id)
}

#[test]
fn test_append_creates_one_file_per_message() {
    let (_dir, id) = setup();
    let mut w = DirWriter::open(id.clone()).unwrap();
    let loc1 = w.append(&[200]).unwrap();
    let loc2 = w.append(&[201]).unwrap();
    w.commit().unwrap();
    assert_eq!(loc1.offset, 0);
    assert_eq!(loc2.offset, 1);

    let r = DirReader::open(id).unwrap();
    let mut count = 0;
    r.scan_data(&mut |_, _| {
        count += 1;
        true
    })
    .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_rollback_removes_uncommitted_files() {
    let (_dir, id) = setup();
    let mut w = DirWriter::open(id.clone()).unwrap();
    w.append(&[200]).unwrap();
    w.commit().unwrap();

    let mut w2 = DirWriter::open(id.clone()).unwrap();
    w2.append(&[201]).unwrap();
    w2.rollback().unwrap();

    let r = DirReader::open(id).unwrap();
    let mut count = 0;
    r.scan_data(&mut |_, _| {
        count += 1;
        true
    })
    .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_check_flags_missing_entry() {
    let (_dir, id) = setup();
    let mut w = DirWriter::open(id.clone()).unwrap();
    let loc = w.append(&[200]).unwrap();
    w.commit().unwrap();

    let checker = DirChecker::new(id.clone());
    let ok = checker.check(&[(loc.offset, loc.size)], true).unwrap();
    assert!(ok.is_ok());

    let missing = checker.check(&[(loc.offset, loc.size), (5, 1)], true).unwrap();
    assert!(missing.contains(State::MISSING));
}

#[test]
fn test_check_detects_colliding_positions() {
    let (_dir, id) = setup();
    let mut w = DirWriter::open(id.clone()).unwrap();
    let loc1 = w.append(&[200]).unwrap();
    let loc2 = w.append(&[201]).unwrap();
    w.commit().unwrap();

    // two expected entries claiming the same sequence number.
    let colliding = [(loc1.offset, loc1.size), (loc1.offset, loc2.size)];
    let checker = DirChecker::new(id);
    let state = checker.check(&colliding, true).unwrap();
    assert!(state.contains(State::CORRUPTED));
}

#[test]
fn test_repack_renumbers_kept_entries() {
    let (_dir, id) = setup();
    let mut w = DirWriter::open(id.clone()).unwrap();
    let loc1 = w.append(&[200]).unwrap();
    let loc2 = w.append(&[201]).unwrap();
    w.commit().unwrap();

    let checker = DirChecker::new(id.clone());
    let new_locs = checker.repack(&[(loc2.offset, loc2.size)]).unwrap();
    assert_eq!(new_locs, vec![(0, loc2.size)]);

    let r = DirReader::open(id).unwrap();
    let mut count = 0;
    r.scan_data(&mut |_, loc| {
        assert_eq!(loc.offset, 0);
        count += 1;
        true
    })
    .unwrap();
    assert_eq!(count, 1);
    let _ = loc1;
}
