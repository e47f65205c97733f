use super::*;
use crate::metadata::DataFormat;
use crate::scanner::testing;

fn build_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

fn setup() -> (tempfile::TempDir, SegmentId) {
    testing::register();
    let dir = tempfile::tempdir().unwrap();
    let id = SegmentId::new(DataFormat::Grib, dir.path(), "2007/07-08.tar");
    (dir, id)
}

#[test]
fn test_scan_reads_every_tar_entry() {
    let (_dir, id) = setup();
    let archive = build_tar(&[("000000.grib", &[200]), ("000001.grib", &[201])]);
    std::fs::write(id.abspath(), &archive).unwrap();

    let r = TarReader::open(id).unwrap();
    let mut count = 0;
    r.scan_data(&mut |_, _| {
        count += 1;
        true
    })
    .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_read_by_index_returns_entry_bytes() {
    let (_dir, id) = setup();
    let archive = build_tar(&[("000000.grib", &[200])]);
    std::fs::write(id.abspath(), &archive).unwrap();

    let r = TarReader::open(id).unwrap();
    let loc = BlobLocation {
        relpath: "2007/07-08.tar/000000.grib".into(),
        offset: 0,
        size: 1,
    };
    assert_eq!(r.read(&loc).unwrap(), vec![200]);
}

#[test]
fn test_check_flags_entry_count_mismatch() {
    let (_dir, id) = setup();
    let archive = build_tar(&[("000000.grib", &[200])]);
    std::fs::write(id.abspath(), &archive).unwrap();

    let checker = TarChecker::new(id);
    let state = checker.check(&[(0, 1), (1, 1)], true).unwrap();
    assert!(state.contains(State::UNALIGNED));
}

#[test]
fn test_repack_is_unsupported_for_sealed_archives() {
    let (_dir, id) = setup();
    let checker = TarChecker::new(id);
    assert!(checker.repack(&[]).is_err());
}
