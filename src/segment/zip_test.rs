use super::*;
use crate::metadata::DataFormat;
use crate::scanner::testing;
use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Hand-assemble a minimal stored-method (uncompressed) ZIP archive so
/// the reader can be exercised without a `zip`-writing dependency.
fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut local_offsets = Vec::new();

    for (name, data) in entries {
        local_offsets.push(out.len() as u32);
        let crc = CRC32.checksum(data);
        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&0u16.to_le_bytes()); // method: stored
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0u16.to_le_bytes()); // mod date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes()); // comp size
        out.extend_from_slice(&(data.len() as u32).to_le_bytes()); // uncomp size
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra len
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);
    }

    let cd_start = out.len();
    for ((name, data), local_offset) in entries.iter().zip(local_offsets.iter()) {
        let crc = CRC32.checksum(data);
        out.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes()); // version made by
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&0u16.to_le_bytes()); // method
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0u16.to_le_bytes()); // mod date
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra len
        out.extend_from_slice(&0u16.to_le_bytes()); // comment len
        out.extend_from_slice(&0u16.to_le_bytes()); // disk start
        out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        out.extend_from_slice(&local_offset.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
    }
    let cd_size = out.len() - cd_start;

    out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(cd_size as u32).to_le_bytes());
    out.extend_from_slice(&(cd_start as u32).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());

    out
}

fn setup() -> (tempfile::TempDir, SegmentId) {
    testing::register();
    let dir = tempfile::tempdir().unwrap();
    let id = SegmentId::new(DataFormat::Grib, dir.path(), "2007/07-08.zip");
    (dir, id)
}

#[test]
fn test_scan_reads_every_stored_entry() {
    let (_dir, id) = setup();
    let zip = build_zip(&[("000000.grib", &[200]), ("000001.grib", &[201])]);
    std::fs::write(id.abspath(), &zip).unwrap();

    let r = ZipReader::open(id).unwrap();
    let mut count = 0;
    r.scan_data(&mut |_, _| {
        count += 1;
        true
    })
    .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_read_by_location_returns_entry_bytes() {
    let (_dir, id) = setup();
    let zip = build_zip(&[("000000.grib", &[200])]);
    std::fs::write(id.abspath(), &zip).unwrap();

    let r = ZipReader::open(id).unwrap();
    let loc = BlobLocation {
        relpath: "2007/07-08.zip/000000.grib".into(),
        offset: 0,
        size: 1,
    };
    assert_eq!(r.read(&loc).unwrap(), vec![200]);
}

#[test]
fn test_check_reports_corrupted_on_truncated_archive() {
    let (_dir, id) = setup();
    let zip = build_zip(&[("000000.grib", &[200])]);
    std::fs::write(id.abspath(), &zip[..zip.len() - 5]).unwrap();

    let checker = ZipChecker::new(id);
    let state = checker.check(&[(0, 1)], false).unwrap();
    assert!(!state.is_ok());
}

#[test]
fn test_repack_is_unsupported_for_sealed_archives() {
    let (_dir, id) = setup();
    let checker = ZipChecker::new(id);
    assert!(checker.repack(&[]).is_err());
}
