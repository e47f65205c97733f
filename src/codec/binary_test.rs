use super::*;
use crate::metadata::{DataFormat, Note};
use crate::time::Time;
use crate::types::{Level, Origin, Product};

fn sample_metadata() -> Metadata {
    let mut md = Metadata::new();
    md.set_reftime(Reftime::Position(Time::new(2007, 7, 8, 13, 0, 0)));
    md.set_source(Source::Blob {
        format: DataFormat::Grib,
        root: "/archive/test".into(),
        relpath: "2007/07-08.grib".into(),
        offset: 0,
        size: 7218,
    });
    md.set(Item::Origin(Origin::Grib1 {
        centre: 200,
        subcentre: 0,
        process: 101,
    }));
    md.set(Item::Product(Product::Grib1 {
        origin: 200,
        table: 2,
        product: 11,
    }));
    md.set(Item::Level(Level::Grib1 {
        ltype: 1,
        l1: 0,
        l2: 0,
    }));
    md.add_note(Note::new(Time::new(2020, 1, 1, 0, 0, 0), "scanned by test"));
    md
}

#[test]
fn test_metadata_payload_roundtrip() {
    let md = sample_metadata();
    let payload = encode_metadata(&md);
    let decoded = decode_metadata(&payload).unwrap();
    assert_eq!(decoded, md);
}

#[test]
fn test_bundle_roundtrip_md() {
    let md = sample_metadata();
    let bundle = Bundle::Md(md.clone());
    let encoded = encode_bundle(&bundle).unwrap();
    let (decoded, consumed) = decode_bundle(&encoded).unwrap();
    assert_eq!(consumed, encoded.len());
    match decoded {
        Bundle::Md(decoded_md) => assert_eq!(decoded_md, md),
        _ => panic!("wrong bundle kind"),
    }
}

#[test]
fn test_bundle_roundtrip_deleted() {
    let encoded = encode_bundle(&Bundle::Deleted).unwrap();
    let (decoded, consumed) = decode_bundle(&encoded).unwrap();
    assert_eq!(consumed, 10);
    assert!(matches!(decoded, Bundle::Deleted));
}

#[test]
fn test_bundle_roundtrip_group() {
    let a = Bundle::Md(sample_metadata());
    let mut b_md = sample_metadata();
    b_md.set(Item::Origin(Origin::Grib1 {
        centre: 201,
        subcentre: 0,
        process: 101,
    }));
    let b = Bundle::Md(b_md);
    let group = Bundle::Group(vec![a, b]);
    let encoded = encode_bundle(&group).unwrap();
    let (decoded, consumed) = decode_bundle(&encoded).unwrap();
    assert_eq!(consumed, encoded.len());
    match decoded {
        Bundle::Group(items) => assert_eq!(items.len(), 2),
        _ => panic!("wrong bundle kind"),
    }
}

#[test]
fn test_decode_bundle_rejects_unknown_signature() {
    let mut buf = vec![b'X', b'X', 0, 0];
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf.extend_from_slice(&0u32.to_be_bytes());
    let err = decode_bundle(&buf).unwrap_err();
    assert_eq!(err.kind(), "Codec");
}

#[test]
fn test_decode_bundle_reports_short_read() {
    let err = decode_bundle(&[0u8; 3]).unwrap_err();
    assert_eq!(err.kind(), "Codec");
}

#[test]
fn test_two_bundles_back_to_back_in_carrier_stream() {
    let mut stream = Vec::new();
    stream.extend(encode_bundle(&Bundle::Md(sample_metadata())).unwrap());
    stream.extend(encode_bundle(&Bundle::Deleted).unwrap());

    let (first, n1) = decode_bundle(&stream).unwrap();
    assert!(matches!(first, Bundle::Md(_)));
    let (second, _n2) = decode_bundle(&stream[n1..]).unwrap();
    assert!(matches!(second, Bundle::Deleted));
}
