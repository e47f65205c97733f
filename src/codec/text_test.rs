use super::*;
use crate::metadata::DataFormat;

fn sample() -> Metadata {
    let mut md = Metadata::new();
    md.set_reftime(Reftime::Position(Time::new(2007, 7, 8, 13, 0, 0)));
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
    md.set(Item::Run(Run { minute: 0 }));
    md.set_source(Source::Blob {
        format: DataFormat::Grib,
        root: "/archive".into(),
        relpath: "2007/07-08.grib".into(),
        offset: 0,
        size: 7218,
    });
    md
}

#[test]
fn test_record_roundtrip() {
    let md = sample();
    let text = encode_record(&md);
    let decoded = decode_record(&text).unwrap();
    assert_eq!(decoded, md);
}

#[test]
fn test_multiple_records_roundtrip() {
    let a = sample();
    let mut b = sample();
    b.set(Item::Origin(Origin::Grib1 {
        centre: 201,
        subcentre: 0,
        process: 101,
    }));
    let text = encode_records(&[a.clone(), b.clone()]);
    let decoded = decode_records(&text).unwrap();
    assert_eq!(decoded, vec![a, b]);
}

#[test]
fn test_decode_rejects_unknown_key() {
    let err = decode_record("Bogus: 1\n").unwrap_err();
    assert_eq!(err.kind(), "Codec");
}

#[test]
fn test_area_keyed_values_roundtrip() {
    let mut md = Metadata::new();
    let mut kv = std::collections::BTreeMap::new();
    kv.insert("lat".to_string(), "44.5".to_string());
    kv.insert("lon".to_string(), "11.3".to_string());
    md.set(Item::Area(Area::Grib(kv)));
    let text = encode_record(&md);
    let decoded = decode_record(&text).unwrap();
    assert_eq!(decoded, md);
}
