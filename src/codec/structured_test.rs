use super::*;
use crate::metadata::DataFormat;
use crate::types::Origin;

fn sample() -> Metadata {
    let mut md = Metadata::new();
    md.set_reftime(Reftime::Position(crate::time::Time::new(2007, 7, 8, 13, 0, 0)));
    md.set(Item::Origin(Origin::Grib1 {
        centre: 200,
        subcentre: 0,
        process: 101,
    }));
    md.set_source(Source::Blob {
        format: DataFormat::Grib,
        root: "/archive".into(),
        relpath: "2007/07-08.grib".into(),
        offset: 0,
        size: 7218,
    });
    md.add_note(Note::new(crate::time::Time::new(2020, 1, 1, 0, 0, 0), "hello"));
    md
}

#[test]
fn test_structured_roundtrip() {
    let md = sample();
    let value = encode_metadata(&md);
    let decoded = decode_metadata(&value).unwrap();
    assert_eq!(decoded, md);
}

#[test]
fn test_structured_uses_short_keys() {
    let md = sample();
    let value = encode_metadata(&md);
    let obj = value.as_object().unwrap();
    assert!(obj.contains_key("r"));
    assert!(obj.contains_key("s"));
    assert!(obj.contains_key("n"));
    assert!(obj.contains_key("i"));
}

#[test]
fn test_structured_period_reftime_roundtrip() {
    let mut md = Metadata::new();
    md.set_reftime(Reftime::Period(
        crate::time::Time::new(2020, 1, 1, 0, 0, 0),
        crate::time::Time::new(2020, 1, 2, 0, 0, 0),
    ));
    let value = encode_metadata(&md);
    let decoded = decode_metadata(&value).unwrap();
    assert_eq!(decoded.reftime(), md.reftime());
}
