use super::*;
use crate::metadata::Reftime;
use crate::types::Origin;

fn md_with_origin(centre: u8, year: i32) -> Metadata {
    let mut md = Metadata::new();
    md.set(Item::Origin(Origin::Grib1 {
        centre,
        subcentre: 0,
        process: 101,
    }));
    md.set_reftime(Reftime::Position(Time::new(year, 1, 1, 0, 0, 0)));
    md
}

#[test]
fn test_add_merges_same_combination() {
    let mut summary = Summary::new();
    summary.add(&md_with_origin(200, 2020), 100);
    summary.add(&md_with_origin(200, 2021), 50);
    assert_eq!(summary.entries().len(), 1);
    assert_eq!(summary.count(), 2);
    assert_eq!(summary.size(), 150);
}

#[test]
fn test_add_distinct_combinations_stay_separate() {
    let mut summary = Summary::new();
    summary.add(&md_with_origin(200, 2020), 100);
    summary.add(&md_with_origin(201, 2020), 100);
    assert_eq!(summary.entries().len(), 2);
}

#[test]
fn test_date_extremes_spans_all_entries() {
    let mut summary = Summary::new();
    summary.add(&md_with_origin(200, 2020), 100);
    summary.add(&md_with_origin(201, 2022), 100);
    let extremes = summary.date_extremes().unwrap();
    assert_eq!(extremes.begin.unwrap().year, 2020);
}

#[test]
fn test_encode_decode_roundtrip() {
    let mut summary = Summary::new();
    summary.add(&md_with_origin(200, 2020), 100);
    summary.add(&md_with_origin(201, 2020), 250);
    let encoded = summary.encode();
    let decoded = Summary::decode(&encoded).unwrap();
    assert_eq!(decoded.count(), summary.count());
    assert_eq!(decoded.size(), summary.size());
    assert_eq!(decoded.entries().len(), 2);
}

#[test]
fn test_filter_keeps_matching_entries_only() {
    let mut summary = Summary::new();
    summary.add(&md_with_origin(200, 2020), 100);
    summary.add(&md_with_origin(201, 2020), 100);
    let filtered = summary.filter(|items| {
        items
            .iter()
            .any(|i| matches!(i, Item::Origin(Origin::Grib1 { centre: 200, .. })))
    });
    assert_eq!(filtered.entries().len(), 1);
}
