use super::*;
use crate::types::Product;

#[test]
fn test_product_wildcard_subtype() {
    let m = GenericMatch::parse(Code::Product, "GRIB1(200, -, -)").unwrap();
    assert!(m.matches(&Item::Product(Product::Grib1 {
        origin: 200,
        table: 2,
        product: 11,
    })));
    assert!(!m.matches(&Item::Product(Product::Grib1 {
        origin: 201,
        table: 2,
        product: 11,
    })));
}

#[test]
fn test_area_keyed_subset_match() {
    let mut have = std::collections::BTreeMap::new();
    have.insert("Lon".to_string(), "11".to_string());
    have.insert("Lat".to_string(), "44".to_string());
    let m = GenericMatch::parse(Code::Area, "GRIB(Lon=11)").unwrap();
    assert!(m.matches(&Item::Area(Area::Grib(have))));
}

#[test]
fn test_task_wildcard_matches_anything() {
    let m = GenericMatch::parse(Code::Task, "-").unwrap();
    assert!(m.matches(&Item::Task(Task("whatever".into()))));
}

#[test]
fn test_quantity_requires_subset_presence() {
    let m = GenericMatch::parse(Code::Quantity, "t,td").unwrap();
    assert!(m.matches(&Item::Quantity(crate::types::Quantity(vec![
        "t".into(),
        "td".into(),
        "u".into()
    ]))));
    assert!(!m.matches(&Item::Quantity(crate::types::Quantity(vec!["t".into()]))));
}
