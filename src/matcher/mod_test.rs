use super::*;
use crate::metadata::{Metadata, Reftime};
use crate::time::Time;
use crate::types::{Item, Origin};

fn sample() -> Metadata {
    let mut md = Metadata::new();
    md.set(Item::Origin(Origin::Grib1 {
        centre: 200,
        subcentre: 0,
        process: 101,
    }));
    md.set_reftime(Reftime::Position(Time::new(2007, 7, 8, 13, 0, 0)));
    md
}

#[test]
fn test_everything_matches_any_record() {
    assert!(Matcher::everything().matches(&sample()));
}

#[test]
fn test_conjunction_requires_all_clauses() {
    let m = Matcher::parse("origin:GRIB1(200, -, -);reftime:=2007-07-08").unwrap();
    assert!(m.matches(&sample()));

    let m2 = Matcher::parse("origin:GRIB1(201, -, -);reftime:=2007-07-08").unwrap();
    assert!(!m2.matches(&sample()));
}

#[test]
fn test_missing_clause_item_never_matches() {
    let m = Matcher::parse("product:GRIB1(200, 2, 11)").unwrap();
    assert!(!m.matches(&sample()));
}

#[test]
fn test_date_extremes_follows_reftime_clause() {
    let m = Matcher::parse("reftime:>=2007-01-01,<2008-01-01").unwrap();
    let extremes = m.date_extremes().unwrap();
    assert!(extremes.contains(&Time::new(2007, 7, 8, 13, 0, 0)));

    assert!(Matcher::everything().date_extremes().is_none());
}

#[test]
fn test_alias_expansion_before_parse() {
    let aliases = alias::AliasDatabase::from_text("[origin]\nitaly = GRIB1(200, -, -)\n").unwrap();
    let m = Matcher::parse_with_aliases("origin:.italy", &aliases).unwrap();
    assert!(m.matches(&sample()));
}

#[test]
fn test_malformed_clause_is_a_matcher_error() {
    assert!(Matcher::parse("origin").is_err());
    assert!(Matcher::parse("bogus:1").is_err());
}
