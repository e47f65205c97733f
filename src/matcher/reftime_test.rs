use super::*;
use crate::metadata::Reftime;

fn t(y: i32, mo: u32, d: u32) -> Time {
    Time::new(y, mo, d, 0, 0, 0)
}

#[test]
fn test_equality_by_day_matches_whole_day() {
    let m = ReftimeMatch::parse("=2007-07-08").unwrap();
    assert!(m.matches(&Reftime::Position(Time::new(2007, 7, 8, 13, 0, 0))));
    assert!(!m.matches(&Reftime::Position(Time::new(2007, 7, 9, 0, 0, 0))));
}

#[test]
fn test_closed_range_matches_inside_and_rejects_outside() {
    let m = ReftimeMatch::parse(">=2007-01-01,<2008-01-01").unwrap();
    assert!(m.matches(&Reftime::Position(Time::new(2007, 6, 1, 0, 0, 0))));
    assert!(!m.matches(&Reftime::Position(Time::new(2008, 1, 1, 0, 0, 0))));
}

#[test]
fn test_unsatisfiable_range_errors() {
    assert!(ReftimeMatch::parse(">=2008-01-01,<2007-01-01").is_err());
}

#[test]
fn test_alternatives_union_via_or() {
    let m = ReftimeMatch::parse("=2007-01-01 or =2009-01-01").unwrap();
    assert!(m.matches(&Reftime::Position(t(2007, 1, 1))));
    assert!(m.matches(&Reftime::Position(t(2009, 1, 1))));
    assert!(!m.matches(&Reftime::Position(t(2008, 1, 1))));
}
