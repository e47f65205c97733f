use super::*;

#[test]
fn test_fuzzytime_validate_leap_day() {
    assert!(FuzzyTime::new(2024, 2, 29, -1, -1, -1).validate().is_ok());
    let err = FuzzyTime::new(2023, 2, 29, -1, -1, -1)
        .validate()
        .unwrap_err();
    assert_eq!(err.kind(), "Codec");
    assert!(format!("{}", err).contains("day must be between 1 and 28"));
}

#[test]
fn test_fuzzytime_validate_hour_24() {
    assert!(FuzzyTime::new(2024, 2, 1, 24, 0, 0).validate().is_ok());
    let err = FuzzyTime::new(2024, 2, 1, 24, 1, 0).validate().unwrap_err();
    assert!(format!("{}", err).contains("on hour 24, minute must be zero"));
}

#[test]
fn test_fuzzytime_lowering_month() {
    let ft = FuzzyTime::year_month(2024, 7);
    let iv = ft.to_interval();
    assert_eq!(iv.begin, Some(Time::new(2024, 7, 1, 0, 0, 0)));
    assert_eq!(iv.end, Some(Time::new(2024, 8, 1, 0, 0, 0)));
}

#[test]
fn test_fuzzytime_lowering_year_rollover() {
    let ft = FuzzyTime::year_month(2024, 12);
    let iv = ft.to_interval();
    assert_eq!(iv.end, Some(Time::new(2025, 1, 1, 0, 0, 0)));
}

#[test]
fn test_interval_intersect() {
    let a = Interval::new(
        Some(Time::new(2000, 1, 1, 0, 0, 0)),
        Some(Time::new(2010, 1, 1, 0, 0, 0)),
    );
    let b = Interval::new(
        Some(Time::new(2005, 1, 1, 0, 0, 0)),
        Some(Time::new(2015, 1, 1, 0, 0, 0)),
    );
    let got = a.intersect(&b).unwrap();
    assert_eq!(got.begin, Some(Time::new(2005, 1, 1, 0, 0, 0)));
    assert_eq!(got.end, Some(Time::new(2010, 1, 1, 0, 0, 0)));
}

#[test]
fn test_interval_disjoint_open_both() {
    let a = Interval::new(None, Some(Time::new(2000, 1, 1, 0, 0, 0)));
    let b = Interval::new(Some(Time::new(2000, 1, 1, 0, 0, 0)), None);
    assert_eq!(a.intersect(&b), None);
}

#[test]
fn test_interval_extend_self_is_identity() {
    let a = Interval::new(
        Some(Time::new(2000, 1, 1, 0, 0, 0)),
        Some(Time::new(2001, 1, 1, 0, 0, 0)),
    );
    assert_eq!(a.extend(&a), a);
    assert_eq!(a.intersect(&a), Some(a));
}

#[test]
fn test_interval_contains_point() {
    let a = Interval::new(
        Some(Time::new(2000, 1, 1, 0, 0, 0)),
        Some(Time::new(2001, 1, 1, 0, 0, 0)),
    );
    assert!(a.contains(&Time::new(2000, 6, 1, 0, 0, 0)));
    assert!(!a.contains(&Time::new(2001, 1, 1, 0, 0, 0)));
}

#[test]
fn test_spans_one_whole_month() {
    let a = Interval::new(
        Some(Time::new(2000, 1, 15, 0, 0, 0)),
        Some(Time::new(2000, 3, 1, 0, 0, 0)),
    );
    assert!(a.spans_one_whole_month());
    let b = Interval::new(
        Some(Time::new(2000, 1, 15, 0, 0, 0)),
        Some(Time::new(2000, 1, 20, 0, 0, 0)),
    );
    assert!(!b.spans_one_whole_month());

    // Open on the left: any finite end has a complete month before it,
    // even when the end itself falls exactly on a month boundary.
    let c = Interval::new(None, Some(Time::new(2000, 1, 1, 0, 0, 0)));
    assert!(c.spans_one_whole_month());

    // Closed, aligned to a month start, but short of a full month.
    let d = Interval::new(
        Some(Time::new(2000, 1, 1, 0, 0, 0)),
        Some(Time::new(2000, 1, 31, 0, 0, 0)),
    );
    assert!(!d.spans_one_whole_month());

    // Closed, exactly one whole month.
    let e = Interval::new(
        Some(Time::new(2000, 1, 1, 0, 0, 0)),
        Some(Time::new(2000, 2, 1, 0, 0, 0)),
    );
    assert!(e.spans_one_whole_month());
}
