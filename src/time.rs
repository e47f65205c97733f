//! Point, partial ("fuzzy") and interval time algebra (spec §3, §4.2).
//!
//! `Time` is always a fully-specified six-field point, with the all-zero
//! value reserved to mean "now/undefined" the way arkimet's C++
//! `Time::is_vague()` sentinel does. `FuzzyTime` carries `-1` in any
//! trailing field left unspecified, and lowers to a half-open
//! `[lower, upper)` `Interval`.

use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::err_at;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Time {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Time {
    pub const UNDEFINED: Time = Time {
        year: 0,
        month: 0,
        day: 0,
        hour: 0,
        minute: 0,
        second: 0,
    };

    pub fn new(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Time {
        Time {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    pub fn is_undefined(&self) -> bool {
        *self == Time::UNDEFINED
    }

    /// The tick immediately after this point: used to derive the
    /// exclusive upper bound of a `FuzzyTime`'s lowering when the
    /// trailing wildcard starts at a coarser unit than "second".
    fn next_month(&self) -> Time {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        Time::new(year, month, 1, 0, 0, 0)
    }

    fn next_day(&self) -> Time {
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .unwrap()
            .succ_opt()
            .unwrap();
        Time::new(date.year(), date.month(), date.day(), 0, 0, 0)
    }

    fn next_hour(&self) -> Time {
        bump(*self, 1, 0, 0)
    }

    fn next_minute(&self) -> Time {
        bump(*self, 0, 1, 0)
    }

    fn next_second(&self) -> Time {
        bump(*self, 0, 0, 1)
    }
}

fn bump(t: Time, hours: i64, minutes: i64, seconds: i64) -> Time {
    let date = NaiveDate::from_ymd_opt(t.year, t.month, t.day).unwrap();
    let naive = date
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .checked_add_signed(chrono::Duration::hours(t.hour as i64))
        .unwrap()
        .checked_add_signed(chrono::Duration::minutes(t.minute as i64))
        .unwrap()
        .checked_add_signed(chrono::Duration::seconds(t.second as i64))
        .unwrap()
        .checked_add_signed(chrono::Duration::hours(hours))
        .unwrap()
        .checked_add_signed(chrono::Duration::minutes(minutes))
        .unwrap()
        .checked_add_signed(chrono::Duration::seconds(seconds))
        .unwrap();
    Time::new(
        naive.year(),
        naive.month(),
        naive.day(),
        naive.hour(),
        naive.minute(),
        naive.second(),
    )
}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Time) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Time) -> Ordering {
        (self.year, self.month, self.day, self.hour, self.minute, self.second).cmp(&(
            other.year,
            other.month,
            other.day,
            other.hour,
            other.minute,
            other.second,
        ))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// A partial time: any trailing field may be `-1` ("any"); once a field
/// is `-1` all following fields are assumed `-1` too (mirrors the C++
/// `FuzzyTime` comment verbatim).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuzzyTime {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    pub minute: i32,
    pub second: i32,
}

impl FuzzyTime {
    pub fn new(year: i32, month: i32, day: i32, hour: i32, minute: i32, second: i32) -> FuzzyTime {
        FuzzyTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    pub fn year(year: i32) -> FuzzyTime {
        FuzzyTime::new(year, -1, -1, -1, -1, -1)
    }

    pub fn year_month(year: i32, month: i32) -> FuzzyTime {
        FuzzyTime::new(year, month, -1, -1, -1, -1)
    }

    fn is_leap_year(year: i32) -> bool {
        (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
    }

    fn days_in_month(year: i32, month: i32) -> u32 {
        match month {
            1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
            4 | 6 | 9 | 11 => 30,
            2 if Self::is_leap_year(year) => 29,
            2 => 28,
            _ => unreachable!(),
        }
    }

    /// Validate field ranges per spec §4.2 / §8 scenario 6.
    pub fn validate(&self) -> Result<()> {
        if self.month == -1 {
            return Ok(());
        }
        if !(1..=12).contains(&self.month) {
            return err_at!(Codec, "month must be between 1 and 12");
        }
        if self.day == -1 {
            return Ok(());
        }
        let max_day = Self::days_in_month(self.year, self.month);
        if !(1..=max_day as i32).contains(&self.day) {
            return err_at!(Codec, "day must be between 1 and {}", max_day);
        }
        if self.hour == -1 {
            return Ok(());
        }
        if !(0..=24).contains(&self.hour) {
            return err_at!(Codec, "hour must be between 0 and 24");
        }
        if self.hour == 24 {
            if self.minute != -1 && self.minute != 0 {
                return err_at!(Codec, "on hour 24, minute must be zero");
            }
            if self.second != -1 && self.second != 0 {
                return err_at!(Codec, "on hour 24, second must be zero");
            }
            return Ok(());
        }
        if self.minute == -1 {
            return Ok(());
        }
        if !(0..=59).contains(&self.minute) {
            return err_at!(Codec, "minute must be between 0 and 59");
        }
        if self.second == -1 {
            return Ok(());
        }
        // leap second: 60 is allowed.
        if !(0..=60).contains(&self.second) {
            return err_at!(Codec, "second must be between 0 and 60");
        }
        Ok(())
    }

    pub fn lowerbound(&self) -> Time {
        Time::new(
            self.year,
            if self.month == -1 { 1 } else { self.month as u32 },
            if self.day == -1 { 1 } else { self.day as u32 },
            if self.hour == -1 { 0 } else { self.hour as u32 },
            if self.minute == -1 { 0 } else { self.minute as u32 },
            if self.second == -1 { 0 } else { self.second as u32 },
        )
    }

    /// Exclusive upper bound: the lower bound ticked forward by one unit
    /// of the coarsest wildcard field.
    pub fn upperbound(&self) -> Time {
        let lower = self.lowerbound();
        if self.month == -1 {
            Time::new(self.year + 1, 1, 1, 0, 0, 0)
        } else if self.day == -1 {
            lower.next_month()
        } else if self.hour == -1 {
            lower.next_day()
        } else if self.minute == -1 {
            lower.next_hour()
        } else if self.second == -1 {
            lower.next_minute()
        } else {
            lower.next_second()
        }
    }

    pub fn to_interval(&self) -> Interval {
        Interval::new(Some(self.lowerbound()), Some(self.upperbound()))
    }
}

impl fmt::Display for FuzzyTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fmt_field = |v: i32, width: usize| -> String {
            if v == -1 {
                "-".repeat(width)
            } else {
                format!("{:0width$}", v, width = width)
            }
        };
        write!(
            f,
            "{}-{}-{} {}:{}:{}",
            fmt_field(self.year, 4),
            fmt_field(self.month, 2),
            fmt_field(self.day, 2),
            fmt_field(self.hour, 2),
            fmt_field(self.minute, 2),
            fmt_field(self.second, 2),
        )
    }
}

/// Half-open `[begin, end)` interval; either bound may be absent (open).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub begin: Option<Time>,
    pub end: Option<Time>,
}

impl Interval {
    pub fn new(begin: Option<Time>, end: Option<Time>) -> Interval {
        Interval { begin, end }
    }

    pub fn unbounded() -> Interval {
        Interval::new(None, None)
    }

    pub fn contains(&self, point: &Time) -> bool {
        let lower_ok = self.begin.map_or(true, |b| b <= *point);
        let upper_ok = self.end.map_or(true, |e| *point < e);
        lower_ok && upper_ok
    }

    /// `this.contains(other)`: `begin<=other.begin` and either `this.end`
    /// is absent, or `other.end` is present and `other.end<=this.end`.
    pub fn contains_interval(&self, other: &Interval) -> bool {
        let lower_ok = match (self.begin, other.begin) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(b), Some(ob)) => b <= ob,
        };
        let upper_ok = match self.end {
            None => true,
            Some(e) => match other.end {
                Some(oe) => oe <= e,
                None => false,
            },
        };
        lower_ok && upper_ok
    }

    pub fn intersects(&self, other: &Interval) -> bool {
        let left_disjoint = match (self.end, other.begin) {
            (Some(e), Some(ob)) => e <= ob,
            _ => false,
        };
        let right_disjoint = match (other.end, self.begin) {
            (Some(oe), Some(b)) => oe <= b,
            _ => false,
        };
        !left_disjoint && !right_disjoint
    }

    /// Half-open intersection, or `None` if disjoint. `self` is left
    /// untouched on disjoint so the caller can tell the two apart.
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        if !self.intersects(other) {
            return None;
        }
        let begin = match (self.begin, other.begin) {
            (None, b) => b,
            (b, None) => b,
            (Some(a), Some(b)) => Some(a.max(b)),
        };
        let end = match (self.end, other.end) {
            (None, e) => e,
            (e, None) => e,
            (Some(a), Some(b)) => Some(a.min(b)),
        };
        Some(Interval::new(begin, end))
    }

    /// The smallest interval containing both; fully open on a side if
    /// either input is open on that side.
    pub fn extend(&self, other: &Interval) -> Interval {
        let begin = match (self.begin, other.begin) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        };
        let end = match (self.end, other.end) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        Interval::new(begin, end)
    }

    /// True iff this interval, possibly open on either side, contains at
    /// least one calendar month boundary (the first instant of some
    /// month).
    pub fn spans_one_whole_month(&self) -> bool {
        match (self.begin, self.end) {
            (None, None) => true,
            // Open on the left: any finite `e` has a complete month
            // somewhere before it (however far back).
            (None, Some(_)) => true,
            (Some(_), None) => true,
            (Some(b), Some(e)) => {
                let candidate = if b.day == 1 && b.hour == 0 && b.minute == 0 && b.second == 0 {
                    b
                } else {
                    b.next_month()
                };
                candidate.next_month() <= e
            }
        }
    }
}
