//! The `reftime:` clause (spec §4.3): closed/open date/time intervals,
//! equality-by-day, and relative expressions (`>=today - 3d`) resolved
//! against wall-clock "today" at parse time.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::codec::text::parse_time;
use crate::err_at;
use crate::error::{Error, Result};
use crate::metadata::Reftime;
use crate::time::{Interval, Time};

lazy_static! {
    // "today", "yesterday", "tomorrow", optionally followed by "+"/"-" N
    // and a unit letter (d=days, h=hours, m=minutes).
    static ref RELATIVE_RE: Regex =
        Regex::new(r"^(today|yesterday|tomorrow)(?:\s*([+-])\s*(\d+)([dhm]))?$").unwrap();
    static ref DAY_RE: Regex = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap();
}

/// Resolve the calendar day `now` is in, in UTC, as a [`Time`] midnight
/// instant. Extracted so tests can fix the reference point.
fn today_midnight() -> Time {
    use chrono::{Datelike, Utc};
    let now = Utc::now();
    Time::new(now.year(), now.month(), now.day(), 0, 0, 0)
}

fn resolve_instant(expr: &str, now: Time) -> Result<Time> {
    let expr = expr.trim();
    if let Some(caps) = RELATIVE_RE.captures(expr) {
        let base = match &caps[1] {
            "today" => now,
            "yesterday" => shift_days(now, -1),
            "tomorrow" => shift_days(now, 1),
            _ => unreachable!(),
        };
        if let (Some(sign), Some(amount), Some(unit)) = (caps.get(2), caps.get(3), caps.get(4)) {
            let n: i64 = amount.as_str().parse().unwrap_or(0);
            let n = if sign.as_str() == "-" { -n } else { n };
            return Ok(match unit.as_str() {
                "d" => shift_days(base, n),
                "h" => shift_seconds(base, n * 3600),
                "m" => shift_seconds(base, n * 60),
                _ => unreachable!(),
            });
        }
        return Ok(base);
    }
    if let Some(caps) = DAY_RE.captures(expr) {
        return Ok(Time::new(
            caps[1].parse().unwrap(),
            caps[2].parse().unwrap(),
            caps[3].parse().unwrap(),
            0,
            0,
            0,
        ));
    }
    parse_time(expr)
}

fn shift_days(t: Time, days: i64) -> Time {
    use chrono::Datelike;
    let date = chrono::NaiveDate::from_ymd_opt(t.year, t.month, t.day).unwrap()
        + chrono::Duration::days(days);
    Time::new(date.year(), date.month(), date.day(), t.hour, t.minute, t.second)
}

fn shift_seconds(t: Time, secs: i64) -> Time {
    use chrono::{Datelike, Timelike};
    let naive = chrono::NaiveDate::from_ymd_opt(t.year, t.month, t.day)
        .unwrap()
        .and_hms_opt(t.hour, t.minute, t.second)
        .unwrap()
        + chrono::Duration::seconds(secs);
    Time::new(
        naive.year(),
        naive.month(),
        naive.day(),
        naive.hour(),
        naive.minute(),
        naive.second(),
    )
}

fn day_interval(day: Time) -> Interval {
    let end = shift_days(day, 1);
    Interval::new(Some(day), Some(end))
}

fn next_second(t: Time) -> Time {
    shift_seconds(t, 1)
}

/// Parse one comma-separated comparator list (e.g. `>=today - 3d,
/// <today`) into the half-open interval it denotes, intersecting each
/// successive comparator.
fn parse_interval(expr: &str, now: Time) -> Result<Interval> {
    let mut interval = Interval::unbounded();
    for term in expr.split(',') {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        let clause = if let Some(rest) = term.strip_prefix(">=") {
            Interval::new(Some(resolve_instant(rest, now)?), None)
        } else if let Some(rest) = term.strip_prefix("<=") {
            Interval::new(None, Some(next_second(resolve_instant(rest, now)?)))
        } else if let Some(rest) = term.strip_prefix('>') {
            Interval::new(Some(next_second(resolve_instant(rest, now)?)), None)
        } else if let Some(rest) = term.strip_prefix('<') {
            Interval::new(None, Some(resolve_instant(rest, now)?))
        } else if let Some(rest) = term.strip_prefix('=') {
            day_interval(resolve_instant(rest, now)?)
        } else {
            return err_at!(Matcher, "unrecognized reftime comparator {:?}", term);
        };
        interval = interval
            .intersect(&clause)
            .ok_or_else(|| Error::Matcher(format!("reftime clause {:?} is never satisfiable", expr)))?;
    }
    Ok(interval)
}

/// A parsed `reftime:` clause: a union (`or`-separated) of comparator
/// intervals, each evaluated against "now" at parse time.
#[derive(Debug, Clone)]
pub struct ReftimeMatch {
    text: String,
    alternatives: Vec<Interval>,
}

impl ReftimeMatch {
    pub fn parse(expr: &str) -> Result<ReftimeMatch> {
        let now = today_midnight();
        let alternatives = expr
            .split(" or ")
            .map(|alt| parse_interval(alt.trim(), now))
            .collect::<Result<Vec<_>>>()?;
        Ok(ReftimeMatch {
            text: expr.to_string(),
            alternatives,
        })
    }

    pub fn matches(&self, reftime: &Reftime) -> bool {
        let target = reftime.interval();
        self.alternatives.iter().any(|iv| iv.intersects(&target))
    }

    /// The smallest interval containing every alternative, used to
    /// prune segments before opening them (spec §4.3 `date_extremes`).
    pub fn interval(&self) -> Interval {
        let mut iter = self.alternatives.iter();
        let first = match iter.next() {
            Some(i) => *i,
            None => return Interval::unbounded(),
        };
        iter.fold(first, |acc, i| acc.extend(i))
    }
}

impl fmt::Display for ReftimeMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[path = "reftime_test.rs"]
#[cfg(test)]
mod reftime_test;
