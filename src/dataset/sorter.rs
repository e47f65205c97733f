//! Query result ordering (spec §4.8): `period:order`, where `period`
//! buckets records into windows that get sorted independently (so a
//! query over years of data doesn't need one global sort), and `order`
//! is a comma list of `[-]field` sort keys.

use crate::metadata::Metadata;
use crate::time::Time;
use crate::types::Code;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    /// No period given: the caller flushes manually at the end of each
    /// segment (spec §4.8 "or end of segment when no period is given").
    None,
}

impl Period {
    fn parse(s: &str) -> Option<Period> {
        Some(match s {
            "" => Period::None,
            "year" => Period::Year,
            "month" => Period::Month,
            "day" => Period::Day,
            "hour" => Period::Hour,
            "minute" => Period::Minute,
            _ => return None,
        })
    }

    fn key_of(&self, t: &Time) -> (i32, u32, u32, u32, u32) {
        match self {
            Period::Year => (t.year, 0, 0, 0, 0),
            Period::Month => (t.year, t.month, 0, 0, 0),
            Period::Day => (t.year, t.month, t.day, 0, 0),
            Period::Hour => (t.year, t.month, t.day, t.hour, 0),
            Period::Minute => (t.year, t.month, t.day, t.hour, t.minute),
            Period::None => (0, 0, 0, 0, 0),
        }
    }
}

/// One `[-]field` sort key (`-` prefix means descending).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SortKey {
    code: Code,
    descending: bool,
}

/// Stable windowed sort over a query's result stream (spec §4.8).
pub struct Sorter {
    period: Period,
    keys: Vec<SortKey>,
    window_key: Option<(i32, u32, u32, u32, u32)>,
    buffer: Vec<Metadata>,
}

impl Sorter {
    /// Parse a `period:order` expression, e.g. `"month:-reftime,origin"`,
    /// or an empty string for "no bucketing, natural order".
    pub fn parse(expr: &str) -> crate::error::Result<Sorter> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(Sorter {
                period: Period::None,
                keys: Vec::new(),
                window_key: None,
                buffer: Vec::new(),
            });
        }
        let (period_str, order_str) = expr.split_once(':').unwrap_or((expr, ""));
        let period = Period::parse(period_str.trim())
            .ok_or_else(|| crate::error::Error::Config(format!("unknown sort period {:?}", period_str)))?;
        let mut keys = Vec::new();
        for field in order_str.split(',') {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            let (descending, name) = match field.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, field),
            };
            let code = Code::from_name(name)
                .ok_or_else(|| crate::error::Error::Config(format!("unknown sort field {:?}", name)))?;
            keys.push(SortKey { code, descending });
        }
        Ok(Sorter {
            period,
            keys,
            window_key: None,
            buffer: Vec::new(),
        })
    }

    pub fn period_is_none(&self) -> bool {
        self.period == Period::None
    }

    /// Push one record into the current window; returns the previous
    /// window's records, sorted, if this record starts a new one.
    pub fn push(&mut self, md: Metadata) -> Vec<Metadata> {
        let point = md
            .reftime()
            .map(|r| r.sort_key())
            .unwrap_or(Time::UNDEFINED);
        let key = self.period.key_of(&point);
        let flushed = match self.window_key {
            Some(prev) if prev != key && self.period != Period::None => self.flush_buffer(),
            _ => Vec::new(),
        };
        self.window_key = Some(key);
        self.buffer.push(md);
        flushed
    }

    /// Flush and sort whatever is buffered; called once at the very end
    /// of a query.
    pub fn finish(&mut self) -> Vec<Metadata> {
        self.flush_buffer()
    }

    /// Force-flush at a segment boundary. A no-op unless there is no
    /// period to bucket by: spec §4.8's sort-break condition is "same
    /// day/month/hour depending on sort period, or end of segment when
    /// no period is given", so a period-bucketed sort keeps buffering
    /// across segment boundaries (its window may span several), while
    /// `Period::None` must flush here since `push`'s own `prev != key`
    /// check can never fire (its `key_of` is a constant).
    pub fn flush_segment_boundary(&mut self) -> Vec<Metadata> {
        if self.period_is_none() {
            self.flush_buffer()
        } else {
            Vec::new()
        }
    }

    fn flush_buffer(&mut self) -> Vec<Metadata> {
        let mut items = std::mem::take(&mut self.buffer);
        let keys = self.keys.clone();
        items.sort_by(|a, b| compare(a, b, &keys));
        items
    }
}

fn field_string(md: &Metadata, code: Code) -> Option<String> {
    if code == Code::Reftime {
        md.reftime().map(|r| r.sort_key().to_string())
    } else {
        md.get(code).map(|i| i.to_string())
    }
}

fn compare(a: &Metadata, b: &Metadata, keys: &[SortKey]) -> std::cmp::Ordering {
    for key in keys {
        let av = field_string(a, key.code);
        let bv = field_string(b, key.code);
        let ord = av.cmp(&bv);
        if ord != std::cmp::Ordering::Equal {
            return if key.descending { ord.reverse() } else { ord };
        }
    }
    std::cmp::Ordering::Equal
}

#[path = "sorter_test.rs"]
#[cfg(test)]
mod sorter_test;
