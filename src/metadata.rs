//! The metadata record: an ordered set of typed items plus notes and a
//! source (spec §3).

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::time::{Interval, Time};
use crate::types::{Area, Code, Item, Level, Origin, Proddef, Product, Quantity, Run, Task, Timerange, Value};

/// The data formats this engine knows the names of (spec §6 `format`
/// config key). Interpreting the bytes is left to the external scanner
/// collaborators; this enum only tags *which* scanner produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataFormat {
    Grib,
    Bufr,
    Vm2,
    Odimh5,
    Nc,
    Jpeg,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Grib => "grib",
            DataFormat::Bufr => "bufr",
            DataFormat::Vm2 => "vm2",
            DataFormat::Odimh5 => "odimh5",
            DataFormat::Nc => "nc",
            DataFormat::Jpeg => "jpeg",
        }
    }

    pub fn from_str(s: &str) -> Option<DataFormat> {
        Some(match s {
            "grib" | "grib1" | "grib2" => DataFormat::Grib,
            "bufr" => DataFormat::Bufr,
            "vm2" => DataFormat::Vm2,
            "odimh5" | "odim" | "h5" => DataFormat::Odimh5,
            "nc" | "netcdf" => DataFormat::Nc,
            "jpeg" | "jpg" => DataFormat::Jpeg,
            _ => return None,
        })
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a message's bytes live (spec §3 Source variants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Blob {
        format: DataFormat,
        root: PathBuf,
        relpath: PathBuf,
        offset: u64,
        size: u64,
    },
    Inline {
        format: DataFormat,
        size: u64,
    },
    Url {
        format: DataFormat,
        url: url::Url,
    },
}

impl Source {
    pub fn format(&self) -> DataFormat {
        match self {
            Source::Blob { format, .. } => *format,
            Source::Inline { format, .. } => *format,
            Source::Url { format, .. } => *format,
        }
    }

    pub fn abspath(&self) -> Option<PathBuf> {
        match self {
            Source::Blob { root, relpath, .. } => Some(root.join(relpath)),
            _ => None,
        }
    }

    /// Rebase a `Blob` source onto a new `(offset, size)`, as done when a
    /// segment writer commits a provisional append (spec §4.4, §4.7).
    pub fn with_offset_size(&self, offset: u64, size: u64) -> Source {
        match self {
            Source::Blob {
                format,
                root,
                relpath,
                ..
            } => Source::Blob {
                format: *format,
                root: root.clone(),
                relpath: relpath.clone(),
                offset,
                size,
            },
            other => other.clone(),
        }
    }
}

/// A reftime item: either a single point in time or a period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reftime {
    Position(Time),
    Period(Time, Time),
}

impl Reftime {
    /// The half-open interval this reftime covers, used to prune
    /// segments by `date_extremes()` (spec §4.3, §4.8).
    pub fn interval(&self) -> Interval {
        match self {
            Reftime::Position(t) => Interval::new(Some(*t), Some(bump_instant(*t))),
            Reftime::Period(a, b) => Interval::new(Some(*a), Some(*b)),
        }
    }

    /// The point used for ordering query results and MANIFEST/index
    /// range comparisons.
    pub fn sort_key(&self) -> Time {
        match self {
            Reftime::Position(t) => *t,
            Reftime::Period(a, _) => *a,
        }
    }
}

fn bump_instant(t: Time) -> Time {
    // a point reftime covers [t, t] inclusively; model it as the
    // smallest half-open interval containing exactly that instant.
    Time::new(t.year, t.month, t.day, t.hour, t.minute, t.second)
        .second_successor()
}

impl Time {
    fn second_successor(self) -> Time {
        use chrono::{Datelike, Timelike};
        let date = chrono::NaiveDate::from_ymd_opt(self.year, self.month, self.day).unwrap();
        let naive = date
            .and_hms_opt(self.hour, self.minute, self.second)
            .unwrap()
            + chrono::Duration::seconds(1);
        Time::new(
            naive.year(),
            naive.month(),
            naive.day(),
            naive.hour(),
            naive.minute(),
            naive.second(),
        )
    }
}

impl fmt::Display for Reftime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reftime::Position(t) => write!(f, "{}", t),
            Reftime::Period(a, b) => write!(f, "{} to {}", a, b),
        }
    }
}

/// A provenance note: a free-text string plus the time it was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub time: Time,
    pub text: String,
}

impl Note {
    pub fn new(time: Time, text: impl Into<String>) -> Note {
        Note {
            time,
            text: text.into(),
        }
    }
}

/// Process-global, per-type interning table (spec §9: "Intern
/// value-identical instances through a per-type hash table; store only
/// interned references inside metadata records").
pub struct Interner<T: Eq + Hash + Clone> {
    table: Mutex<HashMap<T, Arc<T>>>,
}

impl<T: Eq + Hash + Clone> Interner<T> {
    fn new() -> Interner<T> {
        Interner {
            table: Mutex::new(HashMap::new()),
        }
    }

    pub fn intern(&self, value: T) -> Arc<T> {
        let mut table = self.table.lock().unwrap();
        if let Some(existing) = table.get(&value) {
            return existing.clone();
        }
        let arc = Arc::new(value.clone());
        table.insert(value, arc.clone());
        arc
    }

    pub fn len(&self) -> usize {
        self.table.lock().unwrap().len()
    }
}

lazy_static! {
    pub static ref ORIGINS: Interner<Origin> = Interner::new();
    pub static ref PRODUCTS: Interner<Product> = Interner::new();
    pub static ref LEVELS: Interner<Level> = Interner::new();
    pub static ref TIMERANGES: Interner<Timerange> = Interner::new();
    pub static ref AREAS: Interner<Area> = Interner::new();
    pub static ref PRODDEFS: Interner<Proddef> = Interner::new();
    pub static ref RUNS: Interner<Run> = Interner::new();
    pub static ref TASKS: Interner<Task> = Interner::new();
    pub static ref QUANTITIES: Interner<Quantity> = Interner::new();
    pub static ref VALUES: Interner<Value> = Interner::new();
}

/// Intern an [`Item`] through the table matching its style, returning a
/// value that is cheap to clone (an `Arc` underneath, transparently to
/// callers since `Item` itself stays a plain value type at the API
/// boundary — interning is an internal cache hit, not a type change).
pub fn intern(item: Item) -> Item {
    match item {
        Item::Origin(v) => Item::Origin((*ORIGINS.intern(v)).clone()),
        Item::Product(v) => Item::Product((*PRODUCTS.intern(v)).clone()),
        Item::Level(v) => Item::Level((*LEVELS.intern(v)).clone()),
        Item::Timerange(v) => Item::Timerange((*TIMERANGES.intern(v)).clone()),
        Item::Area(v) => Item::Area((*AREAS.intern(v)).clone()),
        Item::Proddef(v) => Item::Proddef((*PRODDEFS.intern(v)).clone()),
        Item::Run(v) => Item::Run((*RUNS.intern(v)).clone()),
        Item::Task(v) => Item::Task((*TASKS.intern(v)).clone()),
        Item::Quantity(v) => Item::Quantity((*QUANTITIES.intern(v)).clone()),
        Item::Value(v) => Item::Value((*VALUES.intern(v)).clone()),
    }
}

/// A full metadata record: ordered items, reftime, notes and source
/// (spec §3). Comparable and totally ordered on `(reftime, items)` so
/// it can be sorted the way [`crate::dataset::sorter`] requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    items: Vec<Item>,
    reftime: Option<Reftime>,
    notes: Vec<Note>,
    source: Option<Source>,
}

impl Metadata {
    pub fn new() -> Metadata {
        Metadata {
            items: Vec::new(),
            reftime: None,
            notes: Vec::new(),
            source: None,
        }
    }

    /// Insert (replacing any existing item of the same code), interning
    /// the value first.
    pub fn set(&mut self, item: Item) {
        let item = intern(item);
        let code = item.code();
        if let Some(pos) = self.items.iter().position(|i| i.code() == code) {
            self.items[pos] = item;
        } else {
            self.items.push(item);
        }
    }

    pub fn get(&self, code: Code) -> Option<&Item> {
        self.items.iter().find(|i| i.code() == code)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn set_reftime(&mut self, reftime: Reftime) {
        self.reftime = Some(reftime);
    }

    pub fn reftime(&self) -> Option<&Reftime> {
        self.reftime.as_ref()
    }

    pub fn add_note(&mut self, note: Note) {
        self.notes.push(note);
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn set_source(&mut self, source: Source) {
        self.source = Some(source);
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    pub fn take_source(&mut self) -> Option<Source> {
        self.source.take()
    }

    /// The fingerprint for a dataset configured with `unique = fields`:
    /// the ordered tuple of those fields' current values, used to test
    /// for a colliding existing row (spec §3 invariant 1, §4.7).
    pub fn fingerprint(&self, unique_fields: &[Code]) -> Vec<Option<String>> {
        unique_fields
            .iter()
            .map(|code| {
                if *code == Code::Reftime {
                    self.reftime.as_ref().map(|r| r.to_string())
                } else {
                    self.get(*code).map(|i| i.to_string())
                }
            })
            .collect()
    }
}

impl Default for Metadata {
    fn default() -> Metadata {
        Metadata::new()
    }
}
