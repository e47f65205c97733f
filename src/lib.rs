//! A dataset storage engine for archives of self-describing scientific
//! data messages (GRIB, BUFR, ODIMH5 and similar formats).
//!
//! A dataset is a named, configured collection of segments (on-disk
//! message containers) plus an index backend: `ondisk2` drives a SQL
//! uniqueness index, `simple` drives an ordered MANIFEST with no
//! uniqueness guarantee at all. Metadata describing each message
//! (origin, product, reftime, ...) is interned, encoded through one of
//! three interchangeable codecs (binary, Yaml-like text, JSON-ish
//! structured), and queried through a `Matcher` expression language.
//! A `Dispatcher` routes incoming records across a registry of
//! datasets by matcher; `maintenance` classifies and repairs the
//! segments a dataset already has on disk.
//!
//! Interpreting message bytes themselves (GRIB/BUFR/... decoding) is
//! deliberately out of scope: this crate stores and indexes opaque
//! byte ranges, and delegates format-specific scanning to a
//! [`scanner::Scanner`] registered from outside it.

pub mod codec;
pub mod dataset;
pub mod dispatch;
pub mod error;
pub mod file_lock;
pub mod index;
pub mod maintenance;
pub mod matcher;
pub mod metadata;
pub mod reader_pool;
pub mod scanner;
pub mod segment;
pub mod summary;
pub mod time;
pub mod types;
pub(crate) mod util;

pub use crate::dataset::{Config as DatasetConfig, Registry as DatasetRegistry};
pub use crate::dispatch::{Dispatcher, Outcome, Route};
pub use crate::error::{Error, Result};
pub use crate::matcher::Matcher;
pub use crate::metadata::{DataFormat, Metadata, Note, Reftime, Source};
pub use crate::summary::{Entry as SummaryEntry, Summary};
pub use crate::time::{FuzzyTime, Interval, Time};
pub use crate::types::{Code, Item};
