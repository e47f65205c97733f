//! Datasets (spec §4.6-§4.8): a named, configured collection of
//! segments plus an index backend, with a writer for ingest and a
//! reader for queries.

pub mod config;
pub mod reader;
pub mod sorter;
pub mod writer;

pub use config::{Config, Kind, Registry, Step};
pub use reader::{query_bytes, query_data, query_summary};
pub use writer::Writer;
