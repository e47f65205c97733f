//! The `simple` dataset's MANIFEST (spec §4.6, §6): one line per
//! segment, `file;mtime;start_time;end_time`, sorted descending by
//! filename. A SQLite-backed variant is auto-detected when
//! `index.sqlite` exists at the dataset root instead of a `MANIFEST`
//! text file, following the same dual-backend idea as `ondisk2` but
//! keyed on presence of a file rather than a config key, since the
//! `simple` dataset type has no index to speak of (spec §4.6: "the
//! MANIFEST is not a uniqueness index, only an ordered segment list").

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::err_at;
use crate::error::Result;
use crate::time::{Interval, Time};
use crate::util;

/// One MANIFEST line: a segment's relpath, its mtime at last rewrite,
/// and the reftime range of the records it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub file: String,
    pub mtime: i64,
    pub start_time: Time,
    pub end_time: Time,
}

impl Entry {
    pub fn interval(&self) -> Interval {
        Interval::new(Some(self.start_time), Some(self.end_time))
    }
}

enum Backend {
    Text(PathBuf),
    Sqlite(Connection),
}

pub struct Manifest {
    root: PathBuf,
    backend: Backend,
    entries: BTreeMap<String, Entry>,
}

impl Manifest {
    /// Open (or create) the MANIFEST at `root`, auto-detecting the
    /// SQLite variant by the presence of `root/index.sqlite`.
    pub fn open(root: &Path) -> Result<Manifest> {
        let sqlite_path = root.join("index.sqlite");
        if sqlite_path.exists() {
            Self::open_sqlite(root, &sqlite_path)
        } else {
            Self::open_text(root)
        }
    }

    fn open_text(root: &Path) -> Result<Manifest> {
        let path = root.join("MANIFEST");
        let mut entries = BTreeMap::new();
        if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let parts: Vec<&str> = line.split(';').collect();
                if parts.len() != 4 {
                    return err_at!(IndexCorrupt, "MANIFEST: malformed line {:?}", line);
                }
                let mtime: i64 = parts[1]
                    .parse()
                    .map_err(|_| crate::error::Error::IndexCorrupt(format!("MANIFEST: bad mtime {:?}", parts[1])))?;
                let entry = Entry {
                    file: parts[0].to_string(),
                    mtime,
                    start_time: parse_time(parts[2])?,
                    end_time: parse_time(parts[3])?,
                };
                entries.insert(entry.file.clone(), entry);
            }
        }
        Ok(Manifest {
            root: root.to_path_buf(),
            backend: Backend::Text(path),
            entries,
        })
    }

    fn open_sqlite(root: &Path, sqlite_path: &Path) -> Result<Manifest> {
        let conn = Connection::open(sqlite_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS files (\
                file TEXT PRIMARY KEY, \
                mtime INTEGER NOT NULL, \
                start_time TEXT NOT NULL, \
                end_time TEXT NOT NULL)",
            [],
        )?;
        let mut entries = BTreeMap::new();
        {
            let mut stmt = conn.prepare("SELECT file, mtime, start_time, end_time FROM files")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            for row in rows {
                let (file, mtime, start, end) = row?;
                let entry = Entry {
                    file: file.clone(),
                    mtime,
                    start_time: parse_time(&start)?,
                    end_time: parse_time(&end)?,
                };
                entries.insert(file, entry);
            }
        }
        Ok(Manifest {
            root: root.to_path_buf(),
            backend: Backend::Sqlite(conn),
            entries,
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Segments whose reftime range intersects `interval` (spec §4.8
    /// candidate enumeration for `simple` datasets).
    pub fn candidates(&self, interval: &Interval) -> Vec<&Entry> {
        self.entries
            .values()
            .filter(|e| e.interval().intersects(interval))
            .collect()
    }

    pub fn upsert(&mut self, entry: Entry) {
        self.entries.insert(entry.file.clone(), entry);
    }

    pub fn remove(&mut self, file: &str) {
        self.entries.remove(file);
    }

    pub fn get(&self, file: &str) -> Option<&Entry> {
        self.entries.get(file)
    }

    pub fn save(&mut self) -> Result<()> {
        match &mut self.backend {
            Backend::Text(path) => {
                let mut names: Vec<&String> = self.entries.keys().collect();
                names.sort_by(|a, b| b.cmp(a));
                let mut text = String::new();
                for name in names {
                    let e = &self.entries[name];
                    text.push_str(&format!("{};{};{};{}\n", e.file, e.mtime, e.start_time, e.end_time));
                }
                util::atomic_rewrite(path, text.as_bytes())
            }
            Backend::Sqlite(conn) => {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM files", [])?;
                for entry in self.entries.values() {
                    tx.execute(
                        "INSERT INTO files (file, mtime, start_time, end_time) VALUES (?, ?, ?, ?)",
                        rusqlite::params![
                            entry.file,
                            entry.mtime,
                            entry.start_time.to_string(),
                            entry.end_time.to_string()
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Parse the `"YYYY-MM-DDTHH:MM:SSZ"` format `Time::Display` produces
/// (spec §4.2: this is the same lexicographically-sortable string the
/// `ondisk2` `reftime` column stores).
fn parse_time(s: &str) -> Result<Time> {
    let s = s.strip_suffix('Z').unwrap_or(s);
    let (date, time) = s
        .split_once('T')
        .ok_or_else(|| crate::error::Error::IndexCorrupt(format!("bad time {:?}", s)))?;
    let date_parts: Vec<&str> = date.split('-').collect();
    let time_parts: Vec<&str> = time.split(':').collect();
    if date_parts.len() != 3 || time_parts.len() != 3 {
        return err_at!(IndexCorrupt, "bad time {:?}", s);
    }
    let field = |s: &str| -> Result<i32> {
        s.parse()
            .map_err(|_| crate::error::Error::IndexCorrupt(format!("bad time field {:?}", s)))
    };
    Ok(Time::new(
        field(date_parts[0])?,
        field(date_parts[1])? as u32,
        field(date_parts[2])? as u32,
        field(time_parts[0])? as u32,
        field(time_parts[1])? as u32,
        field(time_parts[2])? as u32,
    ))
}

#[path = "manifest_test.rs"]
#[cfg(test)]
mod manifest_test;
