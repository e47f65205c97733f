//! The `ondisk2` SQL index (spec §4.6, §6): one `rusqlite` connection
//! per dataset writer/reader, one row per record, plus an in-memory
//! fingerprint cache so most duplicate checks never touch SQL.
//!
//! Only the reftime range is pushed down into a `WHERE` clause (via
//! [`Matcher::date_extremes`]); every other clause type is evaluated by
//! decoding the stored metadata blob and calling
//! [`Matcher::matches`], since `Matcher`'s per-code clauses aren't
//! publicly enumerable. See DESIGN.md for the tradeoff.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::{params_from_iter, Connection, OpenFlags};

use crate::codec::binary::{decode_metadata, encode_metadata};
use crate::error::Result;
use crate::matcher::Matcher;
use crate::metadata::Metadata;
use crate::types::{Code, Item, Value};

/// A denormalized read-only cache of a record's notes, kept as its own
/// column so a note can be appended without decoding/re-encoding the
/// full `blob` column. The `blob` column (via [`decode_metadata`])
/// remains the source of truth.
fn encode_notes_blob(md: &Metadata) -> Vec<u8> {
    let mut out = String::new();
    for note in md.notes() {
        out.push_str(&note.time.to_string());
        out.push('\t');
        out.push_str(&note.text.replace('\n', "\\n"));
        out.push('\n');
    }
    out.into_bytes()
}

fn column_name(code: Code) -> String {
    format!("f_{}", code.name())
}

fn hash_fingerprint(parts: &[Option<String>]) -> u128 {
    let joined = parts
        .iter()
        .map(|p| p.as_deref().unwrap_or(""))
        .collect::<Vec<_>>()
        .join("\u{1}");
    cityhash_rs::cityhash_110_128(joined.as_bytes())
}

/// The record's USN (spec §4.7.1): this crate doesn't decode the real
/// BUFR descriptor carrying it, so it is modelled as the `value` item's
/// text parsed as an integer.
pub(crate) fn extract_usn(md: &Metadata) -> Option<i64> {
    match md.get(Code::Value) {
        Some(Item::Value(Value(s))) => s.parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateCheck {
    NotDuplicate,
    Duplicate { id: i64, usn: Option<i64> },
}

pub struct OnDisk2Index {
    conn: Connection,
    unique_fields: Vec<Code>,
    indexed_fields: Vec<Code>,
    fingerprints: HashSet<u128>,
    in_transaction: bool,
}

impl OnDisk2Index {
    pub fn open(path: &Path, unique_fields: Vec<Code>, indexed_fields: Vec<Code>) -> Result<OnDisk2Index> {
        Self::open_with_flags(path, unique_fields, indexed_fields, OpenFlags::default())
    }

    pub fn open_read_only(path: &Path, unique_fields: Vec<Code>, indexed_fields: Vec<Code>) -> Result<OnDisk2Index> {
        Self::open_with_flags(
            path,
            unique_fields,
            indexed_fields,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn open_with_flags(
        path: &Path,
        unique_fields: Vec<Code>,
        indexed_fields: Vec<Code>,
        flags: OpenFlags,
    ) -> Result<OnDisk2Index> {
        let conn = Connection::open_with_flags(path, flags)?;
        conn.execute_batch(
            "PRAGMA read_uncommitted=1; PRAGMA legacy_file_format=0; PRAGMA journal_mode=WAL;",
        )?;

        let mut columns = vec![
            "id INTEGER PRIMARY KEY".to_string(),
            "file TEXT NOT NULL".to_string(),
            "offset INTEGER NOT NULL".to_string(),
            "size INTEGER NOT NULL".to_string(),
            "reftime TEXT NOT NULL".to_string(),
            "usn INTEGER".to_string(),
            "notes BLOB NOT NULL".to_string(),
            "blob BLOB NOT NULL".to_string(),
        ];
        for code in &indexed_fields {
            if *code != Code::Reftime {
                columns.push(format!("{} TEXT", column_name(*code)));
            }
        }
        let mut create = format!("CREATE TABLE IF NOT EXISTS md ({}", columns.join(", "));
        if !unique_fields.is_empty() {
            let unique_cols: Vec<String> = unique_fields
                .iter()
                .map(|c| if *c == Code::Reftime { "reftime".to_string() } else { column_name(*c) })
                .collect();
            create.push_str(&format!(", UNIQUE({})", unique_cols.join(", ")));
        }
        create.push(')');
        conn.execute(&create, [])?;
        conn.execute("CREATE INDEX IF NOT EXISTS md_file_idx ON md(file)", [])?;
        conn.execute("CREATE INDEX IF NOT EXISTS md_reftime_idx ON md(reftime)", [])?;

        let mut index = OnDisk2Index {
            conn,
            unique_fields,
            indexed_fields,
            fingerprints: HashSet::new(),
            in_transaction: false,
        };
        index.load_fingerprints()?;
        Ok(index)
    }

    fn load_fingerprints(&mut self) -> Result<()> {
        if self.unique_fields.is_empty() {
            return Ok(());
        }
        let cols: Vec<String> = self
            .unique_fields
            .iter()
            .map(|c| if *c == Code::Reftime { "reftime".to_string() } else { column_name(*c) })
            .collect();
        let sql = format!("SELECT {} FROM md", cols.join(", "));
        let mut stmt = self.conn.prepare(&sql)?;
        let n = cols.len();
        let rows = stmt.query_map([], move |row| {
            let mut parts = Vec::with_capacity(n);
            for i in 0..n {
                parts.push(row.get::<_, Option<String>>(i)?);
            }
            Ok(parts)
        })?;
        for row in rows {
            self.fingerprints.insert(hash_fingerprint(&row?));
        }
        Ok(())
    }

    fn ensure_transaction(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.conn.execute_batch("BEGIN")?;
            self.in_transaction = true;
        }
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn.execute_batch("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_transaction = false;
            self.fingerprints.clear();
            self.load_fingerprints()?;
        }
        Ok(())
    }

    /// Check whether `md` collides with an existing row on the
    /// `unique_fields` columns (spec §4.7 step 3). A fingerprint-cache
    /// miss skips the SQL round-trip entirely.
    pub fn check_duplicate(&self, md: &Metadata) -> Result<DuplicateCheck> {
        if self.unique_fields.is_empty() {
            return Ok(DuplicateCheck::NotDuplicate);
        }
        let fp = md.fingerprint(&self.unique_fields);
        if !self.fingerprints.contains(&hash_fingerprint(&fp)) {
            return Ok(DuplicateCheck::NotDuplicate);
        }
        let cols: Vec<String> = self
            .unique_fields
            .iter()
            .map(|c| if *c == Code::Reftime { "reftime".to_string() } else { column_name(*c) })
            .collect();
        let clauses: Vec<String> = cols
            .iter()
            .zip(fp.iter())
            .map(|(col, v)| match v {
                Some(_) => format!("{} = ?", col),
                None => format!("{} IS NULL", col),
            })
            .collect();
        let sql = format!(
            "SELECT id, usn FROM md WHERE {}",
            clauses.join(" AND ")
        );
        let params: Vec<&str> = fp.iter().filter_map(|v| v.as_deref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params))?;
        match rows.next()? {
            Some(row) => Ok(DuplicateCheck::Duplicate {
                id: row.get(0)?,
                usn: row.get(1)?,
            }),
            None => Ok(DuplicateCheck::NotDuplicate),
        }
    }

    /// Insert a new row for `md`, already written at `(relpath, offset,
    /// size)` in its segment. Must run inside the open transaction;
    /// `commit()`/`rollback()` decide whether it becomes visible.
    pub fn insert(&mut self, md: &Metadata, relpath: &str, offset: u64, size: u64) -> Result<i64> {
        self.ensure_transaction()?;
        let reftime = md
            .reftime()
            .map(|r| r.sort_key().to_string())
            .unwrap_or_default();
        let usn = extract_usn(md);
        let notes = encode_notes_blob(md);
        let blob = encode_metadata(md);

        let mut fixed_cols = vec!["file", "offset", "size", "reftime", "usn", "notes", "blob"];
        let mut placeholders: Vec<String> = fixed_cols.iter().map(|_| "?".to_string()).collect();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(relpath.to_string()),
            Box::new(offset as i64),
            Box::new(size as i64),
            Box::new(reftime),
            Box::new(usn),
            Box::new(notes),
            Box::new(blob),
        ];
        let mut extra_cols: Vec<String> = Vec::new();
        for code in &self.indexed_fields {
            if *code == Code::Reftime {
                continue;
            }
            extra_cols.push(column_name(*code));
            placeholders.push("?".to_string());
            values.push(Box::new(md.get(*code).map(|i| i.to_string())));
        }
        let all_cols: Vec<String> = fixed_cols
            .drain(..)
            .map(|s| s.to_string())
            .chain(extra_cols)
            .collect();
        let sql = format!(
            "INSERT INTO md ({}) VALUES ({})",
            all_cols.join(", "),
            placeholders.join(", ")
        );
        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
        self.conn.execute(&sql, params.as_slice())?;
        let id = self.conn.last_insert_rowid();
        self.fingerprints.insert(hash_fingerprint(&md.fingerprint(&self.unique_fields)));
        Ok(id)
    }

    pub fn delete_row(&mut self, id: i64) -> Result<()> {
        self.ensure_transaction()?;
        self.conn.execute("DELETE FROM md WHERE id = ?", [id])?;
        Ok(())
    }

    pub fn remove_file(&mut self, relpath: &str) -> Result<()> {
        self.ensure_transaction()?;
        self.conn.execute("DELETE FROM md WHERE file = ?", [relpath])?;
        Ok(())
    }

    pub fn row_count(&self) -> Result<u64> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM md", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    /// `(id, offset, size)` for every row in `relpath`, in file order
    /// (spec §4.10 "Pack": input to a segment checker's `repack`).
    pub fn rows_for_file(&self, relpath: &str) -> Result<Vec<(i64, u64, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, offset, size FROM md WHERE file = ? ORDER BY offset")?;
        let rows = stmt.query_map([relpath], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as u64, row.get::<_, i64>(2)? as u64))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// After a repack moves `relpath`'s surviving rows to new offsets,
    /// `new_ranges` gives the `(offset, size)` for each id in the same
    /// order `rows_for_file` returned them.
    pub fn relocate_rows(&mut self, ids: &[i64], new_ranges: &[(u64, u64)]) -> Result<()> {
        self.ensure_transaction()?;
        for (id, (offset, size)) in ids.iter().zip(new_ranges.iter()) {
            self.conn.execute(
                "UPDATE md SET offset = ?, size = ? WHERE id = ?",
                rusqlite::params![*offset as i64, *size as i64, *id],
            )?;
        }
        Ok(())
    }

    /// All distinct files named in the index, used by maintenance to
    /// compare against what's actually on disk (spec §4.10).
    pub fn all_files(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT file FROM md ORDER BY file")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn reftime_where(matcher: &Matcher) -> (String, Vec<String>) {
        match matcher.date_extremes() {
            Some(interval) => {
                let mut clauses = Vec::new();
                let mut params = Vec::new();
                if let Some(begin) = interval.begin {
                    clauses.push("reftime >= ?".to_string());
                    params.push(begin.to_string());
                }
                if let Some(end) = interval.end {
                    clauses.push("reftime < ?".to_string());
                    params.push(end.to_string());
                }
                (clauses.join(" AND "), params)
            }
            None => (String::new(), Vec::new()),
        }
    }

    /// Decode and yield every row matching `matcher`'s reftime range,
    /// re-checking the rest of the expression in full after decoding the
    /// stored blob (see module docs). Returning `false` from `dest`
    /// cancels the scan.
    pub fn query_rows(&self, matcher: &Matcher, dest: &mut dyn FnMut(Metadata, &str, u64, u64) -> bool) -> Result<()> {
        let (where_clause, params) = Self::reftime_where(matcher);
        let sql = if where_clause.is_empty() {
            "SELECT file, offset, size, blob FROM md ORDER BY reftime".to_string()
        } else {
            format!("SELECT file, offset, size, blob FROM md WHERE {} ORDER BY reftime", where_clause)
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let file: String = row.get(0)?;
            let offset: i64 = row.get(1)?;
            let size: i64 = row.get(2)?;
            let blob: Vec<u8> = row.get(3)?;
            let md = decode_metadata(&blob)?;
            if !matcher.matches(&md) {
                continue;
            }
            if !dest(md, &file, offset as u64, size as u64) {
                break;
            }
        }
        Ok(())
    }

    /// Distinct files whose rows might satisfy `matcher`'s reftime range
    /// (spec §4.8 "candidate enumeration").
    pub fn candidate_files(&self, matcher: &Matcher) -> Result<Vec<String>> {
        let (where_clause, params) = Self::reftime_where(matcher);
        let sql = if where_clause.is_empty() {
            "SELECT DISTINCT file FROM md ORDER BY file".to_string()
        } else {
            format!("SELECT DISTINCT file FROM md WHERE {} ORDER BY file", where_clause)
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row.get::<_, String>(0)?);
        }
        Ok(out)
    }

    /// Decode and yield `file`'s matching rows in blob order, for
    /// callers that stream file-by-file and need a segment boundary to
    /// flush a sort window at (spec §4.8 "end of segment when no period
    /// is given"). Unlike [`OnDisk2Index::query_rows`], this is scoped
    /// to one file rather than ordered by `reftime` across the whole
    /// index.
    pub fn query_rows_for_file(&self, file: &str, matcher: &Matcher, dest: &mut dyn FnMut(Metadata) -> bool) -> Result<()> {
        let mut stmt = self.conn.prepare("SELECT offset, blob FROM md WHERE file = ? ORDER BY offset")?;
        let mut rows = stmt.query(rusqlite::params![file])?;
        while let Some(row) = rows.next()? {
            let blob: Vec<u8> = row.get(1)?;
            let md = decode_metadata(&blob)?;
            if !matcher.matches(&md) {
                continue;
            }
            if !dest(md) {
                break;
            }
        }
        Ok(())
    }
}

#[path = "ondisk2_test.rs"]
#[cfg(test)]
mod ondisk2_test;
