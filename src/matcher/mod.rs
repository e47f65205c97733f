//! Query matchers: a conjunction of per-type predicates (spec §4.3),
//! one optional clause per metadata code, ANDed together, each clause
//! itself an OR of alternatives.
//!
//! ```text
//! origin:GRIB1,200 or GRIB1,201; reftime:>=today-3d,<today; product:GRIB1,200,2,11
//! ```

pub mod alias;
pub mod generic;
pub mod origin;
pub mod reftime;

use std::collections::BTreeMap;

use crate::err_at;
use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::summary::Summary;
use crate::time::Interval;
use crate::types::Code;

use alias::AliasDatabase;
use generic::GenericMatch;
use origin::OriginMatch;
use reftime::ReftimeMatch;

/// A parsed query expression (spec §4.3).
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    origin: Vec<OriginMatch>,
    reftime: Option<ReftimeMatch>,
    generic: BTreeMap<Code, GenericMatch>,
}

impl Matcher {
    pub fn everything() -> Matcher {
        Matcher::default()
    }

    pub fn parse(expr: &str) -> Result<Matcher> {
        Matcher::parse_with_aliases(expr, &AliasDatabase::empty())
    }

    /// Parse an expression, expanding `.name` alias references against
    /// `aliases` first.
    pub fn parse_with_aliases(expr: &str, aliases: &AliasDatabase) -> Result<Matcher> {
        let mut matcher = Matcher::default();
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(matcher);
        }
        for clause in expr.split(';') {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            let (key, value) = clause
                .split_once(':')
                .ok_or_else(|| Error::Matcher(format!("malformed clause {:?}", clause)))?;
            let key = key.trim();
            let value = aliases.expand(
                Code::from_name(key).ok_or_else(|| Error::Matcher(format!("unknown matcher key {:?}", key)))?,
                value.trim(),
            )?;

            if key == "reftime" {
                if matcher.reftime.is_some() {
                    return err_at!(Matcher, "duplicate reftime clause");
                }
                matcher.reftime = Some(ReftimeMatch::parse(&value)?);
                continue;
            }
            if key == "origin" {
                matcher.origin = OriginMatch::parse_alternatives(&value)?;
                continue;
            }
            let code = Code::from_name(key)
                .ok_or_else(|| Error::Matcher(format!("unknown matcher key {:?}", key)))?;
            matcher.generic.insert(code, GenericMatch::parse(code, &value)?);
        }
        Ok(matcher)
    }

    pub fn matches(&self, md: &Metadata) -> bool {
        if !self.origin.is_empty() {
            let ok = match md.get(Code::Origin) {
                Some(crate::types::Item::Origin(o)) => self.origin.iter().any(|m| m.matches(o)),
                _ => false,
            };
            if !ok {
                return false;
            }
        }
        if let Some(rm) = &self.reftime {
            match md.reftime() {
                Some(r) => {
                    if !rm.matches(r) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        for (code, gm) in &self.generic {
            match md.get(*code) {
                Some(item) => {
                    if !gm.matches(item) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    /// Whether a [`Summary`] entry set could possibly contain a match —
    /// used to prune whole segments before reading their full index
    /// (spec §4.8). Conservative: only rejects when no entry at all can
    /// satisfy the non-reftime clauses.
    pub fn summary_could_match(&self, summary: &Summary) -> bool {
        if summary.is_empty() {
            return self.origin.is_empty() && self.generic.is_empty() && self.reftime.is_none();
        }
        summary.entries().iter().any(|entry| {
            if !self.origin.is_empty() {
                let ok = entry
                    .items
                    .iter()
                    .any(|item| matches!(item, crate::types::Item::Origin(o) if self.origin.iter().any(|m| m.matches(o))));
                if !ok {
                    return false;
                }
            }
            for (code, gm) in &self.generic {
                let ok = entry.items.iter().any(|item| item.code() == *code && gm.matches(item));
                if !ok {
                    return false;
                }
            }
            if let Some(rm) = &self.reftime {
                if !rm.interval().intersects(&entry.interval) {
                    return false;
                }
            }
            true
        })
    }

    /// The implied reftime bound, if a `reftime:` clause is present.
    pub fn date_extremes(&self) -> Option<Interval> {
        self.reftime.as_ref().map(|rm| rm.interval())
    }

    pub fn to_string_expanded(&self) -> String {
        let mut parts = Vec::new();
        if !self.origin.is_empty() {
            parts.push(format!(
                "origin:{}",
                self.origin
                    .iter()
                    .map(|m| m.to_string())
                    .collect::<Vec<_>>()
                    .join(" or ")
            ));
        }
        if let Some(rm) = &self.reftime {
            parts.push(format!("reftime:{}", rm));
        }
        for (code, gm) in &self.generic {
            parts.push(format!("{}:{}", code.name(), gm));
        }
        parts.join(";")
    }
}

#[path = "mod_test.rs"]
#[cfg(test)]
mod mod_test;
