//! Dispatch an incoming record to the dataset whose matcher accepts it
//! (spec §4.9): ordered matcher evaluation, first match wins, with
//! extra matches, duplicates and unmatched records routed to shared
//! side datasets and reported back to the caller as one of the four
//! outcome codes.

use std::collections::HashMap;

use crate::dataset::config::Registry;
use crate::dataset::writer::Writer;
use crate::error::Result;
use crate::index::AcquireResult;
use crate::matcher::Matcher;
use crate::metadata::{Metadata, Note};
use crate::time::Time;

/// One `(matcher, dataset)` routing rule, evaluated in order (spec
/// §4.9 step 1).
pub struct Route {
    pub dataset: String,
    pub matcher: Matcher,
}

/// The four outcome codes a caller can observe for one dispatched
/// record (spec §4.9, "Dispatcher outcome codes").
#[derive(Debug)]
pub enum Outcome {
    Ok { dataset: String },
    ErrorDuplicate,
    Error(crate::error::Error),
    NotWritten,
}

/// Routes records across a registry's datasets (spec §4.9). Only one
/// shared error dataset and one shared duplicates dataset are modeled,
/// rather than a per-dataset side dataset each — the spec names "one
/// or more error datasets" without pinning down how callers choose
/// among several, and a single shared sink keeps that choice out of
/// scope here.
pub struct Dispatcher {
    routes: Vec<Route>,
    error_dataset: Option<String>,
    duplicates_dataset: Option<String>,
    writers: HashMap<String, Writer>,
}

fn now() -> Time {
    use chrono::{Datelike, Timelike, Utc};
    let n = Utc::now();
    Time::new(n.year(), n.month(), n.day(), n.hour(), n.minute(), n.second())
}

impl Dispatcher {
    pub fn new(
        registry: &Registry,
        routes: Vec<Route>,
        error_dataset: Option<String>,
        duplicates_dataset: Option<String>,
    ) -> Result<Dispatcher> {
        let mut writers: HashMap<String, Writer> = HashMap::new();
        for route in &routes {
            if writers.contains_key(&route.dataset) {
                continue;
            }
            let config = registry
                .get(&route.dataset)
                .ok_or_else(|| crate::error::Error::Config(format!("dispatcher: unknown dataset {:?}", route.dataset)))?;
            writers.insert(route.dataset.clone(), Writer::open(config.clone())?);
        }
        for side in error_dataset.iter().chain(duplicates_dataset.iter()) {
            if !writers.contains_key(side) {
                let config = registry
                    .get(side)
                    .ok_or_else(|| crate::error::Error::Config(format!("dispatcher: unknown side dataset {:?}", side)))?;
                writers.insert(side.clone(), Writer::open(config.clone())?);
            }
        }
        Ok(Dispatcher {
            routes,
            error_dataset,
            duplicates_dataset,
            writers,
        })
    }

    /// Dispatch one record (spec §4.9 steps 1-7).
    pub fn dispatch(&mut self, mut md: Metadata, data: &[u8]) -> Result<Outcome> {
        let matched: Vec<String> = self
            .routes
            .iter()
            .filter(|r| r.matcher.matches(&md))
            .map(|r| r.dataset.clone())
            .collect();

        let primary = match matched.first().cloned() {
            Some(primary) => primary,
            None => {
                let wrote = self.note_and_route(&self.error_dataset.clone(), md.clone(), data, "no dataset matched")?;
                // spec §4.9 step 4: a routed-to-error record is DISP_ERROR,
                // not DISP_NOTWRITTEN; that code is reserved for step 7,
                // when no writer accepts the record at all (no error
                // dataset configured to catch it either).
                return Ok(if wrote {
                    Outcome::Error(crate::error::Error::Validator("no dataset matched".to_string()))
                } else {
                    Outcome::NotWritten
                });
            }
        };

        for extra in matched.iter().skip(1) {
            let mut copy = md.clone();
            copy.add_note(Note::new(now(), format!("also matched dataset {:?}", extra)));
            self.note_and_route(&self.error_dataset.clone(), copy, data, "additional dataset match")?;
        }

        let writer = self.writers.get_mut(&primary).expect("primary dataset writer registered in new()");
        match writer.acquire(md.clone(), data) {
            Ok(AcquireResult::Ok) => Ok(Outcome::Ok { dataset: primary }),
            Ok(AcquireResult::ErrorDuplicate) => {
                md.add_note(Note::new(now(), format!("duplicate in dataset {:?}", primary)));
                self.note_and_route(&self.duplicates_dataset.clone(), md, data, "duplicate")?;
                Ok(Outcome::ErrorDuplicate)
            }
            Err(err) => {
                md.add_note(Note::new(now(), format!("acquire failed in dataset {:?}: {}", primary, err)));
                self.note_and_route(&self.error_dataset.clone(), md, data, "acquire error")?;
                Ok(Outcome::Error(err))
            }
        }
    }

    /// Routes `md` to `target` if one is configured. Returns whether a
    /// record was actually written, so callers that care (spec §4.9
    /// step 4 vs step 7) can tell a logged no-op from a real write.
    fn note_and_route(&mut self, target: &Option<String>, md: Metadata, data: &[u8], reason: &str) -> Result<bool> {
        let target = match target {
            Some(target) => target,
            None => {
                log::warn!("dispatch: no side dataset configured to record: {}", reason);
                return Ok(false);
            }
        };
        let writer = self
            .writers
            .get_mut(target)
            .ok_or_else(|| crate::error::Error::Config(format!("dispatcher: unopened side dataset {:?}", target)))?;
        writer.acquire(md, data)?;
        Ok(true)
    }

    /// Commit every writer touched since the last commit/rollback (spec
    /// §4.9 "per source file batch commit").
    pub fn commit_all(&mut self) -> Result<()> {
        for writer in self.writers.values_mut() {
            writer.commit()?;
        }
        Ok(())
    }

    /// Roll back every writer's pending batch (spec §4.9: "a failed
    /// commit rolls back the whole batch").
    pub fn rollback_all(&mut self) -> Result<()> {
        for writer in self.writers.values_mut() {
            writer.rollback()?;
        }
        Ok(())
    }
}

#[path = "dispatch_test.rs"]
#[cfg(test)]
mod dispatch_test;
