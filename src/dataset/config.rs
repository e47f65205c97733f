//! Dataset and registry configuration (spec §6): a hand-parsed
//! `key = value` grammar, one assignment per line, matching the
//! teacher's own config-file parsing style rather than pulling in a
//! config-format crate for a handful of flat keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::err_at;
use crate::error::{Error, Result};
use crate::index::{parse_field_list, ReplacePolicy};
use crate::metadata::DataFormat;
use crate::types::Code;

/// The dataset's `type` config key (spec §4.6, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    OnDisk2,
    Simple,
}

impl Kind {
    pub fn parse(s: &str) -> Option<Kind> {
        Some(match s.trim() {
            "ondisk2" => Kind::OnDisk2,
            "simple" => Kind::Simple,
            _ => return None,
        })
    }
}

/// How new segments are laid out on disk (spec §6 `segments` key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentsMode {
    Default,
    Dir,
}

impl SegmentsMode {
    pub fn parse(s: &str) -> Option<SegmentsMode> {
        Some(match s.trim() {
            "" | "concat" | "lines" => SegmentsMode::Default,
            "dir" => SegmentsMode::Dir,
            _ => return None,
        })
    }
}

/// How reftime maps to a segment's relpath (spec §4.7 step naming).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Singlefile,
}

impl Step {
    pub fn parse(s: &str) -> Option<Step> {
        Some(match s.trim() {
            "yearly" => Step::Yearly,
            "monthly" => Step::Monthly,
            "weekly" => Step::Weekly,
            "daily" => Step::Daily,
            "singlefile" => Step::Singlefile,
            _ => return None,
        })
    }

    /// Map `t` to the segment relpath it belongs in, with extension
    /// `format.as_str()`. `dataset_name` is only used by `Singlefile`.
    pub fn relpath(&self, t: &crate::time::Time, format: DataFormat, dataset_name: &str) -> PathBuf {
        let ext = format.as_str();
        match self {
            Step::Yearly => PathBuf::from(format!("{:04}.{}", t.year, ext)),
            Step::Monthly => PathBuf::from(format!("{:04}/{:02}.{}", t.year, t.month, ext)),
            Step::Weekly => {
                let week = (t.day - 1) / 7 + 1;
                PathBuf::from(format!("{:04}/{:02}-{:02}.{}", t.year, t.month, week, ext))
            }
            Step::Daily => PathBuf::from(format!("{:04}/{:02}-{:02}.{}", t.year, t.month, t.day, ext)),
            Step::Singlefile => PathBuf::from(format!("{}.{}", dataset_name, ext)),
        }
    }
}

/// A parsed, validated dataset config (spec §6: `type`, `format`,
/// `step`, `unique`, `index`, `segments`, `replace`, `archive age`,
/// `delete age`, `restrict`, `name`, `path`).
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub path: PathBuf,
    pub kind: Kind,
    pub format: DataFormat,
    pub step: Step,
    pub unique_fields: Vec<Code>,
    pub indexed_fields: Vec<Code>,
    pub segments: SegmentsMode,
    pub replace: ReplacePolicy,
    pub archive_age_days: Option<i64>,
    pub delete_age_days: Option<i64>,
    pub restrict: Vec<String>,
    pub filter: Option<String>,
}

/// Parse a flat `key = value` block, one assignment per line, `#`/`;`
/// lines and blanks ignored.
pub fn parse_kv_block(text: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with('[') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            out.push((k.trim().to_string(), v.trim().to_string()));
        }
    }
    out
}

impl Config {
    /// Load `path/config` for a single dataset rooted at `path`.
    pub fn from_path(path: &Path) -> Result<Config> {
        let text = std::fs::read_to_string(path.join("config"))?;
        let kv = parse_kv_block(&text);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Config::from_kv(name, path.to_path_buf(), &kv)
    }

    pub fn from_kv(name: String, path: PathBuf, kv: &[(String, String)]) -> Result<Config> {
        let map: HashMap<&str, &str> = kv.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

        let kind = map
            .get("type")
            .and_then(|s| Kind::parse(s))
            .ok_or_else(|| Error::Config(format!("dataset {:?}: missing or invalid 'type'", name)))?;
        let format = map
            .get("format")
            .and_then(|s| DataFormat::from_str(s))
            .ok_or_else(|| Error::Config(format!("dataset {:?}: missing or invalid 'format'", name)))?;
        let step = map
            .get("step")
            .and_then(|s| Step::parse(s))
            .ok_or_else(|| Error::Config(format!("dataset {:?}: missing or invalid 'step'", name)))?;
        let unique_fields = map.get("unique").map(|s| parse_field_list(s)).unwrap_or_default();
        let indexed_fields = map.get("index").map(|s| parse_field_list(s)).unwrap_or_default();
        let segments = map
            .get("segments")
            .map(|s| SegmentsMode::parse(s))
            .unwrap_or(Some(SegmentsMode::Default))
            .ok_or_else(|| Error::Config(format!("dataset {:?}: invalid 'segments'", name)))?;
        let replace = map
            .get("replace")
            .map(|s| ReplacePolicy::parse(s))
            .unwrap_or(Some(ReplacePolicy::Error))
            .ok_or_else(|| Error::Config(format!("dataset {:?}: invalid 'replace'", name)))?;
        let archive_age_days = map.get("archive age").and_then(|s| s.parse().ok());
        let delete_age_days = map.get("delete age").and_then(|s| s.parse().ok());
        let restrict = map
            .get("restrict")
            .map(|s| s.split(',').map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect())
            .unwrap_or_default();
        let filter = map.get("filter").map(|s| s.to_string());
        let path = map.get("path").map(PathBuf::from).unwrap_or(path);

        Ok(Config {
            name,
            path,
            kind,
            format,
            step,
            unique_fields,
            indexed_fields,
            segments,
            replace,
            archive_age_days,
            delete_age_days,
            restrict,
            filter,
        })
    }
}

/// A multi-dataset registry file (spec §6): `[name]`-sectioned, each
/// section a `Config`'s own key/value block.
pub struct Registry {
    pub datasets: Vec<Config>,
}

impl Registry {
    pub fn from_path(path: &Path) -> Result<Registry> {
        let text = std::fs::read_to_string(path)?;
        let base_dir = path.parent().map(|p| p.to_path_buf()).unwrap_or_else(|| PathBuf::from("."));

        let mut sections: Vec<(String, Vec<(String, String)>)> = Vec::new();
        let mut current: Option<(String, Vec<(String, String)>)> = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                if let Some(section) = current.take() {
                    sections.push(section);
                }
                current = Some((name.to_string(), Vec::new()));
                continue;
            }
            if let Some((_, kv)) = current.as_mut() {
                if let Some((k, v)) = line.split_once('=') {
                    kv.push((k.trim().to_string(), v.trim().to_string()));
                }
            }
        }
        if let Some(section) = current.take() {
            sections.push(section);
        }
        if sections.is_empty() {
            return err_at!(Config, "registry {:?}: no [name] sections found", path);
        }

        let mut datasets = Vec::with_capacity(sections.len());
        for (name, kv) in sections {
            let default_path = base_dir.join(&name);
            datasets.push(Config::from_kv(name, default_path, &kv)?);
        }
        Ok(Registry { datasets })
    }

    pub fn get(&self, name: &str) -> Option<&Config> {
        self.datasets.iter().find(|c| c.name == name)
    }
}

#[path = "config_test.rs"]
#[cfg(test)]
mod config_test;
