//! Alias expansion (spec §4.3): a bare alias reference (`.name`) in a
//! clause value is replaced by its configured expansion before the
//! clause is parsed. Aliases are scoped per metadata [`Code`] the way
//! arkimet's own `match-alias.conf` sections are, and may reference
//! other aliases of the same type up to a small recursion bound.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::err_at;
use crate::error::Result;
use crate::types::Code;

const MAX_EXPANSION_DEPTH: usize = 8;

/// `code -> (alias name -> expansion text)`.
#[derive(Debug, Clone, Default)]
pub struct AliasDatabase {
    tables: BTreeMap<Code, BTreeMap<String, String>>,
}

impl AliasDatabase {
    pub fn empty() -> AliasDatabase {
        AliasDatabase::default()
    }

    /// Parse an ini-like alias file: `[origin]` section headers followed
    /// by `name = expansion` lines, blank lines and `#`-comments ignored.
    pub fn from_text(text: &str) -> Result<AliasDatabase> {
        let mut tables: BTreeMap<Code, BTreeMap<String, String>> = BTreeMap::new();
        let mut current: Option<Code> = None;
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                let name = &line[1..line.len() - 1];
                current = Some(
                    Code::from_name(name)
                        .ok_or_else(|| crate::error::Error::Config(format!("unknown alias section {:?}", name)))?,
                );
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| crate::error::Error::Config(format!("malformed alias line {}: {:?}", lineno, line)))?;
            let code = current
                .ok_or_else(|| crate::error::Error::Config(format!("alias line {} outside any [section]", lineno)))?;
            tables
                .entry(code)
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(AliasDatabase { tables })
    }

    pub fn from_path(path: &Path) -> Result<AliasDatabase> {
        let text = fs::read_to_string(path)?;
        AliasDatabase::from_text(&text)
    }

    /// Load from the directory named by `ARKI_ALIASES`, if set; falls
    /// back to `<config dir>/arkimet/match-alias.conf`, then an empty
    /// database. The engine only resolves the path; it does not
    /// interpret anything beyond the alias grammar itself.
    pub fn from_env() -> Result<AliasDatabase> {
        let dir = match env::var_os("ARKI_ALIASES") {
            Some(dir) => Some(std::path::PathBuf::from(dir)),
            None => dirs::config_dir().map(|d| d.join("arkimet")),
        };
        match dir {
            Some(dir) => {
                let path = dir.join("match-alias.conf");
                if path.exists() {
                    AliasDatabase::from_path(&path)
                } else {
                    Ok(AliasDatabase::empty())
                }
            }
            None => Ok(AliasDatabase::empty()),
        }
    }

    /// Replace a leading `.name` reference in `value` with its
    /// expansion, recursively, up to [`MAX_EXPANSION_DEPTH`].
    pub fn expand(&self, code: Code, value: &str) -> Result<String> {
        self.expand_at(code, value, 0)
    }

    fn expand_at(&self, code: Code, value: &str, depth: usize) -> Result<String> {
        let value = value.trim();
        match value.strip_prefix('.') {
            None => Ok(value.to_string()),
            Some(_) if depth >= MAX_EXPANSION_DEPTH => {
                err_at!(Matcher, "alias expansion too deep resolving {:?}", value)
            }
            Some(name) => {
                let expansion = self
                    .tables
                    .get(&code)
                    .and_then(|t| t.get(name))
                    .ok_or_else(|| crate::error::Error::Matcher(format!("unknown alias {}:{}", code.name(), name)))?;
                self.expand_at(code, expansion, depth + 1)
            }
        }
    }
}
