//! Dataset index backends (spec §4.6): `ondisk2` drives a SQL index,
//! `simple` drives a text (or SQLite) MANIFEST. Both sit behind the
//! dataset writer/reader, which decide which one to open from the
//! dataset's `type` config key.

pub mod manifest;
pub mod ondisk2;

use crate::types::Code;

/// Outcome of a duplicate check once a replace policy has been applied
/// (spec §4.7 `ACQ_OK` / `ACQ_ERROR_DUPLICATE`; the third outcome,
/// `ACQ_ERROR`, is a hard failure and travels as `Result::Err` instead
/// of a variant here, since nothing in this crate produces it as a
/// deliberate soft outcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireResult {
    Ok,
    ErrorDuplicate,
}

/// The dataset's `replace` config key (spec §4.7.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacePolicy {
    /// Reject the new record, keep the old one.
    Error,
    /// Always replace the old record with the new one.
    Replace,
    /// Replace only when the new record's USN is >= the old one's (or
    /// the old one carries none).
    Usn,
}

impl ReplacePolicy {
    pub fn parse(s: &str) -> Option<ReplacePolicy> {
        Some(match s.trim() {
            "" | "no" | "error" => ReplacePolicy::Error,
            "yes" | "replace" => ReplacePolicy::Replace,
            "USN" | "usn" => ReplacePolicy::Usn,
            _ => return None,
        })
    }
}

/// Parse a comma-separated `unique`/`index` config value into the
/// `Code`s it names, skipping anything unrecognized.
pub fn parse_field_list(s: &str) -> Vec<Code> {
    s.split(',')
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .filter_map(Code::from_name)
        .collect()
}

#[cfg(test)]
mod mod_test {
    use super::*;

    #[test]
    fn test_replace_policy_parse() {
        assert_eq!(ReplacePolicy::parse(""), Some(ReplacePolicy::Error));
        assert_eq!(ReplacePolicy::parse("no"), Some(ReplacePolicy::Error));
        assert_eq!(ReplacePolicy::parse("yes"), Some(ReplacePolicy::Replace));
        assert_eq!(ReplacePolicy::parse("USN"), Some(ReplacePolicy::Usn));
        assert_eq!(ReplacePolicy::parse("bogus"), None);
    }

    #[test]
    fn test_parse_field_list_skips_unknown_and_trims() {
        let fields = parse_field_list(" origin, bogus,product ,,reftime");
        assert_eq!(fields, vec![Code::Origin, Code::Product, Code::Reftime]);
    }
}
