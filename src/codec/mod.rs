//! Metadata codecs: binary bundle framing, Yaml-like text form, and the
//! structured (`i`/`n`-keyed mapping) form (spec §4.1).

pub mod binary;
pub mod structured;
pub mod text;

pub use binary::{decode_bundle, encode_bundle, Bundle, Signature};
