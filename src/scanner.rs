//! The scanner seam (spec §1, §9): turning message bytes into a
//! [`Metadata`] record is delegated to pluggable, format-specific
//! scanners kept outside this crate's scope. `Scanner` is the trait the
//! engine calls through; [`register_factory`] populates a process-wide
//! registry at startup, mirroring the teacher's `lazy_static`-backed
//! global tables (`src/robt/config.rs`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::error::Result;
use crate::metadata::{DataFormat, Metadata};

/// A format-specific message scanner. Concat/dir-kind segments call
/// [`Scanner::split`] to find message boundaries within a raw byte
/// buffer (self-framing binary formats know this; line- and
/// file-per-message containers determine boundaries themselves and
/// only need [`Scanner::scan_message`]).
pub trait Scanner: Send + Sync {
    /// `(offset, size)` of each message within `data`, in file order.
    fn split(&self, data: &[u8]) -> Result<Vec<(u64, u64)>>;

    /// Parse one message's metadata. The returned record has no
    /// `Source` set; the segment reader fills that in once it knows
    /// the final `(relpath, offset, size)`.
    fn scan_message(&self, data: &[u8]) -> Result<Metadata>;

    /// Validate a message's bytes without necessarily re-deriving every
    /// field (spec §4.4 `Checker::check`'s non-quick path). Default
    /// implementation just re-scans.
    fn validate(&self, data: &[u8]) -> Result<()> {
        self.scan_message(data).map(|_| ())
    }
}

lazy_static! {
    static ref REGISTRY: Mutex<HashMap<DataFormat, Arc<dyn Scanner>>> = Mutex::new(HashMap::new());
}

/// Register (or replace) the scanner used for `format`. Called once at
/// process startup by each format's own scanner module; lookups after
/// that are lock-free in spirit, just a short-lived mutex hold (spec
/// §5: "process-global, populated at startup... reads are lock-free
/// after initialization").
pub fn register_factory(format: DataFormat, scanner: Arc<dyn Scanner>) {
    REGISTRY.lock().unwrap().insert(format, scanner);
}

pub fn get(format: DataFormat) -> Option<Arc<dyn Scanner>> {
    REGISTRY.lock().unwrap().get(&format).cloned()
}

pub fn is_registered(format: DataFormat) -> bool {
    REGISTRY.lock().unwrap().contains_key(&format)
}

#[cfg(test)]
pub mod testing {
    //! A deterministic fixed-framing scanner used by this crate's own
    //! tests in place of a real GRIB/BUFR/... implementation, which is
    //! out of scope (spec §1). Messages are framed as
    //! `<4-byte BE length><payload>`; `scan_message` interprets the
    //! first byte of the payload as a GRIB1 `centre` value and a fixed
    //! reftime, which is all these tests need to exercise dispatch,
    //! indexing, and query plumbing end to end.
    use super::*;
    use crate::metadata::Reftime;
    use crate::time::Time;
    use crate::types::{Item, Origin};
    use std::convert::TryInto;

    pub struct FramedTestScanner;

    impl Scanner for FramedTestScanner {
        fn split(&self, data: &[u8]) -> Result<Vec<(u64, u64)>> {
            let mut out = Vec::new();
            let mut off = 0usize;
            while off < data.len() {
                if data.len() < off + 4 {
                    return crate::err_at!(Codec, "ShortRead: framed test message length");
                }
                let len = u32::from_be_bytes(data[off..off + 4].try_into().unwrap()) as usize;
                off += 4;
                if data.len() < off + len {
                    return crate::err_at!(Codec, "ShortRead: framed test message payload");
                }
                out.push((off as u64, len as u64));
                off += len;
            }
            Ok(out)
        }

        fn scan_message(&self, data: &[u8]) -> Result<Metadata> {
            if data.is_empty() {
                return crate::err_at!(Validator, "empty test message");
            }
            let mut md = Metadata::new();
            md.set(Item::Origin(Origin::Grib1 {
                centre: data[0],
                subcentre: 0,
                process: 101,
            }));
            md.set_reftime(Reftime::Position(Time::new(2007, 7, 8, 13, 0, 0)));
            Ok(md)
        }
    }

    pub fn frame(payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + 4);
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    pub fn register() {
        register_factory(DataFormat::Grib, Arc::new(FramedTestScanner));
    }

    /// A scanner for line-framed test messages (used by the `lines`
    /// segment tests, which split on `\n` themselves and hand each
    /// resulting line's bytes straight to `scan_message`).
    pub struct LineTestScanner;

    impl Scanner for LineTestScanner {
        fn split(&self, data: &[u8]) -> Result<Vec<(u64, u64)>> {
            Ok(vec![(0, data.len() as u64)])
        }

        fn scan_message(&self, data: &[u8]) -> Result<Metadata> {
            if data.is_empty() {
                return crate::err_at!(Validator, "empty vm2 test line");
            }
            let mut md = Metadata::new();
            md.set(Item::Origin(Origin::Grib1 {
                centre: data[0],
                subcentre: 0,
                process: 101,
            }));
            md.set_reftime(Reftime::Position(Time::new(2007, 7, 8, 13, 0, 0)));
            Ok(md)
        }
    }

    pub fn register_vm2() {
        register_factory(DataFormat::Vm2, Arc::new(LineTestScanner));
    }
}
