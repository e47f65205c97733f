//! Process-global segment reader pool (spec §5): readers are
//! expensive to open (file descriptors, directory listings) and
//! read-only, so every dataset reader querying the same segment shares
//! one instance. Weak references mean a reader is dropped as soon as
//! the last query referencing its segment finishes, mirroring the
//! teacher's `Mutex<HashMap<.., Weak<..>>>` registries
//! ([`crate::scanner::REGISTRY`]).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};

use lazy_static::lazy_static;

use crate::error::Result;
use crate::segment::{self, SegmentId, SegmentReader};

lazy_static! {
    static ref POOL: Mutex<HashMap<PathBuf, Weak<dyn SegmentReader>>> = Mutex::new(HashMap::new());
}

/// Get the shared reader for `id`, opening and caching a new one if
/// none is live.
pub fn get_or_open(id: &SegmentId) -> Result<Arc<dyn SegmentReader>> {
    let key = id.abspath();
    {
        let pool = POOL.lock().unwrap();
        if let Some(weak) = pool.get(&key) {
            if let Some(strong) = weak.upgrade() {
                return Ok(strong);
            }
        }
    }
    let reader: Arc<dyn SegmentReader> = Arc::from(segment::detect_reader(id)?);
    let mut pool = POOL.lock().unwrap();
    // another thread may have raced us to open the same segment; keep
    // whichever strong reference is already live to avoid two readers
    // for one segment coexisting longer than necessary.
    if let Some(existing) = pool.get(&key).and_then(|w| w.upgrade()) {
        return Ok(existing);
    }
    pool.insert(key, Arc::downgrade(&reader));
    Ok(reader)
}

/// Drop any cached entry for `id`, used after a repack/rescan replaces
/// a segment's bytes so stale file offsets can't survive in a reader
/// instance some other thread still holds alive.
pub fn evict(id: &SegmentId) {
    POOL.lock().unwrap().remove(&id.abspath());
}
