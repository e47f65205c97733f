use std::{
    fs,
    io::{self, Read, Seek, Write},
    path::{Path, PathBuf},
};

use crate::err_at;
use crate::error::{Error, Result};

/// Open `file` for appending, creating parent directories and truncating
/// any previous content when `reuse` is false.
pub(crate) fn open_file_w(file: &Path, reuse: bool) -> Result<fs::File> {
    let mut opts = fs::OpenOptions::new();
    match reuse {
        false => {
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::remove_file(file).ok();
            Ok(opts.append(true).create_new(true).open(file)?)
        }
        true => Ok(opts.append(true).create(true).open(file)?),
    }
}

/// Open `file` for reading only.
pub(crate) fn open_file_r(file: &Path) -> Result<fs::File> {
    Ok(fs::OpenOptions::new().read(true).open(file)?)
}

/// Read exactly `n` bytes at `fpos`, erroring with `msg` context on a
/// short read.
pub(crate) fn read_buffer(fd: &mut fs::File, fpos: u64, n: u64, msg: &str) -> Result<Vec<u8>> {
    fd.seek(io::SeekFrom::Start(fpos))?;
    let mut buf = vec![0; n as usize];
    let r = fd.read(&mut buf)?;
    if r == buf.len() {
        Ok(buf)
    } else {
        err_at!(Io, "{}: short read {}/{}", msg, r, buf.len())
    }
}

/// Write `data` to `fd` and fsync, used after append batches so that a
/// crash never leaves committed index rows pointing past durable bytes.
pub(crate) fn write_fsync(fd: &mut fs::File, data: &[u8]) -> Result<()> {
    fd.write_all(data)?;
    fd.sync_all()?;
    Ok(())
}

/// Atomically replace `path`'s contents: write to `path.tmp`, fsync, then
/// rename over the original. Used for MANIFEST rewrites and repacked
/// segments.
pub(crate) fn atomic_rewrite(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    {
        let mut fd = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        fd.write_all(data)?;
        fd.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// mtime in whole seconds since epoch, the resolution the index and
/// manifest compare mtimes at (invariants 3 and 5 in the data model).
pub(crate) fn mtime_secs(path: &Path) -> Result<i64> {
    let meta = fs::metadata(path)?;
    let modified = meta.modified()?;
    let secs = modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok(secs)
}
