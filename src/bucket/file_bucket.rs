//! Filesystem-backed bucket
//!
//! Layout:
//! ```text
//! <base>/
//!   <name>                        # one regular file per object
//!   <dir>/<file>.<random>.tmp     # in-flight put, next to its target
//! ```
//!
//! Writes go to a temp file in the target's directory, are synced, and are
//! then renamed over the target, so readers see either the old or the new
//! object in full. Writes to the same name are serialized within the
//! process; nothing locks across processes.

use super::locks::KeyLocks;
use super::path::{is_subpath, secure_join};
use super::{copy_with_cancel, Bucket, Stats};
use crate::content_type::{detect_content_type, SVG_SCAN_LEN};
use crate::context::CancellationToken;
use crate::{Error, Result};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// A bucket storing each object as a file under a base directory
pub struct FileBucket {
    /// Canonical base directory
    base: PathBuf,
    /// Write locks keyed by resolved object path
    locks: KeyLocks<PathBuf>,
}

fn rejected(name: &str, err: Error) -> Error {
    warn!(name, error = %err, "rejected object name");
    err
}

/// Best-effort fsync of a directory entry table
///
/// Not every platform or filesystem supports this, so failures are only
/// logged.
fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!(dir = %dir.display(), error = %e, "directory sync skipped");
    }
}

impl FileBucket {
    /// Open a bucket rooted at `base_path`, creating the directory if needed
    pub fn open(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref();
        fs::create_dir_all(base_path)?;
        let base = fs::canonicalize(base_path)?;
        debug!(base = %base.display(), "opened file bucket");

        Ok(FileBucket {
            base,
            locks: KeyLocks::new(),
        })
    }

    /// The canonical base directory
    pub fn base_path(&self) -> &Path {
        &self.base
    }

    /// Resolve `name` to the real path of an existing entry under the base
    ///
    /// Symlinks are followed, and the result must still lie under the base.
    fn resolve_existing(&self, name: &str) -> Result<PathBuf> {
        let full_path = secure_join(&self.base, name).map_err(|e| rejected(name, e))?;
        let real_path = fs::canonicalize(&full_path).map_err(|e| Error::from_io(e, name))?;

        if !is_subpath(&self.base, &real_path) {
            warn!(name, real = %real_path.display(), "object resolves outside base");
            return Err(Error::PathEscape(name.to_string()));
        }
        Ok(real_path)
    }

    /// Create the directory `dir` (a lexical path under the base) one
    /// segment at a time, returning its canonical path
    ///
    /// Each existing segment is resolved and checked against the base before
    /// anything is created beneath it, so a symlink leading out of the base
    /// is rejected without side effects.
    fn prepare_dir(&self, name: &str, dir: &Path) -> Result<PathBuf> {
        let rel = dir
            .strip_prefix(&self.base)
            .map_err(|_| Error::PathEscape(name.to_string()))?;

        let mut real_dir = self.base.clone();
        for segment in rel.components() {
            let next = real_dir.join(segment);
            match fs::create_dir(&next) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(Error::Io(e)),
            }

            real_dir = fs::canonicalize(&next)?;
            if !is_subpath(&self.base, &real_dir) {
                warn!(name, dir = %real_dir.display(), "object directory resolves outside base");
                return Err(Error::PathEscape(name.to_string()));
            }
        }
        Ok(real_dir)
    }

    /// Write `reader` to a temp file in `real_dir`, then rename it into place
    fn write_atomic(
        &self,
        token: &CancellationToken,
        real_dir: &Path,
        file_name: &OsStr,
        reader: &mut dyn Read,
    ) -> Result<u64> {
        let mut prefix = file_name.to_os_string();
        prefix.push(".");
        // Removed on drop unless persisted
        let mut tmp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(real_dir)?;

        let written = copy_with_cancel(token, reader, tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;

        let tmp_path = tmp.into_temp_path();
        sync_dir(real_dir);
        tmp_path
            .persist(real_dir.join(file_name))
            .map_err(|e| Error::Io(e.error))?;

        Ok(written)
    }

    /// Number of names with a write in flight or waiting
    pub fn pending_writes(&self) -> usize {
        self.locks.len()
    }
}

impl Bucket for FileBucket {
    /// Atomically store `reader`'s contents under `name`
    ///
    /// The per-name lock is held for the whole copy, so a slow reader
    /// stalls other writers of the same name (never readers, never other
    /// names).
    #[instrument(skip(self, token, reader), level = "debug")]
    fn put_object(
        &self,
        token: &CancellationToken,
        name: &str,
        reader: &mut dyn Read,
    ) -> Result<()> {
        let full_path = secure_join(&self.base, name).map_err(|e| rejected(name, e))?;
        if full_path == self.base {
            return Err(rejected(
                name,
                Error::InvalidName(format!("{} names the bucket root", name)),
            ));
        }
        let (dir, file_name) = match (full_path.parent(), full_path.file_name()) {
            (Some(dir), Some(file_name)) => (dir, file_name),
            _ => return Err(Error::InvalidName(name.to_string())),
        };
        token.check()?;

        let real_dir = self.prepare_dir(name, dir)?;
        // Keyed on the resolved location, so names reaching the same file
        // through an in-base symlink share a lock
        let lock_key = real_dir.join(file_name);

        self.locks.with_key(&lock_key, || {
            let written = self.write_atomic(token, &real_dir, file_name, reader)?;
            debug!(name, bytes = written, "object stored");
            Ok(())
        })
    }

    #[instrument(skip(self, token), level = "debug")]
    fn get_object(&self, token: &CancellationToken, name: &str) -> Result<Box<dyn Read + Send>> {
        token.check()?;
        let real_path = self.resolve_existing(name)?;

        let file = File::open(&real_path).map_err(|e| Error::from_io(e, name))?;
        if file.metadata()?.is_dir() {
            return Err(Error::NotFound(name.to_string()));
        }
        Ok(Box::new(file))
    }

    #[instrument(skip(self, token), level = "debug")]
    fn stats(&self, token: &CancellationToken, name: &str) -> Result<Stats> {
        token.check()?;
        let real_path = self.resolve_existing(name)?;

        let metadata = fs::metadata(&real_path).map_err(|e| Error::from_io(e, name))?;
        if metadata.is_dir() {
            return Err(Error::NotFound(name.to_string()));
        }

        let mut head = Vec::with_capacity(SVG_SCAN_LEN);
        File::open(&real_path)
            .map_err(|e| Error::from_io(e, name))?
            .take(SVG_SCAN_LEN as u64)
            .read_to_end(&mut head)?;

        Ok(Stats {
            size: metadata.len(),
            content_type: detect_content_type(name, &head),
            last_modified: metadata.modified()?.into(),
        })
    }
}
