//! Object name validation and secure path resolution
//!
//! Names are checked in two phases: a lexical pass over the name itself,
//! then a re-check of the joined path against the base directory. Callers
//! that need symlink safety canonicalize the result and call [`is_subpath`].

use crate::{Error, Result};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Reject names that can never be valid object keys
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName("empty object name".into()));
    }
    if name.contains('\0') {
        return Err(Error::InvalidName(format!(
            "object name contains a null byte: {:?}",
            name
        )));
    }
    Ok(())
}

/// Lexically collapse `.` and `..` segments
///
/// `..` segments that would climb above the start are kept at the front,
/// so the caller can detect them.
fn normalize(name: &Path) -> PathBuf {
    let mut parts: Vec<&OsStr> = Vec::new();
    let mut climbs = 0usize;

    for component in name.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                if parts.pop().is_none() {
                    climbs += 1;
                }
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    let mut out = PathBuf::new();
    for _ in 0..climbs {
        out.push("..");
    }
    for part in parts {
        out.push(part);
    }
    out
}

fn starts_with_parent(path: &Path) -> bool {
    matches!(path.components().next(), Some(Component::ParentDir))
}

/// Join an object name onto `base`, refusing anything that leaves it
///
/// `base` must be absolute. Symlinks are not resolved here.
pub(crate) fn secure_join(base: &Path, name: &str) -> Result<PathBuf> {
    validate_name(name)?;

    let raw = Path::new(name);
    let has_root = raw
        .components()
        .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)));
    if raw.is_absolute() || has_root {
        return Err(Error::InvalidName(format!(
            "absolute path not allowed: {}",
            name
        )));
    }

    let clean = normalize(raw);
    if starts_with_parent(&clean) {
        return Err(Error::PathEscape(name.to_string()));
    }

    let full = base.join(&clean);
    match full.strip_prefix(base) {
        Ok(rel) if !starts_with_parent(rel) => Ok(full),
        _ => Err(Error::PathEscape(name.to_string())),
    }
}

/// True when `target` is `base` or lies beneath it
///
/// Both paths should already be canonical.
pub(crate) fn is_subpath(base: &Path, target: &Path) -> bool {
    match target.strip_prefix(base) {
        Ok(rel) => !rel
            .components()
            .any(|c| matches!(c, Component::ParentDir)),
        Err(_) => false,
    }
}
