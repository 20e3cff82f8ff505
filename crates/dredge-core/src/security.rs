//! Path checks for extracted entries

use crate::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{error, warn};

/// Resolve an entry path under `base`, refusing anything that would land
/// outside of it.
///
/// The check is lexical: `base` does not have to exist and nothing is
/// canonicalised, so concurrent callers never touch the filesystem here.
pub fn sanitize_path(base: &Path, untrusted: &Path) -> Result<PathBuf> {
    let mut result = base.to_path_buf();

    for component in untrusted.components() {
        match component {
            Component::Normal(name) => {
                result.push(name);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                error!(path = ?untrusted, "Path contains parent directory component");
                return Err(Error::InvalidPath(format!(
                    "Path traversal attempt detected: {:?}",
                    untrusted
                )));
            }
            Component::RootDir => {
                error!(path = ?untrusted, "Path is absolute");
                return Err(Error::InvalidPath(format!(
                    "Absolute path not allowed: {:?}",
                    untrusted
                )));
            }
            Component::Prefix(_) => {
                error!(path = ?untrusted, "Path contains Windows prefix");
                return Err(Error::InvalidPath(format!(
                    "Windows path prefix not allowed: {:?}",
                    untrusted
                )));
            }
        }
    }

    Ok(result)
}

/// Check that a symlink stored at `link` (relative to the extraction
/// folder) points somewhere inside the folder.
///
/// Absolute targets are rejected, as are relative ones that climb above
/// the folder once resolved against the link's parent directory.
pub fn check_link_target(link: &Path, target: &Path) -> Result<()> {
    if target.is_absolute() {
        warn!(link = ?link, target = ?target, "Symlink has absolute target");
        return Err(Error::InvalidPath(format!(
            "Symlink points outside extraction directory: {:?} -> {:?}",
            link, target
        )));
    }

    let mut normalized = PathBuf::new();
    if let Some(parent) = link.parent() {
        for component in parent.components() {
            if let Component::Normal(name) = component {
                normalized.push(name);
            }
        }
    }

    for component in target.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    warn!(link = ?link, target = ?target, "Symlink target escapes extraction directory");
                    return Err(Error::InvalidPath(format!(
                        "Symlink target would escape extraction directory: {:?} -> {:?}",
                        link, target
                    )));
                }
            }
            Component::Normal(name) => normalized.push(name),
            Component::CurDir => {}
            _ => {
                warn!(link = ?link, target = ?target, component = ?component, "Unexpected path component in symlink target");
                return Err(Error::InvalidPath(format!(
                    "Invalid symlink target: {:?} -> {:?}",
                    link, target
                )));
            }
        }
    }

    Ok(())
}

/// Check that what already exists of `path` resolves inside `base`.
///
/// `path` is lexically under `base`, but a symlink extracted earlier can
/// still redirect it. The deepest existing ancestor is resolved and must
/// stay within `base`.
pub fn ensure_contained(base: &Path, path: &Path) -> Result<()> {
    let mut existing = path;
    while fs::symlink_metadata(existing).is_err() {
        match existing.parent() {
            Some(parent) => existing = parent,
            None => return Ok(()),
        }
    }

    let base = base.canonicalize()?;
    let resolved = existing.canonicalize()?;
    if !resolved.starts_with(&base) {
        error!(path = ?path, resolved = ?resolved, "Path resolves outside extraction directory");
        return Err(Error::InvalidPath(format!(
            "Path resolves outside extraction directory: {:?} -> {:?}",
            path, resolved
        )));
    }
    Ok(())
}
