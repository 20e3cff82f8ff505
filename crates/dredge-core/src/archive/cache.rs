//! Parsed archive state shared by the file tasks of one archive

use super::ArchiveEntry;
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use tracing::debug;

/// Size and modification time of an archive on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    pub(crate) fn of(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// One parse of an archive
pub(crate) struct Parsed<T> {
    fingerprint: Fingerprint,
    /// Whether this is the parse the file tasks were created from
    enumerated: bool,
    paths: Vec<PathBuf>,
    pub(crate) state: T,
}

/// Keeps the latest parse of an archive and re-parses only when the file
/// on disk has changed since.
pub(crate) struct ParseCache<T> {
    source: PathBuf,
    listed: Mutex<Vec<PathBuf>>,
    current: Mutex<Option<Arc<Parsed<T>>>>,
}

impl<T> ParseCache<T> {
    pub(crate) fn new(source: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            listed: Mutex::new(Vec::new()),
            current: Mutex::new(None),
        }
    }

    /// Parse the archive and remember the result as the enumerated listing
    pub(crate) fn enumerate<F>(&self, parse: F) -> Result<Vec<ArchiveEntry>>
    where
        F: FnOnce() -> Result<(Vec<ArchiveEntry>, T)>,
    {
        let fingerprint = Fingerprint::of(&self.source)?;
        let (entries, state) = parse()?;
        let paths: Vec<PathBuf> = entries.iter().map(|entry| entry.path.clone()).collect();

        *self.listed.lock().unwrap_or_else(PoisonError::into_inner) = paths.clone();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(Parsed {
            fingerprint,
            enumerated: true,
            paths,
            state,
        }));
        Ok(entries)
    }

    /// The parse to extract `entry` from, and the entry's ordinal in it.
    ///
    /// While the archive is unchanged this is the enumeration-time parse
    /// and the recorded ordinal. After a change the entry is looked up
    /// again by path, taking the same occurrence among entries sharing
    /// that path. An archive or entry that is gone yields
    /// [`Error::MissingSource`].
    pub(crate) fn resolve<F>(&self, entry: &ArchiveEntry, parse: F) -> Result<(Arc<Parsed<T>>, usize)>
    where
        F: FnOnce() -> Result<(Vec<ArchiveEntry>, T)>,
    {
        let fingerprint =
            Fingerprint::of(&self.source).map_err(|e| self.missing_or_io(entry, e))?;

        let parsed = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            match current.as_ref() {
                Some(parsed) if parsed.fingerprint == fingerprint => Arc::clone(parsed),
                _ => {
                    debug!("{} changed since it was read, parsing again", self.source.display());
                    let (entries, state) = parse().map_err(|e| match e {
                        Error::Io(io) => self.missing_or_io(entry, io),
                        other => other,
                    })?;
                    let parsed = Arc::new(Parsed {
                        fingerprint,
                        enumerated: false,
                        paths: entries.into_iter().map(|entry| entry.path).collect(),
                        state,
                    });
                    *current = Some(Arc::clone(&parsed));
                    parsed
                }
            }
        };

        if parsed.enumerated && parsed.paths.get(entry.index) == Some(&entry.path) {
            return Ok((parsed, entry.index));
        }

        let occurrence = {
            let listed = self.listed.lock().unwrap_or_else(PoisonError::into_inner);
            let end = entry.index.min(listed.len());
            listed[..end].iter().filter(|path| **path == entry.path).count()
        };
        let index = parsed
            .paths
            .iter()
            .enumerate()
            .filter(|(_, path)| **path == entry.path)
            .nth(occurrence)
            .map(|(index, _)| index)
            .ok_or_else(|| self.missing(entry, "entry not found in archive"))?;

        Ok((parsed, index))
    }

    pub(crate) fn missing(&self, entry: &ArchiveEntry, reason: impl Into<String>) -> Error {
        Error::MissingSource {
            path: self.source.join(&entry.path),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_or_io(&self, entry: &ArchiveEntry, err: io::Error) -> Error {
        if err.kind() == io::ErrorKind::NotFound {
            self.missing(entry, err.to_string())
        } else {
            Error::Io(err)
        }
    }
}
