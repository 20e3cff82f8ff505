//! Archive trees on scratch disk for the dredge test suites
//!
//! [`TestDir`] owns a temporary directory that tests populate with
//! archives through the [`fixtures`] builders and inspect with the
//! [`assertions`] helpers once a run has finished.

use anyhow::{Context, Result};
use fixtures::{Compression, Entry};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub mod assertions;
pub mod fixtures;

/// Folder suffix the engine uses unless told otherwise
pub const DEFAULT_SUFFIX: &str = "-extracted";

/// A directory tree to run extractions in; removed on drop.
///
/// `root()` is the canonical form of `path()`. Event paths reported by the
/// engine are canonical, so compare those against `root()`.
pub struct TestDir {
    dir: TempDir,
    root: PathBuf,
}

impl TestDir {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let root = dir
            .path()
            .canonicalize()
            .context("canonicalizing temporary directory")?;
        Ok(Self { dir, root })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write `content` to `name`, creating parent directories
    pub fn create_file(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn create_dir(&self, name: &str) -> Result<PathBuf> {
        let path = self.join(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Build a zip archive at `name`
    pub fn zip(&self, name: &str, entries: &[Entry<'_>]) -> Result<PathBuf> {
        fixtures::write_zip(&self.join(name), entries)
    }

    /// Build a tar archive at `name`
    pub fn tar(&self, name: &str, entries: &[Entry<'_>], compression: Compression) -> Result<PathBuf> {
        fixtures::write_tar(&self.join(name), entries, compression)
    }

    /// Canonical extraction folder of the archive at `name`
    pub fn extracted(&self, name: &str) -> PathBuf {
        self.extracted_with(name, DEFAULT_SUFFIX)
    }

    pub fn extracted_with(&self, name: &str, suffix: &str) -> PathBuf {
        self.root.join(format!("{name}{suffix}"))
    }
}
