//! Archive formats: detection, enumeration and single-entry extraction

mod cache;
pub mod sniff;
pub mod tar_reader;
pub mod zip_reader;

pub use sniff::sniff;
pub use tar_reader::TarReader;
pub use zip_reader::ZipReader;

use crate::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Compression wrapped around a tar stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TarCompression {
    None,
    Gzip,
    Xz,
    Zstd,
}

/// The archive formats dredge knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Zip,
    Tar(TarCompression),
}

impl ArchiveKind {
    /// Short format name, as used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::Tar(TarCompression::None) => "tar",
            ArchiveKind::Tar(TarCompression::Gzip) => "tar.gz",
            ArchiveKind::Tar(TarCompression::Xz) => "tar.xz",
            ArchiveKind::Tar(TarCompression::Zstd) => "tar.zst",
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Entry in an archive, captured when the archive is enumerated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position among the archive's records, which tells apart entries
    /// that share a name
    pub index: usize,
    /// Name exactly as stored in the archive
    pub name: String,
    /// Path relative to the extraction folder
    pub path: PathBuf,
    /// Whether this is a directory
    pub is_dir: bool,
    /// Uncompressed size in bytes
    pub size: u64,
}

/// What extracting one entry did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The entry was written to its target
    Written,
    /// Nothing was written, for the given reason
    Skipped(String),
}

/// An opened archive.
///
/// Readers are shared by every file task of one archive, so
/// `extract_entry` may be called concurrently from several threads.
pub trait ArchiveReader: Send + Sync {
    /// Path of the archive on disk
    fn source(&self) -> &Path;

    /// Format of the archive
    fn kind(&self) -> ArchiveKind;

    /// Snapshot of every entry in the archive
    fn entries(&self) -> Result<Vec<ArchiveEntry>>;

    /// Extract a single entry to `target`.
    ///
    /// Returns [`crate::Error::MissingSource`] when the entry (or the
    /// archive itself) is no longer present.
    fn extract_entry(&self, entry: &ArchiveEntry, target: &Path) -> Result<Extraction>;
}

/// Opens archive readers for the engine
pub trait ArchiveOpener: Send + Sync {
    fn open(&self, source: &Path, kind: ArchiveKind) -> Result<Arc<dyn ArchiveReader>>;
}

/// Opener backed by the zip and tar readers of this crate
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardOpener;

impl ArchiveOpener for StandardOpener {
    fn open(&self, source: &Path, kind: ArchiveKind) -> Result<Arc<dyn ArchiveReader>> {
        open(source, kind)
    }
}

/// Open the archive at `source` with the reader for `kind`
pub fn open(source: &Path, kind: ArchiveKind) -> Result<Arc<dyn ArchiveReader>> {
    let reader: Arc<dyn ArchiveReader> = match kind {
        ArchiveKind::Zip => Arc::new(ZipReader::open(source)?),
        ArchiveKind::Tar(compression) => Arc::new(TarReader::open(source, compression)?),
    };
    Ok(reader)
}
