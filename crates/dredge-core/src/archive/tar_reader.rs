//! Tar reader implementation

use super::cache::ParseCache;
use super::{ArchiveEntry, ArchiveKind, ArchiveReader, Extraction, TarCompression};
use crate::security::check_link_target;
use crate::Result;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tar::{Archive, Entry, EntryType};
use tempfile::NamedTempFile;
use tracing::debug;
use xz2::read::XzDecoder;
use zstd::stream::read::Decoder as ZstdDecoder;

const BLOCK: u64 = 512;

/// Wrap `file` in the decoder for `compression`
pub(crate) fn decoder(file: File, compression: TarCompression) -> Result<Box<dyn Read>> {
    match compression {
        TarCompression::None => Ok(Box::new(file)),
        TarCompression::Gzip => Ok(Box::new(GzDecoder::new(file))),
        TarCompression::Xz => Ok(Box::new(XzDecoder::new(file))),
        TarCompression::Zstd => Ok(Box::new(ZstdDecoder::new(file)?)),
    }
}

/// Record offsets of one tar stream
struct TarIndex {
    /// Decompressed copy of a compressed archive; plain tars are read in place
    spool: Option<NamedTempFile>,
    /// Where the header blocks of each record start
    offsets: Vec<u64>,
}

/// Reader for plain and compressed tar archives.
///
/// The archive is scanned once and every record's offset is kept, so an
/// extraction seeks straight to its record. A compressed archive is
/// decompressed a single time into a temporary file that the extractions
/// then seek in.
pub struct TarReader {
    source: PathBuf,
    compression: TarCompression,
    cache: ParseCache<TarIndex>,
}

impl TarReader {
    /// Open a tar archive
    pub fn open(source: &Path, compression: TarCompression) -> Result<Self> {
        // Fail here rather than in every file task if the archive is unreadable
        File::open(source)?;
        Ok(Self {
            source: source.to_path_buf(),
            compression,
            cache: ParseCache::new(source),
        })
    }

    fn scan(&self) -> Result<(Vec<ArchiveEntry>, TarIndex)> {
        let (file, spool) = match self.compression {
            TarCompression::None => (File::open(&self.source)?, None),
            compression => {
                let mut spool = NamedTempFile::new()?;
                let mut stream = decoder(File::open(&self.source)?, compression)?;
                io::copy(&mut stream, spool.as_file_mut())?;
                debug!(
                    "Decompressed {} into {}",
                    self.source.display(),
                    spool.path().display()
                );
                (spool.reopen()?, Some(spool))
            }
        };

        let mut archive = Archive::new(file);
        let mut entries = Vec::new();
        let mut offsets = Vec::new();
        let mut next = 0;

        for (index, record) in archive.entries()?.enumerate() {
            let record = record?;
            let header = record.header();

            // Extension headers (long names, pax) sit between the end of the
            // previous record and this one, so start from there
            offsets.push(next);
            next = (record.raw_file_position() + header.entry_size()?).div_ceil(BLOCK) * BLOCK;

            let path = record.path()?.into_owned();
            entries.push(ArchiveEntry {
                index,
                name: path.to_string_lossy().into_owned(),
                path,
                is_dir: header.entry_type().is_dir(),
                size: header.size()?,
            });
        }

        Ok((entries, TarIndex { spool, offsets }))
    }
}

impl ArchiveReader for TarReader {
    fn source(&self) -> &Path {
        &self.source
    }

    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Tar(self.compression)
    }

    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        self.cache.enumerate(|| self.scan())
    }

    fn extract_entry(&self, entry: &ArchiveEntry, target: &Path) -> Result<Extraction> {
        let (parsed, index) = self.cache.resolve(entry, || self.scan())?;
        let index_state = &parsed.state;
        let offset = *index_state
            .offsets
            .get(index)
            .ok_or_else(|| self.cache.missing(entry, "entry not found in archive"))?;

        let mut file = match &index_state.spool {
            Some(spool) => spool.reopen()?,
            None => File::open(&self.source).map_err(|e| self.cache.missing_or_io(entry, e))?,
        };
        file.seek(SeekFrom::Start(offset))?;

        let mut archive = Archive::new(file);
        let mut records = archive.entries()?;
        let mut record = match records.next() {
            Some(record) => record?,
            None => return Err(self.cache.missing(entry, "entry not found in archive")),
        };

        let entry_type = record.header().entry_type();
        match entry_type {
            EntryType::Directory => {
                fs::create_dir_all(target)?;
                Ok(Extraction::Written)
            }
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                record.unpack(target)?;
                Ok(Extraction::Written)
            }
            EntryType::Symlink => {
                let Some(link) = record.link_name()?.map(|link| link.into_owned()) else {
                    return Ok(Extraction::Skipped("symlink without a target".to_string()));
                };
                check_link_target(&entry.path, &link)?;
                unpack_symlink(&mut record, target)
            }
            other => Ok(Extraction::Skipped(format!(
                "{:?} entries are not extracted",
                other
            ))),
        }
    }
}

#[cfg(unix)]
fn unpack_symlink<R: Read>(record: &mut Entry<'_, R>, target: &Path) -> Result<Extraction> {
    record.unpack(target)?;
    Ok(Extraction::Written)
}

#[cfg(not(unix))]
fn unpack_symlink<R: Read>(_record: &mut Entry<'_, R>, _target: &Path) -> Result<Extraction> {
    Ok(Extraction::Skipped(
        "symlinks are not supported on this platform".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::io::Write;
    use tempfile::TempDir;

    fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(EntryType::Regular);
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn write_tar(path: &Path, files: &[(&str, &[u8])]) {
        fs::write(path, tar_bytes(files)).unwrap();
    }

    fn link_header(entry_type: EntryType, link: &str) -> tar::Header {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(entry_type);
        header.set_size(0);
        header.set_mode(0o777);
        header.set_link_name(link).unwrap();
        header
    }

    #[test]
    fn test_entries_use_header_paths() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("test.tar");
        write_tar(&archive, &[("a.txt", b"a"), ("sub/b.txt", b"bb")]);

        let reader = TarReader::open(&archive, TarCompression::None).unwrap();
        let entries = reader.entries().unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].index, 1);
        assert_eq!(entries[1].path, PathBuf::from("sub/b.txt"));
        assert_eq!(entries[1].size, 2);
        assert!(!entries[1].is_dir);
    }

    #[test]
    fn test_extract_single_entry() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("test.tar");
        write_tar(&archive, &[("a.txt", b"alpha"), ("b.txt", b"beta")]);

        let reader = TarReader::open(&archive, TarCompression::None).unwrap();
        let entries = reader.entries().unwrap();
        let target = temp_dir.path().join("b.txt");

        assert_eq!(
            reader.extract_entry(&entries[1], &target).unwrap(),
            Extraction::Written
        );
        assert_eq!(fs::read(&target).unwrap(), b"beta");
        assert!(!temp_dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_duplicate_names_extract_their_own_record() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("dupes.tar");
        write_tar(&archive, &[("f.txt", b"old"), ("f.txt", b"new")]);

        let reader = TarReader::open(&archive, TarCompression::None).unwrap();
        let entries = reader.entries().unwrap();
        let first = temp_dir.path().join("first");
        let second = temp_dir.path().join("second");
        reader.extract_entry(&entries[0], &first).unwrap();
        reader.extract_entry(&entries[1], &second).unwrap();

        assert_eq!(fs::read(&first).unwrap(), b"old");
        assert_eq!(fs::read(&second).unwrap(), b"new");
    }

    #[test]
    fn test_long_names_and_compressed_records() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("long.tar.gz");
        let long_name = format!("{}/deep.txt", "d".repeat(150));
        let tar = tar_bytes(&[("a.txt", b"alpha"), (&long_name, b"deep"), ("z.txt", b"zed")]);
        let mut encoder =
            flate2::write::GzEncoder::new(File::create(&archive).unwrap(), flate2::Compression::default());
        encoder.write_all(&tar).unwrap();
        encoder.finish().unwrap();

        let reader = TarReader::open(&archive, TarCompression::Gzip).unwrap();
        let entries = reader.entries().unwrap();
        assert_eq!(entries[1].path, PathBuf::from(&long_name));

        for (entry, expected) in entries.iter().zip([&b"alpha"[..], b"deep", b"zed"]) {
            let target = temp_dir.path().join(format!("out{}", entry.index));
            reader.extract_entry(entry, &target).unwrap();
            assert_eq!(fs::read(&target).unwrap(), expected);
        }
    }

    #[test]
    fn test_external_symlink_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("links.tar");
        let mut builder = tar::Builder::new(File::create(&archive).unwrap());
        let outside = temp_dir.path().join("outside");
        let mut header = link_header(EntryType::Symlink, outside.to_str().unwrap());
        builder.append_data(&mut header, "link", io::empty()).unwrap();
        let mut header = link_header(EntryType::Symlink, "../../escape");
        builder.append_data(&mut header, "sub/climb", io::empty()).unwrap();
        builder.finish().unwrap();
        drop(builder);

        let reader = TarReader::open(&archive, TarCompression::None).unwrap();
        let entries = reader.entries().unwrap();
        for entry in &entries {
            let target = temp_dir.path().join("out").join(&entry.path);
            let err = reader.extract_entry(entry, &target).unwrap_err();
            assert!(matches!(err, Error::InvalidPath(_)));
            assert!(fs::symlink_metadata(&target).is_err());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_internal_symlink_is_unpacked() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("links.tar");
        let mut builder = tar::Builder::new(File::create(&archive).unwrap());
        let mut header = link_header(EntryType::Symlink, "../a.txt");
        builder.append_data(&mut header, "sub/link", io::empty()).unwrap();
        builder.finish().unwrap();
        drop(builder);

        let reader = TarReader::open(&archive, TarCompression::None).unwrap();
        let entries = reader.entries().unwrap();
        let target = temp_dir.path().join("sub/link");
        fs::create_dir_all(target.parent().unwrap()).unwrap();

        assert_eq!(
            reader.extract_entry(&entries[0], &target).unwrap(),
            Extraction::Written
        );
        assert_eq!(fs::read_link(&target).unwrap(), PathBuf::from("../a.txt"));
    }

    #[test]
    fn test_hard_link_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("hard.tar");
        let mut builder = tar::Builder::new(File::create(&archive).unwrap());
        let mut header = link_header(EntryType::Link, "a.txt");
        builder.append_data(&mut header, "b.txt", io::empty()).unwrap();
        builder.finish().unwrap();
        drop(builder);

        let reader = TarReader::open(&archive, TarCompression::None).unwrap();
        let entries = reader.entries().unwrap();
        let target = temp_dir.path().join("b.txt");

        assert!(matches!(
            reader.extract_entry(&entries[0], &target).unwrap(),
            Extraction::Skipped(_)
        ));
        assert!(!target.exists());
    }

    #[test]
    fn test_entry_removed_after_enumeration_is_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("test.tar");
        write_tar(&archive, &[("a.txt", b"alpha"), ("gone.txt", b"soon")]);

        let reader = TarReader::open(&archive, TarCompression::None).unwrap();
        let entries = reader.entries().unwrap();
        write_tar(&archive, &[("a.txt", b"alpha")]);

        let err = reader
            .extract_entry(&entries[1], &temp_dir.path().join("gone.txt"))
            .unwrap_err();
        assert!(err.is_missing_source());

        let kept = temp_dir.path().join("a.txt");
        reader.extract_entry(&entries[0], &kept).unwrap();
        assert_eq!(fs::read(&kept).unwrap(), b"alpha");
    }

    #[test]
    fn test_archive_removed_after_enumeration_is_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("test.tar");
        write_tar(&archive, &[("a.txt", b"alpha")]);

        let reader = TarReader::open(&archive, TarCompression::None).unwrap();
        let entries = reader.entries().unwrap();
        fs::remove_file(&archive).unwrap();

        let err = reader
            .extract_entry(&entries[0], &temp_dir.path().join("a.txt"))
            .unwrap_err();
        assert!(err.is_missing_source());
    }
}
