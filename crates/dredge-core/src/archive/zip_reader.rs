//! Zip reader implementation

use super::cache::ParseCache;
use super::{ArchiveEntry, ArchiveKind, ArchiveReader, Extraction};
use crate::Result;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use zip::result::ZipError;
use zip::ZipArchive;

/// Parsed archives not currently in use by a file task
struct ZipHandles {
    idle: Mutex<Vec<ZipArchive<File>>>,
}

impl ZipHandles {
    fn take(&self) -> Option<ZipArchive<File>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop()
    }

    fn give_back(&self, archive: ZipArchive<File>) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(archive);
    }
}

/// Reader for zip archives.
///
/// The central directory is parsed once at enumeration. Concurrent file
/// tasks each borrow a parsed archive with its own file cursor, and a new
/// one is parsed only when every existing one is busy.
pub struct ZipReader {
    source: PathBuf,
    cache: ParseCache<ZipHandles>,
}

impl ZipReader {
    /// Open a zip archive, validating its central directory
    pub fn open(source: &Path) -> Result<Self> {
        ZipArchive::new(File::open(source)?)?;
        Ok(Self {
            source: source.to_path_buf(),
            cache: ParseCache::new(source),
        })
    }

    fn scan(&self) -> Result<(Vec<ArchiveEntry>, ZipHandles)> {
        let mut archive = ZipArchive::new(File::open(&self.source)?)?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let file = archive.by_index(index)?;
            let name = file.name().to_string();
            // Unsafe names keep their raw form and are rejected when resolved
            let path = file
                .enclosed_name()
                .unwrap_or_else(|| PathBuf::from(&name));

            entries.push(ArchiveEntry {
                index,
                path,
                is_dir: file.is_dir(),
                size: file.size(),
                name,
            });
        }

        Ok((
            entries,
            ZipHandles {
                idle: Mutex::new(vec![archive]),
            },
        ))
    }
}

impl ArchiveReader for ZipReader {
    fn source(&self) -> &Path {
        &self.source
    }

    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Zip
    }

    fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        self.cache.enumerate(|| self.scan())
    }

    fn extract_entry(&self, entry: &ArchiveEntry, target: &Path) -> Result<Extraction> {
        let (parsed, index) = self.cache.resolve(entry, || self.scan())?;
        let handles = &parsed.state;

        let mut archive = match handles.take() {
            Some(archive) => archive,
            None => {
                let file =
                    File::open(&self.source).map_err(|e| self.cache.missing_or_io(entry, e))?;
                ZipArchive::new(file)?
            }
        };

        {
            let mut zip_file = match archive.by_index(index) {
                Ok(zip_file) => zip_file,
                Err(ZipError::FileNotFound) => {
                    return Err(self.cache.missing(entry, "entry not found in archive"));
                }
                Err(e) => return Err(e.into()),
            };

            if zip_file.is_dir() {
                fs::create_dir_all(target)?;
            } else {
                let mut output_file = File::create(target)?;
                io::copy(&mut zip_file, &mut output_file)?;
            }

            #[cfg(unix)]
            {
                if let Some(mode) = zip_file.unix_mode() {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o777))?;
                }
            }
        }

        handles.give_back(archive);
        Ok(Extraction::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in files {
            if name.ends_with('/') {
                writer
                    .add_directory(*name, SimpleFileOptions::default())
                    .unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_entries_use_stored_names() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("test.zip");
        write_zip(&archive, &[("sub/", b""), ("sub/b.txt", b"bee")]);

        let reader = ZipReader::open(&archive).unwrap();
        let entries = reader.entries().unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_dir);
        assert_eq!(entries[1].name, "sub/b.txt");
        assert_eq!(entries[1].path, PathBuf::from("sub/b.txt"));
        assert_eq!(entries[1].size, 3);
    }

    #[test]
    fn test_extract_single_entry() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("test.zip");
        write_zip(&archive, &[("a.txt", b"alpha")]);

        let reader = ZipReader::open(&archive).unwrap();
        let entries = reader.entries().unwrap();
        let target = temp_dir.path().join("out.txt");

        assert_eq!(
            reader.extract_entry(&entries[0], &target).unwrap(),
            Extraction::Written
        );
        assert_eq!(fs::read(&target).unwrap(), b"alpha");
    }

    #[test]
    fn test_concurrent_extractions_share_one_parse() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("many.zip");
        let files: Vec<(String, Vec<u8>)> = (0..64)
            .map(|i| (format!("f{i}.txt"), format!("content {i}").into_bytes()))
            .collect();
        let borrowed: Vec<(&str, &[u8])> = files
            .iter()
            .map(|(name, data)| (name.as_str(), data.as_slice()))
            .collect();
        write_zip(&archive, &borrowed);

        let reader = ZipReader::open(&archive).unwrap();
        let entries = reader.entries().unwrap();
        std::thread::scope(|scope| {
            for chunk in entries.chunks(16) {
                let reader = &reader;
                let out = temp_dir.path();
                scope.spawn(move || {
                    for entry in chunk {
                        reader.extract_entry(entry, &out.join(&entry.name)).unwrap();
                    }
                });
            }
        });

        for (name, data) in &files {
            assert_eq!(&fs::read(temp_dir.path().join(name)).unwrap(), data);
        }
    }

    #[test]
    fn test_entries_are_extracted_by_position() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("test.zip");
        write_zip(&archive, &[("a.txt", b"alpha"), ("b.txt", b"beta")]);

        let reader = ZipReader::open(&archive).unwrap();
        let mut entries = reader.entries().unwrap();
        // The ordinal, not the stored name, selects the record
        entries[1].name = "a.txt".to_string();
        let target = temp_dir.path().join("second");
        reader.extract_entry(&entries[1], &target).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"beta");
    }

    #[test]
    fn test_entry_removed_after_enumeration_is_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("test.zip");
        write_zip(&archive, &[("a.txt", b"alpha"), ("gone.txt", b"soon")]);

        let reader = ZipReader::open(&archive).unwrap();
        let entries = reader.entries().unwrap();
        write_zip(&archive, &[("a.txt", b"alpha")]);

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
        let archive = temp_dir.path().join("test.zip");
        write_zip(&archive, &[("a.txt", b"alpha")]);

        let reader = ZipReader::open(&archive).unwrap();
        let entries = reader.entries().unwrap();
        fs::remove_file(&archive).unwrap();

        let err = reader
            .extract_entry(&entries[0], &temp_dir.path().join("a.txt"))
            .unwrap_err();
        assert!(err.is_missing_source());
    }

    #[test]
    fn test_open_rejects_non_zip() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("fake.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        assert!(matches!(ZipReader::open(&archive), Err(Error::Zip(_))));
    }
}
