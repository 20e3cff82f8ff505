//! Archive fixtures for dredge testing

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// One record to put into a fixture archive
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    /// A regular file with its content
    File(&'a str, &'a [u8]),
    /// A directory; a trailing slash is optional
    Dir(&'a str),
    /// A symbolic link: name, then target
    Symlink(&'a str, &'a str),
    /// A tar hard link: name, then the earlier entry it links to
    HardLink(&'a str, &'a str),
}

/// Compression applied around a fixture tar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Xz,
    Zstd,
}

/// Builds an in-memory zip archive
pub fn zip_bytes(entries: &[Entry<'_>]) -> Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for entry in entries {
        match entry {
            Entry::File(name, content) => {
                writer.start_file(*name, SimpleFileOptions::default())?;
                writer.write_all(content)?;
            }
            Entry::Dir(name) => {
                writer.add_directory(name.trim_end_matches('/'), SimpleFileOptions::default())?;
            }
            Entry::Symlink(name, target) => {
                writer.add_symlink(*name, *target, SimpleFileOptions::default())?;
            }
            Entry::HardLink(name, _) => {
                anyhow::bail!("zip archives cannot hold hard link {}", name);
            }
        }
    }

    Ok(writer.finish()?.into_inner())
}

/// Builds an in-memory tar archive, optionally compressed
pub fn tar_bytes(entries: &[Entry<'_>], compression: Compression) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());

    for entry in entries {
        let mut header = tar::Header::new_gnu();
        match entry {
            Entry::File(name, content) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(content.len() as u64);
                header.set_mode(0o644);
                builder.append_data(&mut header, name, *content)?;
            }
            Entry::Dir(name) => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                builder.append_data(&mut header, name, std::io::empty())?;
            }
            Entry::Symlink(name, target) | Entry::HardLink(name, target) => {
                let entry_type = if matches!(entry, Entry::Symlink(..)) {
                    tar::EntryType::Symlink
                } else {
                    tar::EntryType::Link
                };
                header.set_entry_type(entry_type);
                header.set_size(0);
                header.set_mode(0o777);
                header.set_link_name(target)?;
                builder.append_data(&mut header, name, std::io::empty())?;
            }
        }
    }

    compress(builder.into_inner()?, compression)
}

fn compress(tar: Vec<u8>, compression: Compression) -> Result<Vec<u8>> {
    Ok(match compression {
        Compression::None => tar,
        Compression::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&tar)?;
            encoder.finish()?
        }
        Compression::Xz => {
            let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
            encoder.write_all(&tar)?;
            encoder.finish()?
        }
        Compression::Zstd => zstd::stream::encode_all(tar.as_slice(), 3)?,
    })
}

/// Writes a zip archive to `path`
pub fn write_zip(path: &Path, entries: &[Entry<'_>]) -> Result<PathBuf> {
    write_bytes(path, &zip_bytes(entries)?)
}

/// Writes a tar archive to `path`
pub fn write_tar(path: &Path, entries: &[Entry<'_>], compression: Compression) -> Result<PathBuf> {
    write_bytes(path, &tar_bytes(entries, compression)?)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(path.to_path_buf())
}

/// File name of level `level` of a nested chain (zip on odd levels, tar on even)
pub fn chain_name(level: usize) -> String {
    if level % 2 == 1 {
        format!("level{}.zip", level)
    } else {
        format!("level{}.tar", level)
    }
}

/// Content of the file at the bottom of a nested chain
pub const CHAIN_LEAF: &[u8] = b"bottom of the chain";

/// Writes `level1` into `dir`, where each level contains the next one and
/// the deepest level contains `leaf.txt`.
pub fn write_nested_chain(dir: &Path, depth: usize) -> Result<PathBuf> {
    assert!(depth >= 1, "a chain needs at least one archive");

    let mut inner: Option<(String, Vec<u8>)> = None;
    for level in (1..=depth).rev() {
        let entries = match &inner {
            Some((name, bytes)) => vec![Entry::File(name, bytes)],
            None => vec![Entry::File("leaf.txt", CHAIN_LEAF)],
        };
        let bytes = if level % 2 == 1 {
            zip_bytes(&entries)?
        } else {
            tar_bytes(&entries, Compression::None)?
        };
        inner = Some((chain_name(level), bytes));
    }

    let (name, bytes) = inner.ok_or_else(|| anyhow::anyhow!("empty chain"))?;
    write_bytes(&dir.join(name), &bytes)
}

/// Where `leaf.txt` of a chain written by [`write_nested_chain`] ends up
/// after a recursive run.
pub fn chain_leaf_path(dir: &Path, depth: usize, suffix: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    for level in 1..=depth {
        path.push(format!("{}{}", chain_name(level), suffix));
    }
    path.join("leaf.txt")
}
