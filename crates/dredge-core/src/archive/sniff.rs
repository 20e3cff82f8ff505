//! Content-based archive detection

use super::tar_reader::decoder;
use super::{ArchiveKind, TarCompression};
use crate::Result;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

const TAR_BLOCK: usize = 512;
const CHECKSUM_FIELD: std::ops::Range<usize> = 148..156;

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

/// Detect whether the file at `path` is an archive, and which kind.
///
/// Detection looks at content only, never at the file name. Zip is
/// recognised by its leading signature, so a tar that happens to end
/// with a zip member is still reported as a tar.
pub fn sniff(path: &Path) -> Result<Option<ArchiveKind>> {
    let head = read_head(File::open(path)?)?;

    if head.starts_with(ZIP_LOCAL_HEADER) || head.starts_with(ZIP_EMPTY_ARCHIVE) {
        if ZipArchive::new(File::open(path)?).is_ok() {
            return Ok(Some(ArchiveKind::Zip));
        }
        debug!("{} has a zip signature but no valid central directory", path.display());
        return Ok(None);
    }

    if is_tar_header(&head) {
        return Ok(Some(ArchiveKind::Tar(TarCompression::None)));
    }

    let compression = if head.starts_with(GZIP_MAGIC) {
        TarCompression::Gzip
    } else if head.starts_with(XZ_MAGIC) {
        TarCompression::Xz
    } else if head.starts_with(ZSTD_MAGIC) {
        TarCompression::Zstd
    } else {
        return Ok(None);
    };

    // A compressed stream is only an archive if it decompresses to a tar
    let decoded = decoder(File::open(path)?, compression).and_then(read_head);
    match decoded {
        Ok(block) if is_tar_header(&block) => Ok(Some(ArchiveKind::Tar(compression))),
        Ok(_) => Ok(None),
        Err(e) => {
            debug!("{} is not a readable {:?} stream: {}", path.display(), compression, e);
            Ok(None)
        }
    }
}

fn read_head<R: Read>(reader: R) -> Result<Vec<u8>> {
    let mut head = Vec::with_capacity(TAR_BLOCK);
    reader.take(TAR_BLOCK as u64).read_to_end(&mut head)?;
    Ok(head)
}

/// Whether `block` is a tar header with a valid checksum
fn is_tar_header(block: &[u8]) -> bool {
    if block.len() < TAR_BLOCK || block.iter().all(|&b| b == 0) {
        return false;
    }
    let Some(stored) = parse_octal(&block[CHECKSUM_FIELD]) else {
        return false;
    };

    // The checksum is computed with its own field filled with spaces. Some
    // old writers summed signed bytes, so accept either.
    let mut unsigned: i64 = 0;
    let mut signed: i64 = 0;
    for (i, &byte) in block[..TAR_BLOCK].iter().enumerate() {
        let byte = if CHECKSUM_FIELD.contains(&i) { b' ' } else { byte };
        unsigned += i64::from(byte);
        signed += i64::from(byte as i8);
    }

    stored == unsigned || stored == signed
}

fn parse_octal(field: &[u8]) -> Option<i64> {
    let digits: Vec<u8> = field
        .iter()
        .copied()
        .skip_while(|&b| b == b' ')
        .take_while(|&b| b != 0 && b != b' ')
        .collect();
    if digits.is_empty() {
        return None;
    }
    let text = std::str::from_utf8(&digits).ok()?;
    i64::from_str_radix(text, 8).ok()
}
