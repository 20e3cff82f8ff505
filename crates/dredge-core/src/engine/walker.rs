//! Discovery of top-level archives

use super::task::ArchiveTask;
use super::Shared;
use crate::archive::sniff;
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

/// Walk `root` once and submit an [`ArchiveTask`] for every archive found.
///
/// The file list is collected before the first submission, so output of
/// tasks that are already running is never picked up as a top-level
/// archive. Returns the number of archives submitted, without waiting
/// for them.
pub(crate) fn submit_archives(shared: &Arc<Shared>, root: &Path) -> Result<usize> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    debug!(files = files.len(), "Scanned {}", root.display());

    let mut submitted = 0;
    for path in files {
        let Some(kind) = sniff(&path)? else {
            continue;
        };
        debug!("Found {} archive: {}", kind, path.display());
        shared.submit_archive(ArchiveTask {
            source: path,
            kind,
            recursive: shared.options.recursive,
        });
        submitted += 1;
    }

    Ok(submitted)
}
