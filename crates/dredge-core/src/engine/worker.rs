//! Task bodies for the archive and file pools

use super::task::{ArchiveTask, FileTask};
use super::{RunEvent, Shared};
use crate::archive::{sniff, Extraction};
use crate::security::{ensure_contained, sanitize_path};
use crate::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extraction folder for `source`: the archive path with `suffix` appended
pub fn destination_folder(source: &Path, suffix: &str) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Create the extraction folder, enumerate the archive and submit one
/// file task per entry.
pub(crate) fn process_archive(shared: &Arc<Shared>, task: ArchiveTask) -> Result<()> {
    let destination = destination_folder(&task.source, &shared.options.suffix);

    // Never merge into an existing folder
    match fs::create_dir(&destination) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(Error::DestinationExists(destination));
        }
        Err(e) => return Err(e.into()),
    }

    let reader = shared.opener.open(&task.source, task.kind)?;
    let entries = reader.entries()?;
    debug!(
        entries = entries.len(),
        "Enumerated {} archive {}",
        task.kind,
        task.source.display()
    );
    shared.stats.archive_enumerated();

    for entry in entries {
        shared.submit_file(FileTask {
            reader: Arc::clone(&reader),
            entry,
            destination: destination.clone(),
            kind: task.kind,
            recursive: task.recursive,
        });
    }

    Ok(())
}

/// Extract one entry and, when recursion is on, queue it if it turns out
/// to be an archive itself.
pub(crate) fn process_file(shared: &Arc<Shared>, task: FileTask) -> Result<()> {
    let target = sanitize_path(&task.destination, &task.entry.path)?;
    // A symlink extracted by a sibling must not redirect this entry
    ensure_contained(&task.destination, &target)?;

    // Sibling tasks race to create the same directories
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    match task.reader.extract_entry(&task.entry, &target) {
        Ok(Extraction::Written) => {}
        Ok(Extraction::Skipped(reason)) => {
            warn!("Skipped {}: {}", target.display(), reason);
            shared.stats.entry_skipped();
            shared.emit(RunEvent::Skipped {
                path: target,
                reason,
            });
            return Ok(());
        }
        Err(err) if err.is_missing_source() => {
            warn!("Failed to extract {}: {}", target.display(), err);
            shared.stats.missing_source(target.clone());
            shared.emit(RunEvent::MissingSource {
                path: target,
                reason: err.to_string(),
            });
            return Ok(());
        }
        Err(err) => return Err(err),
    }

    info!("Extracted file: {}", target.display());
    shared.stats.entry_extracted();
    shared.emit(RunEvent::Extracted {
        path: target.clone(),
    });

    if !task.recursive || !is_regular_file(&target) {
        return Ok(());
    }

    if let Some(kind) = sniff(&target)? {
        info!("Found nested {} archive: {}", kind, target.display());
        shared.stats.nested_found();
        shared.emit(RunEvent::NestedArchive {
            kind,
            path: target.clone(),
        });
        debug!(parent = task.kind.name(), "Queueing nested archive");
        shared.submit_archive(ArchiveTask {
            source: target,
            kind,
            recursive: task.recursive,
        });
    }

    Ok(())
}

fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}
