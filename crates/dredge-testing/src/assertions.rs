//! Common assertions for dredge testing

use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Relative paths of every regular file under `dir`, sorted
pub fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.path().strip_prefix(dir)?.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Asserts that `dir` holds exactly the files in `expected`
pub fn assert_files(dir: &Path, expected: &[&str]) -> Result<()> {
    let actual = collect_files(dir)?;
    let mut expected: Vec<PathBuf> = expected.iter().map(PathBuf::from).collect();
    expected.sort();

    assert_eq!(actual, expected, "Unexpected files under {:?}", dir);
    Ok(())
}

/// Asserts that a file exists with the given content
pub fn assert_file_content(path: &Path, expected: &[u8]) -> Result<()> {
    assert!(path.is_file(), "Missing file {:?}", path);
    let content = std::fs::read(path)?;
    assert_eq!(content, expected, "Content mismatch for {:?}", path);
    Ok(())
}

/// Names of the entries directly inside `dir` that end with `suffix`
pub fn extraction_folders(dir: &Path, suffix: &str) -> Result<Vec<String>> {
    let mut folders = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() && name.ends_with(suffix) {
            folders.push(name);
        }
    }
    folders.sort();
    Ok(folders)
}
