//! Filesystem utilities shared by the store, refs and working tree.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::TwigResult;

/// Write data to a file atomically using temp-file-then-rename.
///
/// The temp file is synced before the rename so a crash leaves either the
/// old contents or the new ones.
pub fn atomic_write(path: &Path, data: &[u8]) -> TwigResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_data()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Sorted names of the plain files directly inside `dir`.
///
/// A missing directory has no files.
pub fn list_file_names(dir: &Path) -> TwigResult<Vec<String>> {
    list_names(dir, |t| t.is_file())
}

/// Sorted names of the subdirectories directly inside `dir`.
pub fn list_subdir_names(dir: &Path) -> TwigResult<Vec<String>> {
    list_names(dir, |t| t.is_dir())
}

fn list_names(dir: &Path, keep: impl Fn(&fs::FileType) -> bool) -> TwigResult<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if keep(&entry.file_type()?) {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Remove empty directories walking up from `dir` to `stop_at` (exclusive).
pub fn remove_empty_dirs(dir: &Path, stop_at: &Path) -> std::io::Result<()> {
    let mut current = dir.to_path_buf();
    while current != stop_at && current.starts_with(stop_at) {
        if fs::read_dir(&current)?.next().is_none() {
            fs::remove_dir(&current)?;
        } else {
            break;
        }
        match current.parent() {
            Some(p) => current = p.to_path_buf(),
            None => break,
        }
    }
    Ok(())
}
