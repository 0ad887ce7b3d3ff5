//! Content digests for hook units.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::LoaderError;

/// SHA-256 hex digest of a unit.
///
/// For a file this covers its bytes. For a directory unit it covers the
/// concatenated bytes of every file with the given extension beneath it,
/// visited in sorted pre-order so the digest is stable across platforms.
pub fn content_hash(location: &Path, extension: &str) -> Result<String, LoaderError> {
    let mut hasher = Sha256::new();

    if location.is_dir() {
        for file in source_files(location, extension)? {
            let bytes = fs::read(&file).map_err(|e| LoaderError::io(&file, e))?;
            hasher.update(&bytes);
        }
    } else {
        let bytes = fs::read(location).map_err(|e| LoaderError::io(location, e))?;
        hasher.update(&bytes);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Files beneath `dir` with the given extension, sorted pre-order.
fn source_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, LoaderError> {
    let mut files = Vec::new();
    for entry in sorted_entries(dir)? {
        if entry.is_dir() {
            files.extend(source_files(&entry, extension)?);
        } else if has_extension(&entry, extension) {
            files.push(entry);
        }
    }
    Ok(files)
}

/// Directory entries sorted by file name.
pub(crate) fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| LoaderError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LoaderError::io(dir, e))?;
    entries.sort();
    Ok(entries)
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(extension)
}
