//! Source discovery for islands and pages.
//!
//! Recursively scans a directory for `.zen` files, in sorted order so builds
//! are deterministic.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::ident::SOURCE_EXTENSION;

/// Every `.zen` file under `dir`. A missing directory yields nothing; any
/// other traversal error is returned.
pub fn find_zen_files(dir: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }
        if path.extension().map(|ext| ext == SOURCE_EXTENSION).unwrap_or(false) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}
