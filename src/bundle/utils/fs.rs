//! File system utilities for bundling.
//!
//! Safe copy operations with automatic parent-directory creation, plus the
//! fixed-width in-place byte patch used by the macOS relocation step.

use std::path::Path;

use anyhow::anyhow;

use crate::error::{Error, Result};

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        return Err(Error::Other(anyhow!("{from:?} does not exist")));
    }
    if !from.is_file() {
        return Err(Error::Other(anyhow!("{from:?} is not a file")));
    }
    if let Some(dest_dir) = to.parent() {
        std::fs::create_dir_all(dest_dir)?;
    }
    std::fs::copy(from, to)?;
    Ok(())
}

/// Recursively copies a directory tree, following symlinks so the bundle
/// gets plain files (system toolchains ship versioned-symlink farms).
///
/// `keep` decides per entry (path relative to `from`) whether it is copied;
/// directories it rejects are pruned whole.
pub fn copy_dir_filtered(
    from: &Path,
    to: &Path,
    keep: impl Fn(&Path, bool) -> bool,
) -> Result<()> {
    if !from.is_dir() {
        return Err(Error::Other(anyhow!("{from:?} is not a directory")));
    }
    std::fs::create_dir_all(to)?;

    let walker = walkdir::WalkDir::new(from).follow_links(true).into_iter();
    let mut it = walker.filter_entry(|entry| {
        let rel = match entry.path().strip_prefix(from) {
            Ok(rel) if rel.as_os_str().is_empty() => return true,
            Ok(rel) => rel,
            Err(_) => return true,
        };
        keep(rel, entry.file_type().is_dir())
    });
    while let Some(entry) = it.next() {
        let entry = entry.map_err(|e| Error::Other(anyhow!("walking {from:?}: {e}")))?;
        let rel = match entry.path().strip_prefix(from) {
            Ok(rel) if rel.as_os_str().is_empty() => continue,
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Recursively copies a directory tree without filtering.
pub fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    copy_dir_filtered(from, to, |_, _| true)
}

/// Replaces byte substrings in a file without changing its size.
///
/// Needle and replacement must have identical lengths so file layout and
/// offsets are preserved; a mismatch aborts before anything is written.
pub fn patch_file_bytes(path: &Path, changes: &[(&[u8], &[u8])]) -> Result<()> {
    for (from, to) in changes {
        if from.len() != to.len() {
            return Err(Error::PatchLength {
                from: String::from_utf8_lossy(from).into_owned(),
                to: String::from_utf8_lossy(to).into_owned(),
            });
        }
    }
    let mut contents = std::fs::read(path)?;
    for (from, to) in changes {
        replace_bytes(&mut contents, from, to);
    }
    std::fs::write(path, &contents)?;
    Ok(())
}

/// In-place replacement of every non-overlapping occurrence.
fn replace_bytes(haystack: &mut [u8], from: &[u8], to: &[u8]) {
    debug_assert_eq!(from.len(), to.len());
    if from.is_empty() {
        return;
    }
    let mut i = 0;
    while i + from.len() <= haystack.len() {
        if &haystack[i..i + from.len()] == from {
            haystack[i..i + from.len()].copy_from_slice(to);
            i += from.len();
        } else {
            i += 1;
        }
    }
}
