//! Directory scanner for FITS files.

use crate::Result;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// File extensions recognized as FITS images (case-insensitive).
pub const FITS_EXTENSIONS: [&str; 3] = ["fits", "fit", "fts"];

/// Returns true if `path` has a FITS extension.
#[must_use]
pub fn is_fits_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FITS_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Recursively finds FITS files under `dir`, sorted by path.
///
/// # Errors
/// Returns an error if a directory cannot be read.
pub fn discover_fits_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.as_ref().to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_fits_path(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    debug!(
        "Found {} FITS files under {}",
        found.len(),
        dir.as_ref().display()
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_discover_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("night2");
        fs::create_dir(&nested).unwrap();

        for name in ["b.fits", "a.FIT", "notes.txt", "c.fts.gz"] {
            File::create(dir.path().join(name)).unwrap();
        }
        File::create(nested.join("z.fts")).unwrap();

        let files = discover_fits_files(dir.path()).unwrap();
        let names: Vec<PathBuf> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.FIT"),
                PathBuf::from("b.fits"),
                PathBuf::from("night2/z.fts"),
            ]
        );
    }

    #[test]
    fn test_missing_directory() {
        assert!(discover_fits_files("/definitely/not/here").is_err());
    }
}
