//! Payload lookup inside an image's staging directory.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Find the payload file directly under `dir`.
///
/// Only regular files whose extension equals `extension` are considered.
/// If several match, the lexicographically smallest path wins so the
/// choice never depends on directory enumeration order.
pub fn locate_payload(dir: &Path, extension: &str) -> Option<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read staging dir {}: {}", dir.display(), e);
            return None;
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == extension).unwrap_or(false))
        .collect();

    if candidates.len() > 1 {
        debug!(
            "{} payload candidates in {}, picking the first by name",
            candidates.len(),
            dir.display()
        );
    }
    candidates.sort();
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_single_payload() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("pnor.toc"), "version=1").unwrap();
        fs::write(temp.path().join("x.squashfs"), b"payload").unwrap();

        let found = locate_payload(temp.path(), "squashfs").unwrap();
        assert_eq!(found, temp.path().join("x.squashfs"));
    }

    #[test]
    fn test_no_payload() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("image.bin"), b"payload").unwrap();
        assert_eq!(locate_payload(temp.path(), "squashfs"), None);
    }

    #[test]
    fn test_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert_eq!(locate_payload(&temp.path().join("gone"), "squashfs"), None);
    }

    #[test]
    fn test_tie_break_is_lexicographic() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.squashfs"), b"b").unwrap();
        fs::write(temp.path().join("a.squashfs"), b"a").unwrap();
        fs::write(temp.path().join("c.squashfs"), b"c").unwrap();

        let found = locate_payload(temp.path(), "squashfs").unwrap();
        assert_eq!(found, temp.path().join("a.squashfs"));
    }

    #[test]
    fn test_directories_are_skipped() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("a.squashfs")).unwrap();
        fs::write(temp.path().join("b.squashfs"), b"b").unwrap();

        let found = locate_payload(temp.path(), "squashfs").unwrap();
        assert_eq!(found, temp.path().join("b.squashfs"));
    }
}
