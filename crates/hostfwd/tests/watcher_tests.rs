//! Staging watcher tests against a real directory.

use hostfwd::watcher::{IngestEvent, IngestWatcher};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_missing_root_is_created() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("not/yet/there");
    let (tx, _rx) = mpsc::unbounded_channel();

    let _watcher = IngestWatcher::new(&root, tx).unwrap();
    assert!(root.is_dir());
}

#[tokio::test]
async fn test_staged_write_is_reported() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("images");
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _watcher = IngestWatcher::new(&root, tx).unwrap();

    fs::create_dir_all(root.join("abc")).unwrap();
    fs::write(root.join("abc/fw.squashfs"), b"firmware").unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("watcher should report the staged image");
    assert_eq!(event, Some(IngestEvent::Changed));
}
