//! Tests for toc.rs and job.rs against files on disk

use hostfw_shared::job::{DEFAULT_UNIT_PREFIX, DEFAULT_UNIT_SUFFIX};
use hostfw_shared::toc::{read_toc, version_id};
use hostfw_shared::JobName;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_read_toc_from_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("pnor.toc");
    fs::write(&path, "version=open-power-2.7\nextended_version=hostboot-1,occ-2\n").unwrap();

    let toc = read_toc(&path).unwrap();
    assert_eq!(toc.version, "open-power-2.7");
    assert_eq!(toc.extended_version, "hostboot-1,occ-2");
    assert_eq!(version_id(&toc.version).unwrap().len(), 8);
}

#[test]
fn test_read_toc_missing_file() {
    let temp = TempDir::new().unwrap();
    let err = read_toc(&temp.path().join("nope.toc")).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}

#[test]
fn test_job_name_reproducible() {
    let path = Path::new("/img/1/payload.squashfs");
    let first = JobName::for_payload(DEFAULT_UNIT_PREFIX, path, DEFAULT_UNIT_SUFFIX);
    let second = JobName::for_payload(DEFAULT_UNIT_PREFIX, path, DEFAULT_UNIT_SUFFIX);
    assert_eq!(first, second);
    assert_eq!(
        first.as_str(),
        "openpower-host-fw-update@-img-1-payload.squashfs.service"
    );
}
