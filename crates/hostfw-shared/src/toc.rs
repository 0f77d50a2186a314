//! Table-of-contents reader and version ids.
//!
//! The TOC is a plain `key=value` file shipped next to the payload.
//! Only `version` and `extended_version` are consumed.

use sha2::{Digest, Sha512};
use std::fs;
use std::io;
use std::path::Path;

/// Values read from a TOC. Missing keys are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocValues {
    pub version: String,
    pub extended_version: String,
}

impl TocValues {
    pub fn is_complete(&self) -> bool {
        !self.version.is_empty() && !self.extended_version.is_empty()
    }
}

pub fn parse_toc(content: &str) -> TocValues {
    let mut values = TocValues::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "version" => values.version = value.trim().to_string(),
            "extended_version" => values.extended_version = value.trim().to_string(),
            _ => {}
        }
    }
    values
}

pub fn read_toc(path: &Path) -> io::Result<TocValues> {
    let content = fs::read_to_string(path)?;
    Ok(parse_toc(&content))
}

/// First 8 hex digits of the SHA-512 of `version`. `None` for an empty
/// version string.
pub fn version_id(version: &str) -> Option<String> {
    if version.is_empty() {
        return None;
    }
    let digest = Sha512::digest(version.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(8);
    Some(id)
}
