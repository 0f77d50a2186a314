//! Flash job naming and completion events.
//!
//! A job name is derived from the payload path alone, so the same payload
//! always maps to the same unit name across restarts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const DEFAULT_UNIT_PREFIX: &str = "openpower-host-fw-update@";
pub const DEFAULT_UNIT_SUFFIX: &str = ".service";

/// Replace every path separator with `-`.
pub fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('/', "-")
}

/// Unit name of one flash attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobName(String);

impl JobName {
    pub fn for_payload(prefix: &str, payload: &Path, suffix: &str) -> Self {
        Self(format!("{}{}{}", prefix, escape_path(payload), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job-removed notification from the job runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub job_id: u32,
    pub object_path: String,
    pub unit_name: String,
    pub result: String,
}

impl CompletionEvent {
    pub fn new(job_id: u32, unit_name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            job_id,
            object_path: format!("/org/freedesktop/systemd1/job/{}", job_id),
            unit_name: unit_name.into(),
            result: result.into(),
        }
    }

    pub fn outcome(&self) -> Option<JobOutcome> {
        JobOutcome::from_result(&self.result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed,
}

impl JobOutcome {
    /// `done` succeeds, `failed` and `dependency` fail, anything else
    /// (`canceled`, `timeout`, ...) is not a terminal result for us.
    pub fn from_result(result: &str) -> Option<Self> {
        match result {
            "done" => Some(Self::Succeeded),
            "failed" | "dependency" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_path() {
        assert_eq!(
            escape_path(Path::new("/img/1/payload.squashfs")),
            "-img-1-payload.squashfs"
        );
    }

    #[test]
    fn test_job_name() {
        let job = JobName::for_payload(
            DEFAULT_UNIT_PREFIX,
            Path::new("/tmp/images/abc/x.squashfs"),
            DEFAULT_UNIT_SUFFIX,
        );
        assert_eq!(
            job.as_str(),
            "openpower-host-fw-update@-tmp-images-abc-x.squashfs.service"
        );
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(JobOutcome::from_result("done"), Some(JobOutcome::Succeeded));
        assert_eq!(JobOutcome::from_result("failed"), Some(JobOutcome::Failed));
        assert_eq!(JobOutcome::from_result("dependency"), Some(JobOutcome::Failed));
        assert_eq!(JobOutcome::from_result("canceled"), None);
        assert_eq!(JobOutcome::from_result(""), None);
    }

    #[test]
    fn test_event_object_path() {
        let ev = CompletionEvent::new(7, "unit.service", "done");
        assert_eq!(ev.object_path, "/org/freedesktop/systemd1/job/7");
        assert_eq!(ev.outcome(), Some(JobOutcome::Succeeded));
    }
}
