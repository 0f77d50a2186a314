//! Error types for hostfw.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostFwError {
    #[error("No payload file found for image {id} in {dir}")]
    ImageNotFound { id: String, dir: String },

    #[error("Unable to free the firmware slot: {0}")]
    CapacityUnavailable(String),

    #[error("Flash job {unit} finished with result '{result}'")]
    JobCompletionFailure { unit: String, result: String },

    #[error("Failed to dispatch flash job {unit}: {reason}")]
    Dispatch { unit: String, reason: String },

    #[error("Unknown image: {0}")]
    UnknownImage(String),

    #[error("Image {id} cannot go from {from} to {to}")]
    InvalidTransition { id: String, from: String, to: String },

    #[error("Image {0} is activating")]
    Busy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HostFwError {
    /// JSON-RPC error code reported over the control socket.
    pub fn code(&self) -> i32 {
        match self {
            HostFwError::ImageNotFound { .. } => -32010,
            HostFwError::CapacityUnavailable(_) => -32011,
            HostFwError::JobCompletionFailure { .. } => -32012,
            HostFwError::Dispatch { .. } => -32013,
            HostFwError::UnknownImage(_) => -32014,
            HostFwError::InvalidTransition { .. } => -32015,
            HostFwError::Busy(_) => -32016,
            HostFwError::Io(_) => -32006,
            HostFwError::Json(_) => -32700,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            HostFwError::ImageNotFound { id: "a".into(), dir: "/x".into() },
            HostFwError::CapacityUnavailable("x".into()),
            HostFwError::JobCompletionFailure { unit: "u".into(), result: "failed".into() },
            HostFwError::Dispatch { unit: "u".into(), reason: "r".into() },
            HostFwError::UnknownImage("a".into()),
            HostFwError::InvalidTransition { id: "a".into(), from: "x".into(), to: "y".into() },
            HostFwError::Busy("a".into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_display() {
        let err = HostFwError::UnknownImage("deadbeef".into());
        assert_eq!(err.to_string(), "Unknown image: deadbeef");
    }
}
