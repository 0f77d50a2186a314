//! Activation states and the per-image view published to clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    /// Required metadata missing; cannot be activated.
    Invalid,
    /// Staged and waiting for a request.
    Ready,
    /// Flash job dispatched, waiting for completion.
    Activating,
    /// Resident and running.
    Active,
    /// Last attempt failed. Sticky until a new request.
    Failed,
}

impl ActivationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Ready => "ready",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// What the image is for. Only host firmware is managed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionPurpose {
    Host,
    #[default]
    Unknown,
}

/// Published state of one activation.
///
/// `progress` and `blocks_transition` are only set while activating,
/// `redundancy_priority` only while active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationView {
    pub id: String,
    pub version: String,
    pub extended_version: String,
    pub purpose: VersionPurpose,
    pub state: ActivationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocks_transition: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redundancy_priority: Option<u8>,
    #[serde(default)]
    pub functional: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&ActivationState::Activating).unwrap();
        assert_eq!(json, "\"activating\"");
        let back: ActivationState = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(back, ActivationState::Failed);
    }

    #[test]
    fn test_view_omits_absent_helpers() {
        let view = ActivationView {
            id: "abc".to_string(),
            version: "1.0".to_string(),
            extended_version: String::new(),
            purpose: VersionPurpose::Host,
            state: ActivationState::Ready,
            progress: None,
            blocks_transition: false,
            redundancy_priority: None,
            functional: false,
        };
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("progress"));
        assert!(!json.contains("blocks_transition"));
        assert!(!json.contains("redundancy_priority"));

        let back: ActivationView = serde_json::from_str(&json).unwrap();
        assert_eq!(back, view);
    }
}
