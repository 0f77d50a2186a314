//! Activation records and the helpers that live only while activating.

use crate::completion::Subscription;
use hostfw_shared::{ActivationState, JobName, VersionPurpose};
use std::path::PathBuf;
use tracing::{debug, warn};

/// A known firmware image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: String,
    pub version: String,
    pub extended_version: String,
    pub payload_path: Option<PathBuf>,
    pub purpose: VersionPurpose,
}

/// Activation progress, 0..=100. Never moves backwards.
#[derive(Debug, PartialEq, Eq)]
pub struct ActivationProgress(u8);

impl ActivationProgress {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    pub fn set(&mut self, value: u8) {
        let value = value.min(100);
        if value < self.0 {
            warn!("Ignoring progress regression {} -> {}", self.0, value);
            return;
        }
        self.0 = value;
    }
}

impl Default for ActivationProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Marker telling higher layers not to start host transitions.
#[derive(Debug, PartialEq, Eq)]
pub struct TransitionBlocker;

/// Ordering among resident images. Always 0 with a single slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundancyPriority {
    pub owner: String,
    pub priority: u8,
}

/// In-flight flash attempt. Dropping it releases progress, the blocker and
/// the completion subscription together.
#[derive(Debug)]
pub struct Attempt {
    pub payload: PathBuf,
    pub job: JobName,
    pub progress: ActivationProgress,
    pub blocker: TransitionBlocker,
    pub subscription: Subscription,
}

#[derive(Debug)]
pub struct Activation {
    pub version_id: String,
    state: ActivationState,
    attempt: Option<Attempt>,
    redundancy_priority: Option<RedundancyPriority>,
    #[cfg(test)]
    progress_log: Vec<u8>,
}

impl Activation {
    pub fn new(version_id: impl Into<String>, state: ActivationState) -> Self {
        Self {
            version_id: version_id.into(),
            state,
            attempt: None,
            redundancy_priority: None,
            #[cfg(test)]
            progress_log: Vec::new(),
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn progress(&self) -> Option<u8> {
        self.attempt.as_ref().map(|a| a.progress.get())
    }

    /// Every progress value this activation has reported, oldest first.
    #[cfg(test)]
    pub(crate) fn progress_log(&self) -> &[u8] {
        &self.progress_log
    }

    pub fn blocks_transition(&self) -> bool {
        self.attempt.is_some()
    }

    pub fn redundancy_priority(&self) -> Option<&RedundancyPriority> {
        self.redundancy_priority.as_ref()
    }

    pub fn outstanding_job(&self) -> Option<&JobName> {
        self.attempt.as_ref().map(|a| &a.job)
    }

    pub(crate) fn begin(&mut self, attempt: Attempt) {
        #[cfg(test)]
        self.progress_log.push(attempt.progress.get());
        self.attempt = Some(attempt);
        self.state = ActivationState::Activating;
    }

    pub(crate) fn set_progress(&mut self, value: u8) {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.progress.set(value);
            #[cfg(test)]
            self.progress_log.push(attempt.progress.get());
            debug!("{} progress {}%", self.version_id, attempt.progress.get());
        }
    }

    /// Drop every helper that only exists while activating.
    pub(crate) fn end_attempt(&mut self) -> Option<Attempt> {
        self.attempt.take()
    }

    pub(crate) fn ensure_priority(&mut self) {
        if self.redundancy_priority.is_none() {
            self.redundancy_priority = Some(RedundancyPriority {
                owner: self.version_id.clone(),
                priority: 0,
            });
        }
    }

    pub(crate) fn release_priority(&mut self) {
        self.redundancy_priority = None;
    }

    /// Set the state, keeping helper lifetimes tied to it.
    pub(crate) fn set_state(&mut self, state: ActivationState) {
        if state != ActivationState::Active {
            self.release_priority();
        }
        if state != ActivationState::Activating {
            self.end_attempt();
        }
        self.state = state;
    }
}
