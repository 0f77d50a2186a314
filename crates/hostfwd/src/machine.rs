//! Activation state machine.
//!
//! Owns the registry and is the only caller of the locator, the capacity
//! manager, the flash executor and the completion notifier. All methods run
//! on the daemon's single event loop; none of them wait for a flash job.

use crate::activation::{Activation, ActivationProgress, Attempt, Image, TransitionBlocker};
use crate::capacity::CapacityManager;
use crate::completion::CompletionNotifier;
use crate::config::Config;
use crate::executor::FlashExecutor;
use crate::locator::locate_payload;
use crate::registry::Registry;
use hostfw_shared::toc::{read_toc, version_id};
use hostfw_shared::{
    object_path, ActivationState, ActivationView, CompletionEvent, HostFwError, JobName,
    JobOutcome, StatusSnapshot, VersionPurpose, HOST_INVENTORY_PATH,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Progress reported right after the flash job is dispatched.
pub const PROGRESS_DISPATCHED: u8 = 10;
/// Progress reported once the flash job has succeeded.
pub const PROGRESS_FLASHED: u8 = 90;
pub const PROGRESS_DONE: u8 = 100;

/// The parts of [`Config`] the state machine needs.
#[derive(Debug, Clone)]
pub struct MachineSettings {
    pub staging_root: PathBuf,
    pub toc_file: String,
    pub payload_extension: String,
    pub unit_prefix: String,
    pub unit_suffix: String,
}

impl From<&Config> for MachineSettings {
    fn from(config: &Config) -> Self {
        Self {
            staging_root: config.paths.staging_root.clone(),
            toc_file: config.paths.toc_file.clone(),
            payload_extension: config.image.payload_extension.clone(),
            unit_prefix: config.image.unit_prefix.clone(),
            unit_suffix: config.image.unit_suffix.clone(),
        }
    }
}

pub struct ActivationStateMachine<E: FlashExecutor> {
    settings: MachineSettings,
    registry: Registry,
    capacity: CapacityManager,
    executor: E,
    notifier: CompletionNotifier,
}

impl<E: FlashExecutor> ActivationStateMachine<E> {
    pub fn new(settings: MachineSettings, capacity: CapacityManager, executor: E) -> Self {
        Self {
            settings,
            registry: Registry::new(),
            capacity,
            executor,
            notifier: CompletionNotifier::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn notifier(&self) -> &CompletionNotifier {
        &self.notifier
    }

    pub fn state(&self, id: &str) -> Option<ActivationState> {
        self.registry.activation(id).map(|a| a.state())
    }

    pub fn outstanding_job(&self, id: &str) -> Option<JobName> {
        self.registry
            .activation(id)
            .and_then(|a| a.outstanding_job())
            .cloned()
    }

    pub fn views(&self) -> Vec<ActivationView> {
        self.registry.views()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::new(
            self.registry.functional_id(),
            self.registry.views(),
            self.registry.associations().entries().to_vec(),
        )
    }

    /// Rebuild the resident image from its table of contents.
    ///
    /// Returns the resident id, or `None` when there is no usable TOC.
    pub fn restore_resident(&mut self, toc_path: &Path) -> Option<String> {
        if !toc_path.is_file() {
            error!("Failed to read TOC {}: not a file", toc_path.display());
            return None;
        }
        let toc = match read_toc(toc_path) {
            Ok(toc) => toc,
            Err(e) => {
                error!("Failed to read TOC {}: {}", toc_path.display(), e);
                return None;
            }
        };

        let Some(id) = version_id(&toc.version) else {
            error!("Failed to read version from TOC {}", toc_path.display());
            return None;
        };

        let mut state = ActivationState::Active;
        if toc.extended_version.is_empty() {
            error!("Failed to read extended_version from TOC {}", toc_path.display());
            state = ActivationState::Invalid;
        }

        let path = object_path(&id);
        let mut activation = Activation::new(id.clone(), state);
        if state == ActivationState::Active {
            activation.ensure_priority();
            let associations = self.registry.associations_mut();
            associations.create_inventory(&path, HOST_INVENTORY_PATH);
            associations.create_active(&path);
        }

        self.registry.insert(
            Image {
                id: id.clone(),
                version: toc.version,
                extended_version: toc.extended_version,
                payload_path: None,
                purpose: VersionPurpose::Host,
            },
            activation,
        );
        self.registry.associations_mut().update_functional(&path);

        info!("Restored resident image {} ({})", id, state);
        Some(id)
    }

    /// Rescan the staging root and register every newly ready image.
    ///
    /// A staging directory is ready once it holds a payload. Returns the new
    /// ids in name order.
    pub fn ingest(&mut self) -> Vec<String> {
        let root = self.settings.staging_root.clone();
        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot scan staging root {}: {}", root.display(), e);
                return Vec::new();
            }
        };

        let mut dirs: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| {
                let id = entry.file_name().to_str()?.to_string();
                Some((id, entry.path()))
            })
            .filter(|(id, _)| !self.registry.contains(id))
            .collect();
        dirs.sort();

        let mut added = Vec::new();
        for (id, dir) in dirs {
            let Some(payload) = locate_payload(&dir, &self.settings.payload_extension) else {
                debug!("Staging dir {} has no payload yet", dir.display());
                continue;
            };

            let (version, extended_version, state) = self.staged_metadata(&id, &dir);
            info!("Ingested image {} version {} ({})", id, version, state);
            self.registry.insert(
                Image {
                    id: id.clone(),
                    version,
                    extended_version,
                    payload_path: Some(payload),
                    purpose: VersionPurpose::Host,
                },
                Activation::new(id.clone(), state),
            );
            added.push(id);
        }
        added
    }

    fn staged_metadata(&self, id: &str, dir: &Path) -> (String, String, ActivationState) {
        let toc_path = dir.join(&self.settings.toc_file);
        if !toc_path.is_file() {
            return (id.to_string(), String::new(), ActivationState::Ready);
        }
        match read_toc(&toc_path) {
            Ok(toc) if toc.is_complete() => {
                (toc.version, toc.extended_version, ActivationState::Ready)
            }
            Ok(toc) => {
                error!("Incomplete TOC for staged image {}", id);
                (toc.version, toc.extended_version, ActivationState::Invalid)
            }
            Err(e) => {
                error!("Failed to read TOC for staged image {}: {}", id, e);
                (id.to_string(), String::new(), ActivationState::Invalid)
            }
        }
    }

    /// Apply a requested target state to `id`.
    pub fn request(
        &mut self,
        id: &str,
        target: ActivationState,
    ) -> Result<ActivationState, HostFwError> {
        let current = self
            .registry
            .activation(id)
            .map(|a| a.state())
            .ok_or_else(|| HostFwError::UnknownImage(id.to_string()))?;

        let invalid = || HostFwError::InvalidTransition {
            id: id.to_string(),
            from: current.to_string(),
            to: target.to_string(),
        };

        match target {
            ActivationState::Activating => match current {
                ActivationState::Activating => {
                    debug!("Image {} is already activating", id);
                    Ok(ActivationState::Activating)
                }
                ActivationState::Invalid => Err(invalid()),
                _ => {
                    if let Some(other) = self
                        .registry
                        .ids_in(ActivationState::Activating)
                        .into_iter()
                        .next()
                    {
                        warn!("Refusing to activate {} while {} is activating", id, other);
                        return Err(HostFwError::Busy(other));
                    }
                    Ok(self.activate(id))
                }
            },
            ActivationState::Active => Err(invalid()),
            other => {
                if let Some(activation) = self.registry.activation_mut(id) {
                    activation.set_state(other);
                }
                info!("Image {} set to {}", id, other);
                Ok(other)
            }
        }
    }

    fn activate(&mut self, id: &str) -> ActivationState {
        // Only an active image may hold a priority.
        if let Some(activation) = self.registry.activation_mut(id) {
            activation.release_priority();
        }

        let dir = self.settings.staging_root.join(id);
        let Some(payload) = locate_payload(&dir, &self.settings.payload_extension) else {
            error!("Unable to find payload file in {}", dir.display());
            return self.fail(
                id,
                &HostFwError::ImageNotFound {
                    id: id.to_string(),
                    dir: dir.display().to_string(),
                },
            );
        };

        if let Err(e) = self.capacity.ensure_free_space(&mut self.registry, id) {
            return self.fail(id, &e);
        }

        match self.start_activation(id, payload) {
            Ok(()) => ActivationState::Activating,
            Err(e) => self.fail(id, &e),
        }
    }

    fn start_activation(&mut self, id: &str, payload: PathBuf) -> Result<(), HostFwError> {
        let job = JobName::for_payload(
            &self.settings.unit_prefix,
            &payload,
            &self.settings.unit_suffix,
        );

        if let Some(image) = self.registry.image_mut(id) {
            image.payload_path = Some(payload.clone());
        }

        let activation = self
            .registry
            .activation_mut(id)
            .ok_or_else(|| HostFwError::UnknownImage(id.to_string()))?;
        activation.begin(Attempt {
            payload: payload.clone(),
            job: job.clone(),
            progress: ActivationProgress::new(),
            blocker: TransitionBlocker,
            subscription: self.notifier.subscribe(&job),
        });

        self.executor.start(&job, &payload)?;
        activation.set_progress(PROGRESS_DISPATCHED);
        info!("Activating {} via {}", id, job);
        Ok(())
    }

    /// Route a job completion to the activation waiting for it.
    ///
    /// Returns the affected id and its new state, or `None` when the event
    /// was ignored.
    pub fn on_completion(&mut self, event: &CompletionEvent) -> Option<(String, ActivationState)> {
        if !self.notifier.accepts(event) {
            debug!("Ignoring completion of unrelated unit {}", event.unit_name);
            return None;
        }

        let id = self
            .registry
            .activations()
            .find(|(_, a)| a.outstanding_job().map(|j| j.as_str()) == Some(event.unit_name.as_str()))
            .map(|(id, _)| id.clone())?;

        let state = match event.outcome() {
            Some(JobOutcome::Succeeded) => self.finish_activation(&id),
            Some(JobOutcome::Failed) => self.fail(
                &id,
                &HostFwError::JobCompletionFailure {
                    unit: event.unit_name.clone(),
                    result: event.result.clone(),
                },
            ),
            None => {
                debug!("Ignoring result '{}' for {}", event.result, event.unit_name);
                return None;
            }
        };
        Some((id, state))
    }

    fn finish_activation(&mut self, id: &str) -> ActivationState {
        let Some(activation) = self.registry.activation_mut(id) else {
            return ActivationState::Failed;
        };
        activation.set_progress(PROGRESS_FLASHED);
        // Priority must exist before the state turns Active.
        activation.ensure_priority();
        activation.set_progress(PROGRESS_DONE);
        activation.end_attempt();
        activation.set_state(ActivationState::Active);

        self.capacity.discard_staging(id);
        if let Some(image) = self.registry.image_mut(id) {
            image.payload_path = None;
        }

        let path = object_path(id);
        let associations = self.registry.associations_mut();
        associations.create_active(&path);
        associations.update_functional(&path);

        info!("Image {} is now active", id);
        ActivationState::Active
    }

    fn fail(&mut self, id: &str, reason: &HostFwError) -> ActivationState {
        warn!("Activation of {} failed: {}", id, reason);
        if let Some(activation) = self.registry.activation_mut(id) {
            activation.set_state(ActivationState::Failed);
        }
        ActivationState::Failed
    }

    /// Dispatch deadline for `job` elapsed. Fails the activation if that job
    /// is still outstanding; returns whether it did.
    pub fn expire(&mut self, id: &str, job: &JobName) -> bool {
        if self.outstanding_job(id).as_ref() != Some(job) {
            return false;
        }
        self.fail(
            id,
            &HostFwError::Dispatch {
                unit: job.to_string(),
                reason: "no completion before deadline".to_string(),
            },
        );
        true
    }

    /// Delete an image on request. Refused while it is activating.
    pub fn erase(&mut self, id: &str) -> Result<(), HostFwError> {
        match self.state(id) {
            None => Err(HostFwError::UnknownImage(id.to_string())),
            Some(ActivationState::Activating) => Err(HostFwError::Busy(id.to_string())),
            Some(_) => self.capacity.erase(&mut self.registry, id),
        }
    }
}
