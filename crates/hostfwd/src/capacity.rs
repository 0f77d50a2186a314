//! Single-slot capacity management.
//!
//! The host firmware storage holds exactly one resident image. Before a new
//! image can be flashed, whichever image currently occupies the slot is
//! erased. There is no choice to make: the occupant is the only candidate.

use crate::registry::Registry;
use hostfw_shared::{ActivationState, HostFwError};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

/// Persistent storage behind the image records.
pub trait SlotStore {
    /// Remove everything persisted for `id`. Nothing to remove is success.
    fn erase(&mut self, id: &str) -> io::Result<()>;

    /// Drop the staging copy of an image that has just been flashed.
    fn discard_staging(&mut self, id: &str) -> io::Result<()>;
}

/// Staging directories on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsSlotStore {
    staging_root: PathBuf,
}

impl FsSlotStore {
    pub fn new(staging_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
        }
    }

    fn remove_dir(&self, id: &str) -> io::Result<()> {
        match fs::remove_dir_all(self.staging_root.join(id)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

impl SlotStore for FsSlotStore {
    fn erase(&mut self, id: &str) -> io::Result<()> {
        self.remove_dir(id)
    }

    fn discard_staging(&mut self, id: &str) -> io::Result<()> {
        self.remove_dir(id)
    }
}

pub struct CapacityManager {
    store: Box<dyn SlotStore + Send>,
}

impl CapacityManager {
    pub fn new(store: Box<dyn SlotStore + Send>) -> Self {
        Self { store }
    }

    /// Erase an image: persisted data first, then its records.
    pub fn erase(&mut self, registry: &mut Registry, id: &str) -> Result<(), HostFwError> {
        if !registry.contains(id) {
            return Err(HostFwError::UnknownImage(id.to_string()));
        }
        self.store.erase(id)?;
        registry.remove(id);
        info!("Erased image {}", id);
        Ok(())
    }

    /// Make room for `requester`. Returns the evicted id, if any.
    ///
    /// The requester itself is never evicted.
    pub fn ensure_free_space(
        &mut self,
        registry: &mut Registry,
        requester: &str,
    ) -> Result<Option<String>, HostFwError> {
        let occupant = registry
            .ids_in(ActivationState::Active)
            .into_iter()
            .find(|id| id != requester);

        let Some(occupant) = occupant else {
            info!("Firmware slot is free");
            return Ok(None);
        };

        info!("Evicting {} to make room for {}", occupant, requester);
        self.erase(registry, &occupant).map_err(|e| {
            warn!("Eviction of {} failed: {}", occupant, e);
            HostFwError::CapacityUnavailable(format!("erase {}: {}", occupant, e))
        })?;
        Ok(Some(occupant))
    }

    pub fn discard_staging(&mut self, id: &str) {
        if let Err(e) = self.store.discard_staging(id) {
            warn!("Failed to remove staging copy of {}: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{Activation, Image};
    use hostfw_shared::VersionPurpose;
    use tempfile::TempDir;

    struct BrokenStore;

    impl SlotStore for BrokenStore {
        fn erase(&mut self, _id: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }

        fn discard_staging(&mut self, _id: &str) -> io::Result<()> {
            Ok(())
        }
    }

    fn add(registry: &mut Registry, id: &str, state: ActivationState) {
        registry.insert(
            Image {
                id: id.to_string(),
                version: id.to_string(),
                extended_version: String::new(),
                payload_path: None,
                purpose: VersionPurpose::Host,
            },
            Activation::new(id, state),
        );
    }

    #[test]
    fn test_free_slot() {
        let temp = TempDir::new().unwrap();
        let mut capacity = CapacityManager::new(Box::new(FsSlotStore::new(temp.path())));
        let mut registry = Registry::new();
        add(&mut registry, "b", ActivationState::Ready);

        assert_eq!(capacity.ensure_free_space(&mut registry, "b").unwrap(), None);
        assert!(registry.contains("b"));
    }

    #[test]
    fn test_evicts_active_occupant() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("a")).unwrap();
        fs::write(temp.path().join("a/x.squashfs"), b"x").unwrap();

        let mut capacity = CapacityManager::new(Box::new(FsSlotStore::new(temp.path())));
        let mut registry = Registry::new();
        add(&mut registry, "a", ActivationState::Active);
        add(&mut registry, "b", ActivationState::Ready);

        let evicted = capacity.ensure_free_space(&mut registry, "b").unwrap();
        assert_eq!(evicted, Some("a".to_string()));
        assert!(!registry.contains("a"));
        assert!(!temp.path().join("a").exists());
        assert!(registry.contains("b"));
    }

    #[test]
    fn test_requester_is_not_evicted() {
        let temp = TempDir::new().unwrap();
        let mut capacity = CapacityManager::new(Box::new(FsSlotStore::new(temp.path())));
        let mut registry = Registry::new();
        add(&mut registry, "a", ActivationState::Active);

        assert_eq!(capacity.ensure_free_space(&mut registry, "a").unwrap(), None);
        assert!(registry.contains("a"));
    }

    #[test]
    fn test_eviction_failure() {
        let mut capacity = CapacityManager::new(Box::new(BrokenStore));
        let mut registry = Registry::new();
        add(&mut registry, "a", ActivationState::Active);

        let err = capacity.ensure_free_space(&mut registry, "b").unwrap_err();
        assert!(matches!(err, HostFwError::CapacityUnavailable(_)));
        assert!(registry.contains("a"));
    }

    #[test]
    fn test_erase_unknown() {
        let temp = TempDir::new().unwrap();
        let mut capacity = CapacityManager::new(Box::new(FsSlotStore::new(temp.path())));
        let mut registry = Registry::new();
        let err = capacity.erase(&mut registry, "zz").unwrap_err();
        assert!(matches!(err, HostFwError::UnknownImage(_)));
    }
}
