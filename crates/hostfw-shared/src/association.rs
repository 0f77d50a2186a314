//! Associations between software objects and inventory.
//!
//! An association is a `(forward, reverse, endpoint)` triple, tagged with
//! the object path of the image that owns it. The set kept here mirrors
//! what the object layer publishes on the software root; an image's
//! associations go away with the image.

use serde::{Deserialize, Serialize};

pub const ACTIVE_FWD: &str = "active";
pub const ACTIVE_REV: &str = "software_version";
pub const FUNCTIONAL_FWD: &str = "functional";
pub const FUNCTIONAL_REV: &str = "software_version";
pub const ACTIVATION_FWD: &str = "inventory";
pub const ACTIVATION_REV: &str = "activation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub forward: String,
    pub reverse: String,
    pub endpoint: String,
    /// Object path of the image this association belongs to.
    pub owner: String,
}

impl Association {
    pub fn new(forward: &str, reverse: &str, endpoint: impl Into<String>, owner: &str) -> Self {
        Self {
            forward: forward.to_string(),
            reverse: reverse.to_string(),
            endpoint: endpoint.into(),
            owner: owner.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationSet {
    entries: Vec<Association>,
}

impl AssociationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Association] {
        &self.entries
    }

    fn insert(&mut self, assoc: Association) {
        if !self.entries.contains(&assoc) {
            self.entries.push(assoc);
        }
    }

    /// Record that `path` has been made active at some point.
    pub fn create_active(&mut self, path: &str) {
        self.insert(Association::new(ACTIVE_FWD, ACTIVE_REV, path, path));
    }

    /// Link the image at `path` to the `inventory` item.
    pub fn create_inventory(&mut self, path: &str, inventory: &str) {
        self.insert(Association::new(ACTIVATION_FWD, ACTIVATION_REV, inventory, path));
    }

    /// Point the single functional association at `path`.
    pub fn update_functional(&mut self, path: &str) {
        self.entries.retain(|a| a.forward != FUNCTIONAL_FWD);
        self.insert(Association::new(FUNCTIONAL_FWD, FUNCTIONAL_REV, path, path));
    }

    /// Drop every association owned by the image at `path`.
    pub fn remove_owner(&mut self, path: &str) {
        self.entries.retain(|a| a.owner != path);
    }

    pub fn functional(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|a| a.forward == FUNCTIONAL_FWD)
            .map(|a| a.endpoint.as_str())
    }

    pub fn is_active(&self, path: &str) -> bool {
        self.entries
            .iter()
            .any(|a| a.forward == ACTIVE_FWD && a.endpoint == path)
    }
}
