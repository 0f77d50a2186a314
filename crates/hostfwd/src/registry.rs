//! Registry of known images and their activations.
//!
//! Owned by the state machine. Nothing outside the event loop touches it.

use crate::activation::{Activation, Image};
use hostfw_shared::{object_path, ActivationState, ActivationView, AssociationSet};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct Registry {
    images: BTreeMap<String, Image>,
    activations: BTreeMap<String, Activation>,
    associations: AssociationSet,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, image: Image, activation: Activation) {
        self.activations.insert(image.id.clone(), activation);
        self.images.insert(image.id.clone(), image);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.activations.contains_key(id)
    }

    pub fn image(&self, id: &str) -> Option<&Image> {
        self.images.get(id)
    }

    pub fn activation(&self, id: &str) -> Option<&Activation> {
        self.activations.get(id)
    }

    pub fn activation_mut(&mut self, id: &str) -> Option<&mut Activation> {
        self.activations.get_mut(id)
    }

    pub fn activations(&self) -> impl Iterator<Item = (&String, &Activation)> {
        self.activations.iter()
    }

    /// Ids currently in `state`.
    pub fn ids_in(&self, state: ActivationState) -> Vec<String> {
        self.activations
            .iter()
            .filter(|(_, a)| a.state() == state)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn image_mut(&mut self, id: &str) -> Option<&mut Image> {
        self.images.get_mut(id)
    }

    /// Remove the image, its activation and every association to it.
    pub fn remove(&mut self, id: &str) -> Option<Activation> {
        self.images.remove(id);
        self.associations.remove_owner(&object_path(id));
        self.activations.remove(id)
    }

    pub fn associations(&self) -> &AssociationSet {
        &self.associations
    }

    pub fn associations_mut(&mut self) -> &mut AssociationSet {
        &mut self.associations
    }

    pub fn functional_id(&self) -> Option<String> {
        let path = self.associations.functional()?;
        self.activations
            .keys()
            .find(|id| object_path(id) == path)
            .cloned()
    }

    pub fn views(&self) -> Vec<ActivationView> {
        let functional = self.functional_id();
        self.activations
            .iter()
            .map(|(id, activation)| {
                let image = self.images.get(id);
                ActivationView {
                    id: id.clone(),
                    version: image.map(|i| i.version.clone()).unwrap_or_default(),
                    extended_version: image
                        .map(|i| i.extended_version.clone())
                        .unwrap_or_default(),
                    purpose: image.map(|i| i.purpose).unwrap_or_default(),
                    state: activation.state(),
                    progress: activation.progress(),
                    blocks_transition: activation.blocks_transition(),
                    redundancy_priority: activation.redundancy_priority().map(|p| p.priority),
                    functional: functional.as_deref() == Some(id.as_str()),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostfw_shared::VersionPurpose;

    fn image(id: &str) -> Image {
        Image {
            id: id.to_string(),
            version: format!("v{}", id),
            extended_version: String::new(),
            payload_path: None,
            purpose: VersionPurpose::Host,
        }
    }

    #[test]
    fn test_remove_drops_associations() {
        let mut registry = Registry::new();
        registry.insert(image("a"), Activation::new("a", ActivationState::Active));
        registry.associations_mut().create_active(&object_path("a"));
        registry.associations_mut().update_functional(&object_path("a"));
        assert_eq!(registry.functional_id(), Some("a".to_string()));

        assert!(registry.remove("a").is_some());
        assert!(!registry.contains("a"));
        assert!(registry.associations().entries().is_empty());
        assert_eq!(registry.functional_id(), None);
    }

    #[test]
    fn test_views() {
        let mut registry = Registry::new();
        registry.insert(image("a"), Activation::new("a", ActivationState::Ready));
        registry.insert(image("b"), Activation::new("b", ActivationState::Invalid));
        let views = registry.views();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].version, "va");
        assert!(!views[0].functional);
        assert_eq!(views[0].progress, None);
        assert_eq!(registry.ids_in(ActivationState::Ready), vec!["a".to_string()]);
    }
}
