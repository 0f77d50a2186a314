//! StatusSnapshot - the published state surface.
//!
//! Written by the daemon after every handled event and returned by the
//! `status` RPC method.

use crate::activation::{ActivationState, ActivationView};
use crate::association::Association;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    /// Id of the image currently running, if any.
    pub functional: Option<String>,
    pub activations: Vec<ActivationView>,
    pub associations: Vec<Association>,
}

impl StatusSnapshot {
    pub fn new(
        functional: Option<String>,
        activations: Vec<ActivationView>,
        associations: Vec<Association>,
    ) -> Self {
        Self {
            version: crate::VERSION.to_string(),
            generated_at: Utc::now(),
            functional,
            activations,
            associations,
        }
    }

    pub fn get(&self, id: &str) -> Option<&ActivationView> {
        self.activations.iter().find(|a| a.id == id)
    }

    pub fn active(&self) -> impl Iterator<Item = &ActivationView> {
        self.activations
            .iter()
            .filter(|a| a.state == ActivationState::Active)
    }

    /// Plain-text rendering used by `hostfwctl status`.
    pub fn format_text(&self) -> String {
        let mut out = format!("hostfwd {}\n", self.version);
        if self.activations.is_empty() {
            out.push_str("  no images\n");
            return out;
        }
        for a in &self.activations {
            let marker = if a.functional { "*" } else { " " };
            out.push_str(&format!("{} {:<10} {:<11} {}", marker, a.id, a.state, a.version));
            if let Some(p) = a.progress {
                out.push_str(&format!("  {}%", p));
            }
            if let Some(prio) = a.redundancy_priority {
                out.push_str(&format!("  priority={}", prio));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::VersionPurpose;

    fn view(id: &str, state: ActivationState) -> ActivationView {
        ActivationView {
            id: id.to_string(),
            version: format!("v-{}", id),
            extended_version: String::new(),
            purpose: VersionPurpose::Host,
            state,
            progress: (state == ActivationState::Activating).then_some(10),
            blocks_transition: state == ActivationState::Activating,
            redundancy_priority: (state == ActivationState::Active).then_some(0),
            functional: state == ActivationState::Active,
        }
    }

    #[test]
    fn test_lookup_and_active() {
        let snap = StatusSnapshot::new(
            Some("a".into()),
            vec![view("a", ActivationState::Active), view("b", ActivationState::Activating)],
            vec![],
        );
        assert_eq!(snap.get("b").unwrap().progress, Some(10));
        assert_eq!(snap.active().count(), 1);
    }

    #[test]
    fn test_format_text() {
        let snap = StatusSnapshot::new(None, vec![view("b", ActivationState::Activating)], vec![]);
        let text = snap.format_text();
        assert!(text.contains("activating"));
        assert!(text.contains("10%"));

        let empty = StatusSnapshot::new(None, vec![], vec![]);
        assert!(empty.format_text().contains("no images"));
    }
}
