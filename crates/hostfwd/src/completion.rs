//! Completion subscriptions.
//!
//! A [`Subscription`] is held for exactly as long as an activation waits
//! for its flash job. Dropping it unsubscribes, so every way out of
//! Activating releases the subscription.

use hostfw_shared::{CompletionEvent, JobName};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type Units = Arc<Mutex<BTreeSet<String>>>;

fn lock(units: &Units) -> MutexGuard<'_, BTreeSet<String>> {
    units.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Tracks which unit names currently have a waiting activation.
#[derive(Debug, Clone, Default)]
pub struct CompletionNotifier {
    units: Units,
}

impl CompletionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, job: &JobName) -> Subscription {
        lock(&self.units).insert(job.as_str().to_string());
        debug!("Subscribed to completion of {}", job);
        Subscription {
            unit: job.as_str().to_string(),
            units: Arc::clone(&self.units),
        }
    }

    /// Whether anybody is waiting for `event`'s unit.
    pub fn accepts(&self, event: &CompletionEvent) -> bool {
        lock(&self.units).contains(&event.unit_name)
    }

    pub fn subscribed(&self) -> usize {
        lock(&self.units).len()
    }
}

/// Live subscription for one unit name.
#[derive(Debug)]
pub struct Subscription {
    unit: String,
    units: Units,
}

impl Subscription {
    pub fn unit(&self) -> &str {
        &self.unit
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        lock(&self.units).remove(&self.unit);
        debug!("Unsubscribed from completion of {}", self.unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn job(path: &str) -> JobName {
        JobName::for_payload("flash@", Path::new(path), ".service")
    }

    #[test]
    fn test_subscription_filters_events() {
        let notifier = CompletionNotifier::new();
        let job = job("/img/a/x.squashfs");
        let _sub = notifier.subscribe(&job);

        assert!(notifier.accepts(&CompletionEvent::new(1, job.as_str(), "done")));
        assert!(!notifier.accepts(&CompletionEvent::new(2, "other.service", "done")));
    }

    #[test]
    fn test_drop_releases() {
        let notifier = CompletionNotifier::new();
        let job = job("/img/a/x.squashfs");
        let sub = notifier.subscribe(&job);
        assert_eq!(notifier.subscribed(), 1);
        assert_eq!(sub.unit(), job.as_str());

        drop(sub);
        assert_eq!(notifier.subscribed(), 0);
        assert!(!notifier.accepts(&CompletionEvent::new(1, job.as_str(), "done")));
    }
}
