//! Staging Watcher - reports writes under the staging root
//!
//! Every relevant filesystem event becomes one `IngestEvent::Changed`,
//! forwarded in arrival order. The receiver rescans the whole staging root,
//! so a burst of events never loses an image.

use anyhow::{Context, Result};
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::fs;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    Changed,
}

pub struct IngestWatcher {
    _watcher: RecommendedWatcher,
}

/// Events that can make a staged image ready.
fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Create(CreateKind::Folder)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
            | EventKind::Modify(ModifyKind::Name(RenameMode::Both))
    )
}

impl IngestWatcher {
    pub fn new(root: &Path, tx: mpsc::UnboundedSender<IngestEvent>) -> Result<Self> {
        if !root.is_dir() {
            fs::create_dir_all(root)
                .with_context(|| format!("Failed to create staging root {}", root.display()))?;
        }

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if !is_relevant(&event.kind) {
                        return;
                    }
                    debug!("Staging change {:?} on {:?}", event.kind, event.paths);
                    let _ = tx.send(IngestEvent::Changed);
                }
                Err(e) => warn!("Watch error: {:?}", e),
            }
        })
        .context("Failed to initialize staging watcher")?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", root.display()))?;

        info!("Watching staging root {}", root.display());

        Ok(Self { _watcher: watcher })
    }
}
