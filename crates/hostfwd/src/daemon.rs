//! Daemon event loop.
//!
//! One loop owns the state machine. Watcher events, job completions,
//! control requests, deadlines and the rescan tick all arrive as messages
//! and are handled strictly one at a time, in arrival order.

use crate::capacity::{CapacityManager, FsSlotStore};
use crate::config::Config;
use crate::executor::{FlashExecutor, ProcessFlashExecutor};
use crate::machine::{ActivationStateMachine, MachineSettings};
use crate::rpc_server::{self, Control, ControlReply, ControlRequest};
use crate::status::StatusPublisher;
use crate::watcher::{IngestEvent, IngestWatcher};
use anyhow::Result;
use hostfw_shared::{ActivationState, CompletionEvent, JobName};
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Deadline message: (image id, job that was outstanding when armed).
pub type Expiry = (String, JobName);

pub struct Daemon<E: FlashExecutor> {
    config: Config,
    machine: ActivationStateMachine<E>,
    publisher: StatusPublisher,
    expiry_tx: mpsc::UnboundedSender<Expiry>,
}

impl<E: FlashExecutor> Daemon<E> {
    pub fn new(
        config: Config,
        machine: ActivationStateMachine<E>,
        expiry_tx: mpsc::UnboundedSender<Expiry>,
    ) -> Self {
        let publisher = StatusPublisher::new(&config.paths.status_file);
        Self {
            config,
            machine,
            publisher,
            expiry_tx,
        }
    }

    pub fn machine(&self) -> &ActivationStateMachine<E> {
        &self.machine
    }

    /// Reconstruct state from disk: resident image first, then staging.
    pub fn recover(&mut self) {
        let toc = self.config.resident_toc();
        match self.machine.restore_resident(&toc) {
            Some(id) => info!("Resident image: {}", id),
            None => warn!("No resident image found"),
        }
        self.on_ingest();
    }

    pub fn on_ingest(&mut self) {
        let added = self.machine.ingest();
        if !self.config.watch.auto_activate {
            return;
        }
        for id in added {
            if self.machine.state(&id) != Some(ActivationState::Ready) {
                continue;
            }
            if let Err(e) = self.activate(&id) {
                warn!("Auto-activation of {} refused: {}", id, e);
            }
        }
    }

    fn activate(&mut self, id: &str) -> Result<ActivationState, hostfw_shared::HostFwError> {
        let state = self.machine.request(id, ActivationState::Activating)?;
        if state == ActivationState::Activating {
            self.arm_deadline(id);
        }
        Ok(state)
    }

    fn arm_deadline(&self, id: &str) {
        let (Some(timeout), Some(job)) = (
            self.config.executor.dispatch_timeout(),
            self.machine.outstanding_job(id),
        ) else {
            return;
        };
        let tx = self.expiry_tx.clone();
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send((id, job));
        });
    }

    pub fn on_completion(&mut self, event: &CompletionEvent) {
        if let Some((id, state)) = self.machine.on_completion(event) {
            info!("Job {} for {} finished: {}", event.job_id, id, state);
        }
    }

    pub fn on_expiry(&mut self, id: &str, job: &JobName) {
        if self.machine.expire(id, job) {
            warn!("Activation of {} timed out waiting for {}", id, job);
        }
    }

    pub fn on_control(&mut self, command: Control) -> ControlReply {
        match command {
            Control::Status => Ok(serde_json::to_value(self.machine.snapshot())?),
            Control::Activate(id) => {
                let state = self.activate(&id)?;
                Ok(serde_json::json!({ "id": id, "state": state }))
            }
            Control::Delete(id) => {
                self.machine.erase(&id)?;
                Ok(serde_json::json!({ "id": id, "deleted": true }))
            }
        }
    }

    pub fn publish(&self) {
        if let Err(e) = self.publisher.publish(&self.machine.snapshot()) {
            warn!("Failed to publish status: {:#}", e);
        }
    }
}

/// Wire up collaborators and run until SIGINT/SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    let (ingest_tx, mut ingest_rx) = mpsc::unbounded_channel::<IngestEvent>();
    let (completion_tx, mut completion_rx) = mpsc::unbounded_channel::<CompletionEvent>();
    let (expiry_tx, mut expiry_rx) = mpsc::unbounded_channel::<Expiry>();
    let (control_tx, mut control_rx) = mpsc::channel::<ControlRequest>(16);

    let _watcher = IngestWatcher::new(&config.paths.staging_root, ingest_tx)?;

    let executor = ProcessFlashExecutor::new(&config.executor, completion_tx);
    let capacity = CapacityManager::new(Box::new(FsSlotStore::new(&config.paths.staging_root)));
    let machine = ActivationStateMachine::new(MachineSettings::from(&config), capacity, executor);

    let listener = rpc_server::bind(&config.paths.socket_path).await?;
    tokio::spawn(rpc_server::serve(listener, control_tx));

    let rescan_secs = config.watch.rescan_interval_secs;
    let mut daemon = Daemon::new(config, machine, expiry_tx);
    daemon.recover();
    daemon.publish();

    let mut rescan = tokio::time::interval(Duration::from_secs(rescan_secs.max(1)));
    rescan.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    rescan.tick().await;

    let mut sigterm = signal(SignalKind::terminate())?;

    info!("hostfwd ready");

    loop {
        tokio::select! {
            Some(_) = ingest_rx.recv() => daemon.on_ingest(),
            Some(event) = completion_rx.recv() => daemon.on_completion(&event),
            Some((id, job)) = expiry_rx.recv() => daemon.on_expiry(&id, &job),
            Some(request) = control_rx.recv() => {
                let reply = daemon.on_control(request.command);
                if request.reply.send(reply).is_err() {
                    debug!("Control client went away before the reply");
                }
            }
            _ = rescan.tick(), if rescan_secs > 0 => daemon.on_ingest(),
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("Terminated, shutting down");
                break;
            }
        }
        daemon.publish();
    }

    Ok(())
}
