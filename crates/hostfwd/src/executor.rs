//! Flash Executor - dispatches the privileged flash job
//!
//! Dispatch is fire-and-forget. The only synchronous failure is not being
//! able to start the job at all; the job's outcome arrives later as a
//! [`CompletionEvent`] on the completion channel.

use crate::config::ExecutorConfig;
use hostfw_shared::{CompletionEvent, HostFwError, JobName};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub trait FlashExecutor {
    /// Start flashing `payload` under the identity `job`. Must not block.
    fn start(&mut self, job: &JobName, payload: &Path) -> Result<(), HostFwError>;
}

/// Runs the configured command and reports its exit as a completion event.
///
/// With the default `systemctl start --wait {unit}` the exit status is the
/// unit's result.
pub struct ProcessFlashExecutor {
    program: String,
    args: Vec<String>,
    completions: mpsc::UnboundedSender<CompletionEvent>,
    next_job_id: u32,
}

impl ProcessFlashExecutor {
    pub fn new(config: &ExecutorConfig, completions: mpsc::UnboundedSender<CompletionEvent>) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            completions,
            next_job_id: 1,
        }
    }

    fn render_args(&self, job: &JobName, payload: &Path) -> Vec<String> {
        let payload = payload.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{unit}", job.as_str()).replace("{payload}", &payload))
            .collect()
    }
}

impl FlashExecutor for ProcessFlashExecutor {
    fn start(&mut self, job: &JobName, payload: &Path) -> Result<(), HostFwError> {
        let args = self.render_args(job, payload);
        let job_id = self.next_job_id;
        self.next_job_id = self.next_job_id.wrapping_add(1);

        info!("Starting flash job {} ({}): {} {:?}", job_id, job, self.program, args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| HostFwError::Dispatch {
                unit: job.to_string(),
                reason: e.to_string(),
            })?;

        let unit = job.to_string();
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = match child.wait().await {
                Ok(status) if status.success() => "done",
                Ok(status) => {
                    warn!("Flash job {} exited with {}", unit, status);
                    "failed"
                }
                Err(e) => {
                    error!("Failed to wait for flash job {}: {}", unit, e);
                    "failed"
                }
            };
            if tx.send(CompletionEvent::new(job_id, unit, result)).is_err() {
                warn!("Completion channel closed, dropping result of job {}", job_id);
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(program: &str, args: &[&str]) -> ExecutorConfig {
        ExecutorConfig {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            dispatch_timeout_secs: 0,
        }
    }

    fn job() -> JobName {
        JobName::for_payload("flash@", Path::new("/img/a/x.squashfs"), ".service")
    }

    #[test]
    fn test_render_args() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let exec = ProcessFlashExecutor::new(&config("flash", &["{unit}", "--file={payload}"]), tx);
        let args = exec.render_args(&job(), Path::new("/img/a/x.squashfs"));
        assert_eq!(args, vec!["flash@-img-a-x.squashfs.service", "--file=/img/a/x.squashfs"]);
    }

    #[tokio::test]
    async fn test_success_reports_done() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut exec = ProcessFlashExecutor::new(&config("true", &[]), tx);
        exec.start(&job(), Path::new("/img/a/x.squashfs")).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.unit_name, job().as_str());
        assert_eq!(event.result, "done");
        assert_eq!(event.job_id, 1);
    }

    #[tokio::test]
    async fn test_failure_reports_failed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut exec = ProcessFlashExecutor::new(&config("false", &[]), tx);
        exec.start(&job(), Path::new("/img/a/x.squashfs")).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.result, "failed");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_dispatch_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut exec = ProcessFlashExecutor::new(&config("/nonexistent/flasher", &[]), tx);
        let err = exec.start(&job(), Path::new("/img/a/x.squashfs")).unwrap_err();
        assert!(matches!(err, HostFwError::Dispatch { .. }));
    }
}
