//! One work item, end to end.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use harness_core::{RunId, RunResult, RunStatus, WorkItem};
use harness_node::NodeManager;

use crate::classify::classify_exit;
use crate::RunnerError;

/// Output drained from the test process, complete or partial.
struct Capture {
    stdout: String,
    stderr: String,
}

impl Capture {
    /// Join the reader tasks once the process is gone; after a kill the
    /// pipes hit EOF, so this returns whatever made it out.
    async fn collect(
        stdout: tokio::task::JoinHandle<Vec<u8>>,
        stderr: tokio::task::JoinHandle<Vec<u8>>,
    ) -> Self {
        let stdout = stdout.await.unwrap_or_default();
        let stderr = stderr.await.unwrap_or_default();
        Self {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        }
    }
}

/// What happened to the spawned test process.
enum ExecOutcome {
    Finished(std::process::ExitStatus, Capture),
    TimedOut(Capture),
    Cancelled,
}

/// Executes work items against freshly acquired nodes.
pub struct JobRunner {
    nodes: Arc<NodeManager>,
    run_id: RunId,
    exec_timeout: Duration,
}

impl JobRunner {
    /// Create a runner for one run identity.
    pub fn new(nodes: Arc<NodeManager>, run_id: RunId, exec_timeout: Duration) -> Self {
        Self {
            nodes,
            run_id,
            exec_timeout,
        }
    }

    /// The run identity this runner stamps on results.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Execute one item and classify its outcome.
    ///
    /// Never fails: provisioning and spawn failures become classified
    /// results. The node lease acquired for the item is released on
    /// every path before the result is returned.
    pub async fn run(&self, item: &WorkItem, cancel: &CancellationToken) -> RunResult {
        let started_at = Utc::now();
        let label = item.label();
        debug!(item = %item.id, label = %label, "Running work item");

        let mut lease = match self.nodes.acquire().await {
            Ok(lease) => lease,
            Err(e) => {
                warn!(item = %item.id, error = %e, "Node acquisition failed");
                return RunResult::provisioning_failure(
                    item.id.clone(),
                    self.run_id.clone(),
                    label,
                    started_at,
                    e.to_string(),
                );
            }
        };
        if let Err(e) = lease.mark_in_use() {
            warn!(item = %item.id, error = %e, "Lease in illegal state");
            if let Err(release_err) = lease.release().await {
                warn!(item = %item.id, error = %release_err, "Node release failed");
            }
            return RunResult::infrastructure_error(
                item.id.clone(),
                self.run_id.clone(),
                label,
                started_at,
                e.to_string(),
            );
        }

        let mut cmd = Command::new(&item.binary);
        cmd.args(item.filter.to_args());
        for (key, value) in lease.endpoint().env() {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Timeout and cancellation paths drop the wait future; the
            // child must not outlive it.
            .kill_on_drop(true);

        let exec = self.exec(cmd, cancel).await;

        // Release before emitting the result so the node is reclaimed
        // even if the consumer of this result is slow or gone.
        if let Err(e) = lease.release().await {
            warn!(item = %item.id, error = %e, "Node release failed");
        }

        let result = match exec {
            Ok(ExecOutcome::Finished(exit, capture)) => {
                let (status, exit_code) = classify_exit(exit);
                info!(item = %item.id, status = %status, "Work item finished");
                RunResult {
                    item_id: item.id.clone(),
                    run_id: self.run_id.clone(),
                    label,
                    status,
                    exit_code,
                    stdout: capture.stdout,
                    stderr: capture.stderr,
                    message: None,
                    started_at,
                    finished_at: Utc::now(),
                }
            }
            Ok(ExecOutcome::TimedOut(capture)) => {
                warn!(item = %item.id, timeout_secs = self.exec_timeout.as_secs(), "Execution timeout");
                RunResult {
                    item_id: item.id.clone(),
                    run_id: self.run_id.clone(),
                    label,
                    status: RunStatus::TimedOut,
                    exit_code: None,
                    stdout: capture.stdout,
                    stderr: capture.stderr,
                    message: Some(format!(
                        "killed after exceeding execution timeout of {}s",
                        self.exec_timeout.as_secs()
                    )),
                    started_at,
                    finished_at: Utc::now(),
                }
            }
            Ok(ExecOutcome::Cancelled) => {
                info!(item = %item.id, "Work item cancelled");
                RunResult::infrastructure_error(
                    item.id.clone(),
                    self.run_id.clone(),
                    label,
                    started_at,
                    "run cancelled",
                )
            }
            Err(e) => {
                warn!(item = %item.id, error = %e, "Execution infrastructure error");
                RunResult::infrastructure_error(
                    item.id.clone(),
                    self.run_id.clone(),
                    label,
                    started_at,
                    e.to_string(),
                )
            }
        };
        result
    }

    /// Spawn and await the test process under timeout and cancellation.
    ///
    /// Stdout and stderr are drained concurrently, so output written
    /// before a timeout kill still reaches the result.
    async fn exec(
        &self,
        mut cmd: Command,
        cancel: &CancellationToken,
    ) -> Result<ExecOutcome, RunnerError> {
        let mut child = cmd.spawn().map_err(RunnerError::Spawn)?;
        let stdout = tokio::spawn(drain(child.stdout.take()));
        let stderr = tokio::spawn(drain(child.stderr.take()));

        let waited = tokio::select! {
            _ = cancel.cancelled() => None,
            waited = tokio::time::timeout(self.exec_timeout, child.wait()) => Some(waited),
        };

        match waited {
            None => {
                let _ = child.kill().await;
                Ok(ExecOutcome::Cancelled)
            }
            Some(Err(_elapsed)) => {
                let _ = child.kill().await;
                Ok(ExecOutcome::TimedOut(Capture::collect(stdout, stderr).await))
            }
            Some(Ok(Ok(exit))) => Ok(ExecOutcome::Finished(
                exit,
                Capture::collect(stdout, stderr).await,
            )),
            Some(Ok(Err(e))) => {
                let _ = child.kill().await;
                Err(RunnerError::Wait(e))
            }
        }
    }
}

/// Read a child pipe to EOF, keeping whatever was written even if the
/// process is killed mid-stream.
async fn drain<R>(pipe: Option<R>) -> Vec<u8>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    use tokio::io::AsyncReadExt;

    let Some(mut pipe) = pipe else {
        return Vec::new();
    };
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf).await;
    buf
}
