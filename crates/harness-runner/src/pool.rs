//! Bounded fan-out of work items.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use harness_core::{RunResult, WorkManifest};

use crate::JobRunner;

/// Dispatches work items over at most `width` concurrent runners.
///
/// No ordering is guaranteed between items; results arrive as they
/// finish. Cancelling the token stops items that have not started yet
/// and propagates into in-flight runners, which kill their test process
/// and release their node lease.
pub struct WorkerPool {
    runner: Arc<JobRunner>,
    width: usize,
}

impl WorkerPool {
    /// Create a pool of the given width over a runner.
    pub fn new(runner: Arc<JobRunner>, width: usize) -> Self {
        Self {
            runner,
            width: width.max(1),
        }
    }

    /// Execute every item of the manifest; returns the result stream.
    ///
    /// The stream ends once every item has reported, including items
    /// short-circuited by cancellation.
    pub fn execute(&self, manifest: &WorkManifest, cancel: CancellationToken) -> ReceiverStream<RunResult> {
        info!(
            run = %manifest.run_id,
            items = manifest.len(),
            width = self.width,
            "Dispatching work items"
        );

        let (tx, rx) = mpsc::channel(manifest.len().max(1));
        let semaphore = Arc::new(Semaphore::new(self.width));

        for item in manifest.items.clone() {
            let runner = self.runner.clone();
            let semaphore = semaphore.clone();
            let tx = tx.clone();
            let cancel = cancel.clone();

            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };

                // Items that have not started when cancellation lands
                // never acquire a node.
                let result = if cancel.is_cancelled() {
                    debug!(item = %item.id, "Skipping cancelled item");
                    RunResult::infrastructure_error(
                        item.id.clone(),
                        runner.run_id().clone(),
                        item.label(),
                        Utc::now(),
                        "run cancelled",
                    )
                } else {
                    runner.run(&item, &cancel).await
                };

                // Receiver gone means the consumer stopped caring; the
                // lease was already released inside the runner.
                let _ = tx.send(result).await;
            });
        }

        ReceiverStream::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{fake_test_binary, fast_manager};
    use harness_core::{RunId, RunReport, RunStatus, TestFilter, WorkItem};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn pool_over(health: Vec<bool>, width: usize, timeout_ms: u64) -> (Arc<crate::testutil::ScriptedProvider>, WorkerPool) {
        let (provider, nodes) = fast_manager(health);
        let runner = Arc::new(JobRunner::new(
            nodes,
            RunId::new("pool-run"),
            Duration::from_millis(timeout_ms),
        ));
        (provider, WorkerPool::new(runner, width))
    }

    async fn collect(stream: ReceiverStream<RunResult>) -> Vec<RunResult> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_three_items_one_unprovisionable() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_test_binary(dir.path(), "ok_tests", "exit 0");
        let manifest = WorkManifest::new(vec![
            WorkItem::new(&bin, TestFilter::all_ignored()),
            WorkItem::new(&bin, TestFilter::all_ignored()),
            WorkItem::new(&bin, TestFilter::all_ignored()),
        ]);

        // Third started instance never becomes healthy.
        let (provider, pool) = pool_over(vec![true, true, false], 2, 5_000);
        let results = collect(pool.execute(&manifest, CancellationToken::new())).await;

        assert_eq!(results.len(), 3);
        let report = RunReport::from_results(&results);
        assert_eq!(report.passed, 2);
        assert_eq!(report.provisioning, 1);
        assert!(!report.success());
        assert!(report.has_infrastructure_failure());

        // Every started instance was stopped, including the unhealthy one.
        assert_eq!(provider.started.load(Ordering::SeqCst), 3);
        assert_eq!(provider.stopped.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_pool_width_bounds_concurrent_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_test_binary(dir.path(), "slow_tests", "sleep 0.2");
        let items: Vec<WorkItem> = (0..5)
            .map(|_| WorkItem::new(&bin, TestFilter::all_ignored()))
            .collect();
        let manifest = WorkManifest::new(items);

        let (provider, pool) = pool_over(vec![true], 2, 5_000);
        let results = collect(pool.execute(&manifest, CancellationToken::new())).await;

        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.status == RunStatus::Passed));
        assert!(provider.max_concurrent.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_hung_item_does_not_block_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let hung = fake_test_binary(dir.path(), "hung_tests", "sleep 30");
        let ok = fake_test_binary(dir.path(), "ok_tests", "exit 0");
        let manifest = WorkManifest::new(vec![
            WorkItem::new(&hung, TestFilter::all_ignored()),
            WorkItem::new(&ok, TestFilter::all_ignored()),
            WorkItem::new(&ok, TestFilter::all_ignored()),
        ]);

        let (provider, pool) = pool_over(vec![true], 2, 150);
        let results = collect(pool.execute(&manifest, CancellationToken::new())).await;

        let report = RunReport::from_results(&results);
        assert_eq!(report.timed_out, 1);
        assert_eq!(report.passed, 2);
        assert_eq!(provider.stopped.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancellation_reaches_every_item_and_lease() {
        let dir = tempfile::tempdir().unwrap();
        let slow = fake_test_binary(dir.path(), "slow_tests", "sleep 30");
        let items: Vec<WorkItem> = (0..4)
            .map(|_| WorkItem::new(&slow, TestFilter::all_ignored()))
            .collect();
        let manifest = WorkManifest::new(items);

        let (provider, pool) = pool_over(vec![true], 2, 60_000);
        let cancel = CancellationToken::new();
        let stream = pool.execute(&manifest, cancel.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let results = collect(stream).await;
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.status == RunStatus::Errored));

        // No leaked handles: every started node was stopped.
        assert_eq!(
            provider.started.load(Ordering::SeqCst),
            provider.stopped.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_empty_manifest_yields_empty_stream() {
        let (_provider, pool) = pool_over(vec![true], 2, 1_000);
        let manifest = WorkManifest::new(Vec::new());
        let results = collect(pool.execute(&manifest, CancellationToken::new())).await;
        assert!(results.is_empty());
    }
}
