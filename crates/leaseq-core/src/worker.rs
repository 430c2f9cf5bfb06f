use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::error::AppError;
use crate::models::{ClaimedItem, ItemId, ItemResult, ItemResults, SubmitReport};
use crate::traits::{Analyzer, QueueApi};

/// Events emitted by the worker for monitoring/logging.
#[derive(Debug, Clone)]
pub enum WorkerEvent<'a> {
    Started {
        worker_id: &'a str,
    },
    Polling,
    BatchClaimed {
        count: usize,
    },
    ItemAnalyzed {
        id: ItemId,
    },
    ItemFailed {
        id: ItemId,
        error: &'a str,
    },
    BatchSubmitted {
        report: &'a SubmitReport,
    },
    SubmitFailed {
        error: &'a str,
        attempt: u32,
        will_retry: bool,
    },
    Stopped {
        worker_id: &'a str,
    },
}

impl WorkerEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Started { .. } => "started",
            WorkerEvent::Polling => "polling",
            WorkerEvent::BatchClaimed { .. } => "batch_claimed",
            WorkerEvent::ItemAnalyzed { .. } => "item_analyzed",
            WorkerEvent::ItemFailed { .. } => "item_failed",
            WorkerEvent::BatchSubmitted { .. } => "batch_submitted",
            WorkerEvent::SubmitFailed { .. } => "submit_failed",
            WorkerEvent::Stopped { .. } => "stopped",
        }
    }
}

/// Trait for receiving worker events (decoupled logging).
pub trait WorkerReporter: Send + Sync {
    fn report(&self, event: WorkerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWorkerReporter;

impl WorkerReporter for TracingWorkerReporter {
    fn report(&self, event: WorkerEvent<'_>) {
        match event {
            WorkerEvent::Started { worker_id } => {
                tracing::info!(%worker_id, "Worker started");
            }
            WorkerEvent::Polling => {
                tracing::debug!("Polling for work items");
            }
            WorkerEvent::BatchClaimed { count } => {
                tracing::info!(count, "Batch claimed");
            }
            WorkerEvent::ItemAnalyzed { id } => {
                tracing::debug!(%id, "Item analyzed");
            }
            WorkerEvent::ItemFailed { id, error } => {
                tracing::warn!(%id, %error, "Analysis failed; lease left to expire");
            }
            WorkerEvent::BatchSubmitted { report } => {
                tracing::info!(
                    applied = report.applied.len(),
                    rejected = report.per_item_errors.len(),
                    "Results submitted"
                );
            }
            WorkerEvent::SubmitFailed {
                error,
                attempt,
                will_retry,
            } => {
                tracing::error!(%error, attempt, will_retry, "Submit failed");
            }
            WorkerEvent::Stopped { worker_id } => {
                tracing::info!(%worker_id, "Worker stopped");
            }
        }
    }
}

/// Worker that leases batches, analyzes each item, and submits the results.
pub struct WorkerService<Q, A>
where
    Q: QueueApi,
    A: Analyzer,
{
    queue: Q,
    analyzer: A,
    config: WorkerConfig,
}

impl<Q, A> WorkerService<Q, A>
where
    Q: QueueApi,
    A: Analyzer,
{
    pub fn new(queue: Q, analyzer: A, config: WorkerConfig) -> Self {
        Self {
            queue,
            analyzer,
            config,
        }
    }

    /// Run the worker loop until cancellation.
    ///
    /// A batch in flight when the token fires is finished and submitted
    /// before the loop exits.
    pub async fn run<WR: WorkerReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &WR,
    ) -> Result<(), AppError> {
        reporter.report(WorkerEvent::Started {
            worker_id: &self.config.worker_id,
        });

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            match self.process_next_batch(reporter).await {
                Ok(0) => {
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval) => {}
                        () = cancel_token.cancelled() => break,
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Batch failed");
                    tokio::select! {
                        () = tokio::time::sleep(self.config.poll_interval * 2) => {}
                        () = cancel_token.cancelled() => break,
                    }
                }
            }
        }

        reporter.report(WorkerEvent::Stopped {
            worker_id: &self.config.worker_id,
        });

        Ok(())
    }

    /// Claim one batch and work it to completion. Returns the number of
    /// items claimed; zero means the queue had nothing eligible.
    ///
    /// Fails with the last submit error when the results could not be
    /// delivered. Those items stay leased until their expiry.
    pub async fn process_next_batch<WR: WorkerReporter>(
        &self,
        reporter: &WR,
    ) -> Result<usize, AppError> {
        reporter.report(WorkerEvent::Polling);

        let batch = self.queue.claim_batch(self.config.batch_size).await?;
        if batch.is_empty() {
            return Ok(0);
        }
        reporter.report(WorkerEvent::BatchClaimed { count: batch.len() });

        let rows = self.analyze_batch(&batch, reporter).await;
        if !rows.is_empty() {
            self.submit_with_retry(rows, reporter).await?;
        }

        Ok(batch.len())
    }

    async fn analyze_batch<WR: WorkerReporter>(
        &self,
        batch: &[ClaimedItem],
        reporter: &WR,
    ) -> Vec<ItemResult> {
        let outcomes: Vec<(ClaimedItem, Result<ItemResults, AppError>)> =
            stream::iter(batch.iter().cloned())
                .map(|item| {
                    let analyzer = self.analyzer.clone();
                    async move {
                        let outcome = analyzer.analyze(&item).await;
                        (item, outcome)
                    }
                })
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;

        let mut rows = Vec::with_capacity(outcomes.len());
        for (item, outcome) in outcomes {
            match outcome {
                Ok(results) => {
                    reporter.report(WorkerEvent::ItemAnalyzed { id: item.id });
                    rows.push(ItemResult::for_claim(&item, results));
                }
                Err(e) => {
                    let error = e.to_string();
                    reporter.report(WorkerEvent::ItemFailed {
                        id: item.id,
                        error: &error,
                    });
                }
            }
        }
        rows.sort_by_key(|row| row.id);
        rows
    }

    async fn submit_with_retry<WR: WorkerReporter>(
        &self,
        rows: Vec<ItemResult>,
        reporter: &WR,
    ) -> Result<SubmitReport, AppError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.queue.submit_results(rows.clone()).await {
                Ok(report) => {
                    reporter.report(WorkerEvent::BatchSubmitted { report: &report });
                    return Ok(report);
                }
                Err(e) => {
                    let will_retry = e.is_retryable() && attempt <= self.config.submit_retries;
                    let error = e.to_string();
                    reporter.report(WorkerEvent::SubmitFailed {
                        error: &error,
                        attempt,
                        will_retry,
                    });
                    if !will_retry {
                        return Err(e);
                    }
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }
}
