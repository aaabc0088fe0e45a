//! The poll loop: receive, process, acknowledge, and retry failed cycles.
//!
//! ```text
//! Polling --success--> Polling
//! Polling --failure, retries left--> RetryWaiting --delay--> Polling
//! Polling --failure, no retries left--> Stopped
//! any     --stop requested--> Stopped
//! ```
//!
//! A stop request is honoured between cycles and cuts a retry wait short.
//! A cycle that has started always runs to completion.

use crate::consumer::ConsumerSettings;
use crate::error::IngestError;
use crate::processor::BatchProcessor;
use crate::retry::{RetryBudget, RetryDecision};
use crate::stats::ConsumerStats;
use queue_runtime::{DeleteEntry, QueueClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[cfg(test)]
#[path = "poll_loop_tests.rs"]
mod tests;

/// How a batch that failed part way is acknowledged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Nothing from a failed batch is deleted; every message is redelivered
    #[default]
    WholeBatch,
    /// Messages processed before the failure are deleted
    PerMessage,
}

/// Observable consumer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerState {
    Polling,
    RetryWaiting,
    Stopped,
}

impl std::fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Polling => write!(f, "polling"),
            Self::RetryWaiting => write!(f, "retry_waiting"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why a poll loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    StopRequested,
    RetriesExhausted,
}

/// Cooperative stop request shared between a consumer and its controller
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request a stop; repeated calls have no further effect
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once a stop has been requested
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// Counts from one successful cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub received: usize,
    pub events_emitted: u64,
    pub deleted: usize,
}

/// Sequential receive/process/acknowledge loop for one consumer
pub struct PollLoop {
    id: String,
    client: Arc<dyn QueueClient>,
    processor: BatchProcessor,
    settings: ConsumerSettings,
    budget: RetryBudget,
    stop: StopSignal,
    state: watch::Sender<ConsumerState>,
    stats: Arc<ConsumerStats>,
}

impl PollLoop {
    pub fn new(
        id: impl Into<String>,
        client: Arc<dyn QueueClient>,
        processor: BatchProcessor,
        settings: ConsumerSettings,
        stop: StopSignal,
    ) -> Self {
        let (state, _rx) = watch::channel(ConsumerState::Polling);
        Self {
            id: id.into(),
            client,
            processor,
            budget: settings.retry.budget(),
            settings,
            stop,
            state,
            stats: Arc::new(ConsumerStats::new()),
        }
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> Arc<ConsumerStats> {
        Arc::clone(&self.stats)
    }

    fn set_state(&self, next: ConsumerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(consumer = %self.id, from = %previous, to = %next, "Consumer state changed");
        }
    }

    /// Run cycles until a stop is requested or the retry budget runs out
    pub async fn run(&mut self) -> LoopExit {
        let queue = self.settings.request.queue.clone();
        info!(
            consumer = %self.id,
            queue = %queue,
            max_messages = self.settings.request.max_messages,
            retry_count = self.settings.retry.retry_count,
            "Consumer started"
        );

        let exit = loop {
            if self.stop.is_stopped() {
                break LoopExit::StopRequested;
            }
            self.set_state(ConsumerState::Polling);

            let error = match self.run_cycle().await {
                Ok(_) => {
                    self.budget.record_success();
                    continue;
                }
                Err(error) => error,
            };
            self.stats.record_failure();

            match self.budget.try_consume() {
                RetryDecision::Retry { delay, remaining } => {
                    warn!(
                        consumer = %self.id,
                        queue = %queue,
                        error = %error,
                        transient = error.is_transient(),
                        message_index = ?error.message_index(),
                        remaining_retries = remaining,
                        delay_ms = delay.as_millis() as u64,
                        "Poll cycle failed, retrying after delay"
                    );
                    self.stats.record_retry();
                    self.set_state(ConsumerState::RetryWaiting);

                    if !self.wait_before_retry(delay).await {
                        break LoopExit::StopRequested;
                    }
                }
                RetryDecision::Exhausted => {
                    error!(
                        consumer = %self.id,
                        queue = %queue,
                        error = %error,
                        retry_count = self.settings.retry.retry_count,
                        "Poll cycle failed with no retries left, stopping consumer"
                    );
                    self.stats.record_fatal();
                    break LoopExit::RetriesExhausted;
                }
            }
        };

        self.set_state(ConsumerState::Stopped);
        info!(consumer = %self.id, queue = %queue, exit = ?exit, "Consumer stopped");
        exit
    }

    /// Sleep out the retry delay; false when a stop cut it short
    async fn wait_before_retry(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.stop.stopped() => false,
        }
    }

    /// One receive, process and acknowledge iteration
    pub async fn run_cycle(&self) -> Result<CycleOutcome, IngestError> {
        let batch = self.client.receive(&self.settings.request).await?;

        if batch.is_empty() {
            self.stats.record_cycle(0, 0);
            debug!(consumer = %self.id, "Received empty batch");
            return Ok(CycleOutcome::default());
        }

        debug!(consumer = %self.id, batch_size = batch.len(), "Received batch");

        let outcome = self.processor.process(&batch).await;
        self.stats.record_cycle(batch.len(), outcome.events_emitted);
        let events_emitted = outcome.events_emitted;

        match outcome.failure {
            None => {
                let deleted = self.acknowledge(outcome.entries).await?;
                Ok(CycleOutcome {
                    received: batch.len(),
                    events_emitted,
                    deleted,
                })
            }
            Some(failure) => {
                if self.settings.ack_mode == AckMode::PerMessage && !outcome.entries.is_empty() {
                    // The cycle fails regardless; the processing error is the one reported
                    if let Err(ack_error) = self.acknowledge(outcome.entries).await {
                        warn!(
                            consumer = %self.id,
                            error = %ack_error,
                            "Failed to acknowledge messages processed before failure"
                        );
                    }
                }
                Err(failure.error)
            }
        }
    }

    /// Delete processed messages in one request
    ///
    /// Entries the service refuses are logged and left to be redelivered.
    async fn acknowledge(&self, entries: Vec<DeleteEntry>) -> Result<usize, IngestError> {
        let requested = entries.len();
        let result = self
            .client
            .delete_batch(&self.settings.request.queue, entries)
            .await?;

        for failure in &result.failed {
            warn!(
                consumer = %self.id,
                queue = %self.settings.request.queue,
                entry_id = %failure.id,
                code = %failure.code,
                sender_fault = failure.sender_fault,
                message = %failure.message,
                "Message was not deleted and will be redelivered"
            );
        }

        self.stats
            .record_deleted(result.successful.len(), result.failed.len());
        debug!(
            consumer = %self.id,
            requested,
            deleted = result.successful.len(),
            "Acknowledged batch"
        );

        Ok(result.successful.len())
    }
}
