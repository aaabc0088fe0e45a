//! Consumer lifecycle: build the client, run the poll loop on its own task,
//! release the client when the loop ends.

use crate::error::IngestError;
use crate::poll_loop::{AckMode, ConsumerState, LoopExit, PollLoop, StopSignal};
use crate::processor::BatchProcessor;
use crate::retry::RetryPolicy;
use crate::stats::{ConsumerStats, StatsSnapshot};
use queue_runtime::{QueueClient, QueueClientFactory, QueueConfig, ReceiveRequest};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;

/// Per-consumer behaviour, fixed at start-up
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Receive request reused by every cycle
    pub request: ReceiveRequest,
    pub retry: RetryPolicy,
    pub ack_mode: AckMode,
}

impl ConsumerSettings {
    pub fn new(request: ReceiveRequest) -> Self {
        Self {
            request,
            retry: RetryPolicy::default(),
            ack_mode: AckMode::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }
}

/// A consumer that has not been started yet
pub struct Consumer {
    id: String,
    settings: ConsumerSettings,
    processor: BatchProcessor,
}

impl Consumer {
    pub fn new(id: impl Into<String>, settings: ConsumerSettings, processor: BatchProcessor) -> Self {
        Self {
            id: id.into(),
            settings,
            processor,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Build a client from configuration and start polling
    pub async fn start(self, config: QueueConfig) -> Result<ConsumerHandle, IngestError> {
        let client = QueueClientFactory::create_client(config).await?;
        Ok(self.start_with_client(client))
    }

    /// Start polling with an existing client
    ///
    /// The consumer owns the client from here on and shuts it down once the
    /// loop ends.
    pub fn start_with_client(self, client: Arc<dyn QueueClient>) -> ConsumerHandle {
        let stop = StopSignal::new();
        let mut poll_loop = PollLoop::new(
            self.id.clone(),
            Arc::clone(&client),
            self.processor,
            self.settings,
            stop.clone(),
        );
        let state = poll_loop.state_receiver();
        let stats = poll_loop.stats();

        let id = self.id;
        let task_id = id.clone();
        let task = tokio::spawn(async move {
            let exit = poll_loop.run().await;
            client.shutdown().await;
            info!(consumer = %task_id, "Queue client released");
            exit
        });

        ConsumerHandle {
            id,
            stop,
            state,
            stats,
            task,
        }
    }
}

/// Controller for a running consumer
pub struct ConsumerHandle {
    id: String,
    stop: StopSignal,
    state: watch::Receiver<ConsumerState>,
    stats: Arc<ConsumerStats>,
    task: JoinHandle<LoopExit>,
}

impl ConsumerHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Ask the consumer to stop after its current cycle
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn is_running(&self) -> bool {
        *self.state.borrow() != ConsumerState::Stopped && !self.task.is_finished()
    }

    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConsumerState> {
        self.state.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Live counters, still readable after `join`
    pub fn shared_stats(&self) -> Arc<ConsumerStats> {
        Arc::clone(&self.stats)
    }

    /// Wait for the loop to end and the client to be released
    pub async fn join(self) -> Result<LoopExit, IngestError> {
        self.task.await.map_err(|e| IngestError::Task {
            message: e.to_string(),
        })
    }
}
