//! Buffered queue client that prefetches receive batches in the background.
//!
//! The first `receive` starts a prefetch task bound to that request's queue.
//! The task keeps up to `max_inflight_receive_batches` long-poll receives
//! outstanding and parks completed batches in a channel holding at most
//! `max_done_receive_batches`. When the channel is full, finished receives
//! wait with their in-flight slot held, so prefetching stops until the
//! consumer catches up.
//!
//! A consumer-side `receive` serves leftover messages first, then waits up
//! to `max_batch_open` (at least one second) for the next completed batch
//! and returns an empty batch if none arrives. Prefetched messages count
//! against the queue's visibility timeout from the moment they are received.
//!
//! Failed prefetches do not queue up. Only the most recent failure is kept,
//! a successful prefetch clears it, and a `receive` reports it only when it
//! happened after that `receive` began.

use crate::client::QueueClient;
use crate::error::QueueError;
use crate::message::{
    DeleteBatchResult, DeleteEntry, QueueAddress, ReceiveRequest, ReceivedBatch, ReceivedMessage,
    MAX_MESSAGES_PER_BATCH, MAX_WAIT_TIME,
};
use crate::provider::{BufferConfig, ProviderType};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info};

#[cfg(test)]
#[path = "buffered_tests.rs"]
mod tests;

/// Queue client wrapper that buffers receives ahead of demand
pub struct BufferedQueueClient {
    inner: Arc<dyn QueueClient>,
    config: BufferConfig,
    state: Mutex<BufferState>,
}

#[derive(Default)]
struct BufferState {
    prefetch: Option<Prefetcher>,
    /// Messages from a completed batch not yet handed out
    pending: VecDeque<ReceivedMessage>,
    closed: bool,
}

struct Prefetcher {
    queue: QueueAddress,
    done: mpsc::Receiver<ReceivedBatch>,
    failure: Arc<FailureSlot>,
    task: JoinHandle<()>,
}

/// Latest prefetch failure, replaced by newer failures and cleared by any
/// successful receive
#[derive(Default)]
struct FailureSlot {
    latest: Mutex<Option<(Instant, QueueError)>>,
    notify: Notify,
}

impl FailureSlot {
    async fn record(&self, error: QueueError) {
        *self.latest.lock().await = Some((Instant::now(), error));
        self.notify.notify_one();
    }

    async fn clear(&self) {
        self.latest.lock().await.take();
    }

    /// Take the failure if it happened at or after `since`; older ones are dropped
    async fn take_since(&self, since: Instant) -> Option<QueueError> {
        match self.latest.lock().await.take() {
            Some((at, error)) if at >= since => Some(error),
            Some((_, stale)) => {
                debug!(error = %stale, "Dropped prefetch failure from before this receive");
                None
            }
            None => None,
        }
    }
}

impl BufferedQueueClient {
    /// Wrap a client with receive buffering
    pub fn new(inner: Arc<dyn QueueClient>, config: BufferConfig) -> Self {
        Self {
            inner,
            config,
            state: Mutex::new(BufferState::default()),
        }
    }

    /// Buffer settings in effect
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Long-poll wait for prefetch receives, and the longest a consumer-side
    /// receive waits for a batch
    fn prefetch_wait(&self) -> Duration {
        self.config
            .max_batch_open()
            .clamp(Duration::from_secs(1), MAX_WAIT_TIME)
    }

    fn start_prefetch(&self, request: &ReceiveRequest) -> Prefetcher {
        let (tx, rx) = mpsc::channel(self.config.max_done_receive_batches.max(1));
        let failure = Arc::new(FailureSlot::default());

        let mut prefetch_request = ReceiveRequest::new(request.queue.clone())
            .with_max_messages(MAX_MESSAGES_PER_BATCH)
            .with_wait_time(self.prefetch_wait());
        if let Some(visibility) = request.visibility_timeout {
            prefetch_request = prefetch_request.with_visibility_timeout(visibility);
        }

        info!(
            queue = %request.queue,
            max_inflight = self.config.max_inflight_receive_batches,
            max_done = self.config.max_done_receive_batches,
            "Starting receive prefetch"
        );

        let task = tokio::spawn(prefetch_loop(
            Arc::clone(&self.inner),
            prefetch_request,
            self.config.max_inflight_receive_batches.max(1),
            self.config.max_batch_open(),
            tx,
            Arc::clone(&failure),
        ));

        Prefetcher {
            queue: request.queue.clone(),
            done: rx,
            failure,
            task,
        }
    }
}

/// Launch receives while in-flight slots are free, until the consumer side
/// of the channel goes away
async fn prefetch_loop(
    inner: Arc<dyn QueueClient>,
    request: ReceiveRequest,
    max_inflight: usize,
    error_backoff: Duration,
    done: mpsc::Sender<ReceivedBatch>,
    failure: Arc<FailureSlot>,
) {
    let permits = Arc::new(Semaphore::new(max_inflight));
    let mut tasks = JoinSet::new();

    loop {
        while tasks.try_join_next().is_some() {}

        let permit = tokio::select! {
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = done.closed() => break,
        };

        let inner = Arc::clone(&inner);
        let request = request.clone();
        let done = done.clone();
        let failure = Arc::clone(&failure);

        tasks.spawn(async move {
            let result = inner.receive(&request).await;

            match result {
                Ok(batch) if batch.is_empty() => failure.clear().await,
                Ok(batch) => {
                    failure.clear().await;
                    debug!(queue = %request.queue, batch_size = batch.len(), "Prefetched batch");
                    let _ = done.send(batch).await;
                }
                Err(error) => {
                    debug!(queue = %request.queue, error = %error, "Prefetch receive failed");
                    failure.record(error).await;
                    // Hold the slot so a failing service is not hammered
                    tokio::time::sleep(error_backoff).await;
                }
            }

            drop(permit);
        });
    }

    tasks.shutdown().await;
}

fn take_up_to(pending: &mut VecDeque<ReceivedMessage>, max: u32) -> ReceivedBatch {
    let count = (max as usize).min(pending.len());
    ReceivedBatch::new(pending.drain(..count).collect())
}

#[async_trait]
impl QueueClient for BufferedQueueClient {
    async fn receive(&self, request: &ReceiveRequest) -> Result<ReceivedBatch, QueueError> {
        let started = Instant::now();
        let mut state = self.state.lock().await;

        if state.closed {
            return Err(QueueError::ClientClosed);
        }

        // Prefetching serves only the queue of the first request
        let other_queue = matches!(&state.prefetch, Some(p) if p.queue != request.queue);
        if other_queue {
            drop(state);
            return self.inner.receive(request).await;
        }

        if state.prefetch.is_none() {
            state.prefetch = Some(self.start_prefetch(request));
        }

        if !state.pending.is_empty() {
            return Ok(take_up_to(&mut state.pending, request.max_messages));
        }

        let deadline = started + self.prefetch_wait();
        let BufferState {
            prefetch, pending, ..
        } = &mut *state;
        let Some(prefetch) = prefetch.as_mut() else {
            return Err(QueueError::ClientClosed);
        };

        loop {
            tokio::select! {
                biased;
                batch = prefetch.done.recv() => {
                    let Some(batch) = batch else {
                        return Err(QueueError::ClientClosed);
                    };
                    pending.extend(batch);
                    return Ok(take_up_to(pending, request.max_messages));
                }
                _ = prefetch.failure.notify.notified() => {
                    if let Some(error) = prefetch.failure.take_since(started).await {
                        return Err(error);
                    }
                }
                _ = tokio::time::sleep_until(deadline) => return Ok(ReceivedBatch::empty()),
            }
        }
    }

    async fn delete_batch(
        &self,
        queue: &QueueAddress,
        entries: Vec<DeleteEntry>,
    ) -> Result<DeleteBatchResult, QueueError> {
        self.inner.delete_batch(queue, entries).await
    }

    fn provider_type(&self) -> ProviderType {
        self.inner.provider_type()
    }

    async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if state.closed {
            return;
        }

        state.closed = true;
        if let Some(prefetch) = state.prefetch.take() {
            prefetch.task.abort();
            debug!(queue = %prefetch.queue, "Stopped receive prefetch");
        }
        if !state.pending.is_empty() {
            debug!(
                dropped = state.pending.len(),
                "Discarding buffered messages; they become visible again after their timeout"
            );
            state.pending.clear();
        }
        drop(state);

        self.inner.shutdown().await;
    }
}

impl Drop for BufferedQueueClient {
    fn drop(&mut self) {
        if let Some(prefetch) = self.state.get_mut().prefetch.take() {
            prefetch.task.abort();
        }
    }
}
