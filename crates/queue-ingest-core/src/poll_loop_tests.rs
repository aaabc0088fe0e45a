//! Tests for the poll loop and its retry behaviour.

use super::*;
use crate::codec::JsonCodec;
use crate::error::SinkError;
use crate::event::{Decorator, Event};
use crate::retry::RetryPolicy;
use crate::sink::EventSink;
use async_trait::async_trait;
use bytes::Bytes;
use queue_runtime::{
    DeleteBatchResult, DeleteFailure, MessageId, ProviderType, QueueAddress, QueueError,
    ReceiptHandle, ReceiveRequest, ReceivedBatch, ReceivedMessage,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

// ============================================================================
// Test Doubles
// ============================================================================

/// Client answering receives from a script, then idling on empty batches
#[derive(Default)]
struct ScriptedClient {
    script: Mutex<VecDeque<Result<ReceivedBatch, QueueError>>>,
    receives: AtomicU32,
    deletes: Mutex<Vec<Vec<String>>>,
    rejected_ids: Vec<String>,
    fail_deletes: bool,
}

impl ScriptedClient {
    fn with_script(script: Vec<Result<ReceivedBatch, QueueError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    fn delete_calls(&self) -> Vec<Vec<String>> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueClient for ScriptedClient {
    async fn receive(&self, _request: &ReceiveRequest) -> Result<ReceivedBatch, QueueError> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                // Behave like a long poll on an empty queue
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(ReceivedBatch::empty())
            }
        }
    }

    async fn delete_batch(
        &self,
        _queue: &QueueAddress,
        entries: Vec<queue_runtime::DeleteEntry>,
    ) -> Result<DeleteBatchResult, QueueError> {
        self.deletes
            .lock()
            .unwrap()
            .push(entries.iter().map(|e| e.id.clone()).collect());

        if self.fail_deletes {
            return Err(QueueError::Throttled {
                message: "Rate exceeded".to_string(),
            });
        }

        let (failed, successful): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| self.rejected_ids.contains(&e.id));

        Ok(DeleteBatchResult {
            successful: successful.into_iter().map(|e| e.id).collect(),
            failed: failed
                .into_iter()
                .map(|e| DeleteFailure {
                    id: e.id,
                    code: "ReceiptHandleIsInvalid".to_string(),
                    message: "The receipt handle has expired".to_string(),
                    sender_fault: true,
                })
                .collect(),
        })
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }

    async fn shutdown(&self) {}
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<Event>>,
    fail_flush: bool,
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: Event) -> Result<(), SinkError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        if self.fail_flush {
            return Err(SinkError::Io(std::io::Error::other("broken pipe")));
        }
        Ok(())
    }
}

/// Counts warnings and errors logged by the poll loop
#[derive(Clone, Default)]
struct LogCounter {
    warnings: Arc<AtomicUsize>,
    errors: Arc<AtomicUsize>,
}

impl<S: tracing::Subscriber> Layer<S> for LogCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target() != "queue_ingest_core::poll_loop" {
            return;
        }
        match *metadata.level() {
            Level::WARN => self.warnings.fetch_add(1, Ordering::SeqCst),
            Level::ERROR => self.errors.fetch_add(1, Ordering::SeqCst),
            _ => 0,
        };
    }
}

fn capture_logs() -> (LogCounter, tracing::subscriber::DefaultGuard) {
    let counter = LogCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (counter, guard)
}

// ============================================================================
// Helpers
// ============================================================================

fn batch(bodies: &[&str]) -> ReceivedBatch {
    ReceivedBatch::new(
        bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                ReceivedMessage::new(
                    MessageId::new(),
                    Bytes::from(body.to_string()),
                    ReceiptHandle::new(format!("receipt-{}", i)),
                )
            })
            .collect(),
    )
}

fn receive_failure() -> Result<ReceivedBatch, QueueError> {
    Err(QueueError::ConnectionFailed {
        message: "connection reset by peer".to_string(),
    })
}

fn settings(retry_count: u32) -> ConsumerSettings {
    ConsumerSettings::new(ReceiveRequest::new("poll-loop-test".parse().unwrap()))
        .with_retry(RetryPolicy::new(retry_count, Duration::from_secs(10)))
}

fn poll_loop(client: Arc<ScriptedClient>, settings: ConsumerSettings) -> (PollLoop, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let processor = BatchProcessor::new(Arc::new(JsonCodec), Decorator::default(), sink.clone());
    let poll_loop = PollLoop::new("consumer-0", client, processor, settings, StopSignal::new());
    (poll_loop, sink)
}

// ============================================================================
// Single Cycle Tests
// ============================================================================

#[tokio::test]
async fn test_cycle_acknowledges_each_message_once() {
    let client = Arc::new(ScriptedClient::with_script(vec![Ok(batch(&[
        r#"{"n":0}"#,
        r#"{"n":1}"#,
        r#"{"n":2}"#,
    ]))]));
    let (poll_loop, sink) = poll_loop(client.clone(), settings(5));

    let outcome = poll_loop.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome {
            received: 3,
            events_emitted: 3,
            deleted: 3
        }
    );
    assert_eq!(sink.events.lock().unwrap().len(), 3);
    assert_eq!(client.delete_calls(), vec![vec!["0", "1", "2"]]);
    assert_eq!(poll_loop.stats().snapshot().messages_deleted, 3);
}

#[tokio::test]
async fn test_empty_batch_is_never_acknowledged() {
    let client = Arc::new(ScriptedClient::with_script(vec![Ok(ReceivedBatch::empty())]));
    let (poll_loop, _sink) = poll_loop(client.clone(), settings(5));

    let outcome = poll_loop.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::default());
    assert!(client.delete_calls().is_empty());
    assert_eq!(poll_loop.stats().snapshot().empty_polls, 1);
}

#[tokio::test]
async fn test_decode_failure_acknowledges_nothing_by_default() {
    let client = Arc::new(ScriptedClient::with_script(vec![Ok(batch(&[
        r#"{"n":0}"#,
        "not json",
        r#"{"n":2}"#,
    ]))]));
    let (poll_loop, _sink) = poll_loop(client.clone(), settings(5));

    let error = poll_loop.run_cycle().await.unwrap_err();

    assert!(matches!(error, IngestError::Decode { index: 1, .. }));
    assert!(client.delete_calls().is_empty());
}

#[tokio::test]
async fn test_per_message_mode_acknowledges_clean_prefix() {
    let client = Arc::new(ScriptedClient::with_script(vec![Ok(batch(&[
        r#"{"n":0}"#,
        r#"{"n":1}"#,
        "not json",
    ]))]));
    let (poll_loop, _sink) = poll_loop(
        client.clone(),
        settings(5).with_ack_mode(AckMode::PerMessage),
    );

    let error = poll_loop.run_cycle().await.unwrap_err();

    assert!(matches!(error, IngestError::Decode { index: 2, .. }));
    assert_eq!(client.delete_calls(), vec![vec!["0", "1"]]);
}

#[tokio::test]
async fn test_per_message_mode_acknowledges_nothing_after_flush_failure() {
    let client = Arc::new(ScriptedClient::with_script(vec![Ok(batch(&[
        r#"{"n":0}"#,
        r#"{"n":1}"#,
    ]))]));
    let sink = Arc::new(RecordingSink {
        fail_flush: true,
        ..RecordingSink::default()
    });
    let processor = BatchProcessor::new(Arc::new(JsonCodec), Decorator::default(), sink.clone());
    let poll_loop = PollLoop::new(
        "consumer-0",
        client.clone(),
        processor,
        settings(5).with_ack_mode(AckMode::PerMessage),
        StopSignal::new(),
    );

    let error = poll_loop.run_cycle().await.unwrap_err();

    assert!(matches!(error, IngestError::Emit { index: 1, .. }));
    assert_eq!(sink.events.lock().unwrap().len(), 2);
    assert!(client.delete_calls().is_empty());
}

#[tokio::test]
async fn test_rejected_delete_entries_do_not_fail_cycle() {
    let client = Arc::new(ScriptedClient {
        rejected_ids: vec!["1".to_string()],
        ..ScriptedClient::with_script(vec![Ok(batch(&[r#"{"n":0}"#, r#"{"n":1}"#]))])
    });
    let (poll_loop, _sink) = poll_loop(client.clone(), settings(5));

    let outcome = poll_loop.run_cycle().await.unwrap();

    assert_eq!(outcome.deleted, 1);
    let stats = poll_loop.stats().snapshot();
    assert_eq!(stats.messages_deleted, 1);
    assert_eq!(stats.delete_failures, 1);
}

#[tokio::test]
async fn test_delete_error_fails_cycle() {
    let client = Arc::new(ScriptedClient {
        fail_deletes: true,
        ..ScriptedClient::with_script(vec![Ok(batch(&[r#"{"n":0}"#]))])
    });
    let (poll_loop, _sink) = poll_loop(client.clone(), settings(5));

    let error = poll_loop.run_cycle().await.unwrap_err();
    assert!(matches!(error, IngestError::Queue(QueueError::Throttled { .. })));
}

// ============================================================================
// Retry Tests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_tolerated_failures_then_success_keeps_polling() {
    let (logs, _guard) = capture_logs();
    let client = Arc::new(ScriptedClient::with_script(vec![
        receive_failure(),
        receive_failure(),
        Ok(batch(&[r#"{"n":0}"#])),
    ]));
    let (mut poll_loop, sink) = poll_loop(client.clone(), settings(2));
    let state = poll_loop.state_receiver();
    let stats = poll_loop.stats();
    let stop = poll_loop.stop.clone();

    let started = tokio::time::Instant::now();
    let task = tokio::spawn(async move { poll_loop.run().await });

    // Two 10s retry waits, then idle polling
    tokio::time::sleep(Duration::from_secs(25)).await;

    assert_eq!(*state.borrow(), ConsumerState::Polling);
    assert_eq!(sink.events.lock().unwrap().len(), 1);
    assert_eq!(logs.warnings.load(Ordering::SeqCst), 2);
    assert_eq!(logs.errors.load(Ordering::SeqCst), 0);
    assert_eq!(stats.snapshot().retries, 2);

    stop.stop();
    assert_eq!(task.await.unwrap(), LoopExit::StopRequested);
    assert!(started.elapsed() >= Duration::from_secs(20));
    assert_eq!(*state.borrow(), ConsumerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_stop_consumer() {
    let (logs, _guard) = capture_logs();
    let client = Arc::new(ScriptedClient::with_script(vec![
        receive_failure(),
        receive_failure(),
        receive_failure(),
        Ok(batch(&[r#"{"n":0}"#])),
    ]));
    let (mut poll_loop, sink) = poll_loop(client.clone(), settings(2));

    let exit = poll_loop.run().await;

    assert_eq!(exit, LoopExit::RetriesExhausted);
    assert_eq!(poll_loop.state(), ConsumerState::Stopped);
    assert_eq!(client.receives.load(Ordering::SeqCst), 3);
    assert_eq!(logs.warnings.load(Ordering::SeqCst), 2);
    assert_eq!(logs.errors.load(Ordering::SeqCst), 1);
    assert!(sink.events.lock().unwrap().is_empty());

    let stats = poll_loop.stats().snapshot();
    assert_eq!(stats.failed_cycles, 3);
    assert_eq!(stats.fatal_errors, 1);

    // Nothing polls after the loop has ended
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(client.receives.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_stop_on_first_failure() {
    let (logs, _guard) = capture_logs();
    let client = Arc::new(ScriptedClient::with_script(vec![receive_failure()]));
    let (mut poll_loop, _sink) = poll_loop(client.clone(), settings(0));

    assert_eq!(poll_loop.run().await, LoopExit::RetriesExhausted);
    assert_eq!(logs.warnings.load(Ordering::SeqCst), 0);
    assert_eq!(logs.errors.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_retry_wait() {
    let client = Arc::new(ScriptedClient::with_script(
        (0..10).map(|_| receive_failure()).collect(),
    ));
    let (mut poll_loop, _sink) = poll_loop(client.clone(), settings(5));
    let state = poll_loop.state_receiver();
    let stop = poll_loop.stop.clone();

    let started = tokio::time::Instant::now();
    let task = tokio::spawn(async move { poll_loop.run().await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(*state.borrow(), ConsumerState::RetryWaiting);

    stop.stop();
    assert_eq!(task.await.unwrap(), LoopExit::StopRequested);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(client.receives.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_before_run_skips_polling() {
    let client = Arc::new(ScriptedClient::default());
    let (mut poll_loop, _sink) = poll_loop(client.clone(), settings(5));

    poll_loop.stop.stop();
    poll_loop.stop.stop();

    assert_eq!(poll_loop.run().await, LoopExit::StopRequested);
    assert_eq!(client.receives.load(Ordering::SeqCst), 0);
    assert_eq!(poll_loop.state(), ConsumerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_after_success_reset_allows_repeated_bursts() {
    let client = Arc::new(ScriptedClient::with_script(vec![
        receive_failure(),
        Ok(ReceivedBatch::empty()),
        receive_failure(),
        Ok(ReceivedBatch::empty()),
        receive_failure(),
    ]));
    let mut settings = settings(1);
    settings.retry = settings
        .retry
        .clone()
        .with_reset(crate::retry::RetryResetPolicy::AfterSuccess);
    let (mut poll_loop, _sink) = poll_loop(client.clone(), settings);
    let stop = poll_loop.stop.clone();

    let task = tokio::spawn(async move { poll_loop.run().await });
    tokio::time::sleep(Duration::from_secs(45)).await;

    stop.stop();
    assert_eq!(task.await.unwrap(), LoopExit::StopRequested);
    assert!(client.receives.load(Ordering::SeqCst) > 5);
}
