//! In-memory queue provider implementation for testing and development.
//!
//! This module provides a small queue implementation that:
//! - Hides received messages for a visibility timeout and redelivers them
//!   when the timeout lapses without a delete
//! - Emulates long polling when the queue is empty
//! - Reports unknown receipt handles as per-entry delete failures
//!
//! Queues are keyed by queue name, so a queue URL and its bare name address
//! the same queue. Queues are created on first use.

use crate::client::QueueProvider;
use crate::error::QueueError;
use crate::message::{
    DeleteBatchResult, DeleteEntry, DeleteFailure, MessageId, QueueAddress, ReceiptHandle,
    ReceiveRequest, ReceivedBatch, ReceivedMessage, Timestamp,
};
use crate::provider::{InMemoryConfig, ProviderType};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use tokio::sync::Notify;
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Thread-safe storage for all queues
struct QueueStorage {
    queues: HashMap<String, InMemoryQueue>,
    config: InMemoryConfig,
}

impl QueueStorage {
    fn new(config: InMemoryConfig) -> Self {
        Self {
            queues: HashMap::new(),
            config,
        }
    }

    /// Get or create a queue
    fn get_or_create_queue(&mut self, queue: &QueueAddress) -> &mut InMemoryQueue {
        self.queues
            .entry(queue.queue_name().to_string())
            .or_insert_with(InMemoryQueue::new)
    }
}

/// Internal queue state for a single queue
struct InMemoryQueue {
    /// Visible messages in delivery order
    messages: VecDeque<StoredMessage>,
    /// Received messages keyed by receipt handle
    in_flight: HashMap<String, InFlightMessage>,
}

impl InMemoryQueue {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            in_flight: HashMap::new(),
        }
    }

    /// Return messages whose visibility timeout lapsed to the front of the queue
    fn requeue_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, m)| m.visible_at <= now)
            .map(|(handle, _)| handle.clone())
            .collect();

        let mut returned: Vec<StoredMessage> = expired
            .iter()
            .filter_map(|handle| self.in_flight.remove(handle))
            .map(|m| m.message)
            .collect();
        returned.sort_by_key(|m| m.sequence);

        for message in returned.into_iter().rev() {
            self.messages.push_front(message);
        }
    }

    fn len(&self) -> usize {
        self.messages.len() + self.in_flight.len()
    }
}

/// A message stored in the queue with metadata
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    attributes: HashMap<String, String>,
    delivery_count: u32,
    sequence: u64,
}

/// A message currently hidden by its visibility timeout
struct InFlightMessage {
    message: StoredMessage,
    visible_at: Instant,
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// In-memory queue provider implementation
pub struct InMemoryProvider {
    storage: Arc<RwLock<QueueStorage>>,
    arrivals: Arc<Notify>,
    sequence: std::sync::atomic::AtomicU64,
}

impl InMemoryProvider {
    /// Create new in-memory provider with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            storage: Arc::new(RwLock::new(QueueStorage::new(config))),
            arrivals: Arc::new(Notify::new()),
            sequence: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn write_storage(&self) -> Result<RwLockWriteGuard<'_, QueueStorage>, QueueError> {
        self.storage.write().map_err(|_| QueueError::ProviderError {
            provider: ProviderType::InMemory.to_string(),
            code: "StoragePoisoned".to_string(),
            message: "queue storage lock was poisoned".to_string(),
        })
    }

    /// Add a message to the back of a queue
    pub fn enqueue(
        &self,
        queue: &QueueAddress,
        body: impl Into<Bytes>,
    ) -> Result<MessageId, QueueError> {
        self.enqueue_with_attributes(queue, body, HashMap::new())
    }

    /// Add a message with attributes to the back of a queue
    pub fn enqueue_with_attributes(
        &self,
        queue: &QueueAddress,
        body: impl Into<Bytes>,
        attributes: HashMap<String, String>,
    ) -> Result<MessageId, QueueError> {
        let message_id = MessageId::new();
        let sequence = self
            .sequence
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        {
            let mut storage = self.write_storage()?;
            let max_queue_size = storage.config.max_queue_size;
            let target = storage.get_or_create_queue(queue);

            if target.len() >= max_queue_size {
                return Err(QueueError::ProviderError {
                    provider: ProviderType::InMemory.to_string(),
                    code: "QueueFull".to_string(),
                    message: format!("queue holds the maximum of {} messages", max_queue_size),
                });
            }

            target.messages.push_back(StoredMessage {
                message_id: message_id.clone(),
                body: body.into(),
                attributes,
                delivery_count: 0,
                sequence,
            });
        }

        self.arrivals.notify_waiters();
        Ok(message_id)
    }

    /// Number of messages currently visible in a queue
    pub fn visible_count(&self, queue: &QueueAddress) -> usize {
        self.storage
            .read()
            .ok()
            .and_then(|s| s.queues.get(queue.queue_name()).map(|q| q.messages.len()))
            .unwrap_or(0)
    }

    /// Number of received messages awaiting delete or redelivery
    pub fn in_flight_count(&self, queue: &QueueAddress) -> usize {
        self.storage
            .read()
            .ok()
            .and_then(|s| s.queues.get(queue.queue_name()).map(|q| q.in_flight.len()))
            .unwrap_or(0)
    }

    fn take_visible(&self, request: &ReceiveRequest) -> Result<Vec<ReceivedMessage>, QueueError> {
        let mut storage = self.write_storage()?;
        let visibility = request
            .visibility_timeout
            .unwrap_or_else(|| storage.config.visibility_timeout());

        let queue = storage.get_or_create_queue(&request.queue);
        let now = Instant::now();
        queue.requeue_expired(now);

        let take = (request.max_messages as usize).min(queue.messages.len());
        let mut received = Vec::with_capacity(take);

        for mut message in queue.messages.drain(..take).collect::<Vec<_>>() {
            message.delivery_count += 1;
            let handle = uuid::Uuid::new_v4().to_string();

            let mut attributes = message.attributes.clone();
            attributes.insert(
                "ApproximateReceiveCount".to_string(),
                message.delivery_count.to_string(),
            );

            received.push(ReceivedMessage {
                message_id: message.message_id.clone(),
                body: message.body.clone(),
                receipt_handle: ReceiptHandle::new(handle.clone()),
                attributes,
                delivery_count: message.delivery_count,
                received_at: Timestamp::now(),
            });

            queue.in_flight.insert(
                handle,
                InFlightMessage {
                    message,
                    visible_at: now + visibility,
                },
            );
        }

        Ok(received)
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl QueueProvider for InMemoryProvider {
    async fn receive_messages(
        &self,
        request: &ReceiveRequest,
    ) -> Result<ReceivedBatch, QueueError> {
        let deadline = Instant::now() + request.wait_time;

        loop {
            // Register interest before checking so an enqueue in between is not missed.
            let notified = self.arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let received = self.take_visible(request)?;
            if !received.is_empty() || Instant::now() >= deadline {
                return Ok(ReceivedBatch::new(received));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(ReceivedBatch::new(self.take_visible(request)?));
            }
        }
    }

    async fn delete_message_batch(
        &self,
        queue: &QueueAddress,
        entries: &[DeleteEntry],
    ) -> Result<DeleteBatchResult, QueueError> {
        let mut storage = self.write_storage()?;
        let queue = storage.get_or_create_queue(queue);
        let mut result = DeleteBatchResult::default();

        for entry in entries {
            if queue
                .in_flight
                .remove(entry.receipt_handle.handle())
                .is_some()
            {
                result.successful.push(entry.id.clone());
            } else {
                result.failed.push(DeleteFailure {
                    id: entry.id.clone(),
                    code: "ReceiptHandleIsInvalid".to_string(),
                    message: "The receipt handle is not valid or has expired".to_string(),
                    sender_fault: true,
                });
            }
        }

        Ok(result)
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }

    fn max_batch_size(&self) -> u32 {
        ProviderType::InMemory.max_batch_size()
    }
}
