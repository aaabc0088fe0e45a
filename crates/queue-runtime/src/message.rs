//! Message types for queue operations including core domain identifiers.

use crate::error::ValidationError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Hard service-side cap on messages per receive and entries per delete batch
pub const MAX_MESSAGES_PER_BATCH: u32 = 10;

/// Longest long-poll wait the queue service accepts
pub const MAX_WAIT_TIME: Duration = Duration::from_secs(20);

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue address: either a full queue URL or a bare queue name
///
/// Queue URLs are used as-is for every request. Bare names are resolved to a
/// URL by the provider on first use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueAddress(String);

impl QueueAddress {
    /// Create new queue address with validation
    pub fn new(address: String) -> Result<Self, ValidationError> {
        let address = address.trim();

        if address.is_empty() {
            return Err(ValidationError::Required {
                field: "queue_url".to_string(),
            });
        }

        if address.starts_with("http://") || address.starts_with("https://") {
            let url = url::Url::parse(address).map_err(|e| ValidationError::InvalidFormat {
                field: "queue_url".to_string(),
                message: e.to_string(),
            })?;

            let has_queue_segment = url
                .path_segments()
                .map(|mut segments| segments.any(|s| !s.is_empty()))
                .unwrap_or(false);

            if url.host_str().is_none() || !has_queue_segment {
                return Err(ValidationError::InvalidFormat {
                    field: "queue_url".to_string(),
                    message: "queue URL must include a host and end with the queue name"
                        .to_string(),
                });
            }

            return Ok(Self(address.to_string()));
        }

        Self::validate_name(address)?;
        Ok(Self(address.to_string()))
    }

    fn validate_name(name: &str) -> Result<(), ValidationError> {
        let base = name.strip_suffix(".fifo").unwrap_or(name);

        if base.is_empty() || name.len() > 80 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: "must be 1-80 characters".to_string(),
            });
        }

        if !base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only ASCII alphanumeric, hyphens, and underscores allowed".to_string(),
            });
        }

        Ok(())
    }

    /// Get the address exactly as configured
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the address is a full queue URL
    pub fn is_url(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }

    /// Get the queue name (last path segment for URLs)
    pub fn queue_name(&self) -> &str {
        if !self.is_url() {
            return &self.0;
        }

        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.0)
    }
}

impl std::fmt::Display for QueueAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for QueueAddress {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueAddress> for String {
    fn from(address: QueueAddress) -> Self {
        address.0
    }
}

/// Unique identifier for messages within the queue system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

// ============================================================================
// Received Messages
// ============================================================================

/// Opaque token required to delete a received message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    /// Create new receipt handle
    pub fn new(handle: String) -> Self {
        Self(handle)
    }

    /// Get handle string
    pub fn handle(&self) -> &str {
        &self.0
    }
}

/// A message received from the queue with processing metadata
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub body: Bytes,
    pub receipt_handle: ReceiptHandle,
    pub attributes: HashMap<String, String>,
    pub delivery_count: u32,
    pub received_at: Timestamp,
}

impl ReceivedMessage {
    /// Create a received message with default metadata
    pub fn new(message_id: MessageId, body: Bytes, receipt_handle: ReceiptHandle) -> Self {
        Self {
            message_id,
            body,
            receipt_handle,
            attributes: HashMap::new(),
            delivery_count: 1,
            received_at: Timestamp::now(),
        }
    }

    /// Check if the service has delivered this message more than once
    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}

/// Ordered set of messages returned by a single receive call
#[derive(Debug, Clone, Default)]
pub struct ReceivedBatch {
    messages: Vec<ReceivedMessage>,
}

impl ReceivedBatch {
    /// Wrap received messages, preserving their order
    pub fn new(messages: Vec<ReceivedMessage>) -> Self {
        Self { messages }
    }

    /// Batch with no messages
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[ReceivedMessage] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReceivedMessage> {
        self.messages.iter()
    }
}

impl IntoIterator for ReceivedBatch {
    type Item = ReceivedMessage;
    type IntoIter = std::vec::IntoIter<ReceivedMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

impl<'a> IntoIterator for &'a ReceivedBatch {
    type Item = &'a ReceivedMessage;
    type IntoIter = std::slice::Iter<'a, ReceivedMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

// ============================================================================
// Receive Requests
// ============================================================================

/// Immutable description of a receive call, built once per consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    /// Queue to receive from
    pub queue: QueueAddress,
    /// Upper bound on messages returned by one call (1-10)
    pub max_messages: u32,
    /// Long-poll wait used when the queue is empty
    pub wait_time: Duration,
    /// Visibility timeout override for received messages
    pub visibility_timeout: Option<Duration>,
}

impl ReceiveRequest {
    /// Create a request for up to the service maximum with no long polling
    pub fn new(queue: QueueAddress) -> Self {
        Self {
            queue,
            max_messages: MAX_MESSAGES_PER_BATCH,
            wait_time: Duration::ZERO,
            visibility_timeout: None,
        }
    }

    /// Set maximum number of messages, clamped to the service limits
    pub fn with_max_messages(mut self, max: u32) -> Self {
        self.max_messages = max.clamp(1, MAX_MESSAGES_PER_BATCH);
        self
    }

    /// Set long-poll wait, capped at the service maximum
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time.min(MAX_WAIT_TIME);
        self
    }

    /// Set visibility timeout for received messages
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = Some(timeout);
        self
    }
}

// ============================================================================
// Batch Deletion
// ============================================================================

/// One message to acknowledge within a delete batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteEntry {
    /// Correlation id, unique within one delete batch
    pub id: String,
    pub receipt_handle: ReceiptHandle,
}

impl DeleteEntry {
    /// Build an entry correlated by the message's position in its batch
    pub fn new(index: usize, receipt_handle: ReceiptHandle) -> Self {
        Self {
            id: index.to_string(),
            receipt_handle,
        }
    }
}

/// Per-entry failure reported by a delete batch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    pub id: String,
    pub code: String,
    pub message: String,
    pub sender_fault: bool,
}

/// Result of a delete batch call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteBatchResult {
    /// Ids of entries that were deleted
    pub successful: Vec<String>,
    /// Entries the service refused to delete
    pub failed: Vec<DeleteFailure>,
}

impl DeleteBatchResult {
    /// Check if every entry was deleted
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
