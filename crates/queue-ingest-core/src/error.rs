//! Error types for the ingest pipeline.

use queue_runtime::QueueError;
use thiserror::Error;

/// Failure of a single poll cycle
///
/// Every variant aborts the cycle. Queue errors come from `receive` or
/// `delete_batch`; decode and emit errors carry the position of the message
/// in its batch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Queue operation failed: {0}")]
    Queue(#[from] QueueError),

    #[error("Failed to decode message {index} ({message_id}): {source}")]
    Decode {
        index: usize,
        message_id: String,
        #[source]
        source: CodecError,
    },

    #[error("Failed to emit event from message {index}: {source}")]
    Emit {
        index: usize,
        #[source]
        source: SinkError,
    },

    #[error("Consumer task failed: {message}")]
    Task { message: String },
}

impl IngestError {
    /// Index of the message that failed, when the failure is message-specific
    pub fn message_index(&self) -> Option<usize> {
        match self {
            Self::Decode { index, .. } | Self::Emit { index, .. } => Some(*index),
            Self::Queue(_) | Self::Task { .. } => None,
        }
    }

    /// Whether the queue service reported a condition expected to clear
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Queue(error) => error.is_transient(),
            Self::Decode { .. } | Self::Emit { .. } | Self::Task { .. } => false,
        }
    }
}

/// Errors produced while decoding a message body into events
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid JSON on line {line}: {source}")]
    InvalidJsonLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Expected a JSON object but found {found}")]
    NotAnObject { found: &'static str },
}

/// Errors produced by event sinks
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink is closed")]
    Closed,

    #[error("Failed to write event: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Required configuration missing: {key}")]
    Missing { key: String },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
