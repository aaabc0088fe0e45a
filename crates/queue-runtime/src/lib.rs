//! # Queue Runtime
//!
//! Queue client runtime for consumers that poll, process and acknowledge
//! message batches, with AWS SQS and in-memory providers.
//!
//! This library provides:
//! - Provider-agnostic receive and batch delete operations
//! - A buffered client that prefetches receive batches in the background
//! - SQS Query API access signed with AWS Signature V4
//! - An in-memory provider with visibility timeouts for tests and local runs
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all queue operations
//! - [`message`] - Queue addresses, received messages and delete entries
//! - [`provider`] - Provider types and configuration
//! - [`client`] - Client traits, the standard client and the factory
//! - [`buffered`] - Prefetching client wrapper
//! - [`providers`] - Provider implementations

pub mod buffered;
pub mod client;
pub mod error;
pub mod message;
pub mod provider;
pub mod providers;

// Re-export commonly used types at crate root for convenience
pub use buffered::BufferedQueueClient;
pub use client::{QueueClient, QueueClientFactory, QueueProvider, StandardQueueClient};
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use message::{
    DeleteBatchResult, DeleteEntry, DeleteFailure, MessageId, QueueAddress, ReceiptHandle,
    ReceiveRequest, ReceivedBatch, ReceivedMessage, Timestamp, MAX_MESSAGES_PER_BATCH,
    MAX_WAIT_TIME,
};
pub use provider::{
    AwsCredentials, AwsSqsConfig, BufferConfig, InMemoryConfig, ProviderConfig, ProviderType,
    QueueConfig,
};
pub use providers::{AwsSqsProvider, InMemoryProvider};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
