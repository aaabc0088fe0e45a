//! Client traits and implementations for queue operations.

use crate::buffered::BufferedQueueClient;
use crate::error::QueueError;
use crate::message::{DeleteBatchResult, DeleteEntry, QueueAddress, ReceiveRequest, ReceivedBatch};
use crate::provider::{BufferConfig, ProviderConfig, ProviderType, QueueConfig};
use crate::providers::{AwsSqsProvider, InMemoryProvider};
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Main interface for queue operations used by consumers
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receive a batch of messages, which may be empty
    ///
    /// Errors are returned to the caller unchanged; the client does not retry.
    async fn receive(&self, request: &ReceiveRequest) -> Result<ReceivedBatch, QueueError>;

    /// Delete received messages in a single batched request
    ///
    /// Per-entry failures are reported in the result rather than as an error.
    async fn delete_batch(
        &self,
        queue: &QueueAddress,
        entries: Vec<DeleteEntry>,
    ) -> Result<DeleteBatchResult, QueueError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;

    /// Release background resources held by the client
    async fn shutdown(&self);
}

/// Interface implemented by specific queue providers (AWS, in-memory)
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Issue a single receive call
    async fn receive_messages(&self, request: &ReceiveRequest)
        -> Result<ReceivedBatch, QueueError>;

    /// Issue a single delete batch call
    async fn delete_message_batch(
        &self,
        queue: &QueueAddress,
        entries: &[DeleteEntry],
    ) -> Result<DeleteBatchResult, QueueError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;

    /// Get maximum batch size
    fn max_batch_size(&self) -> u32;
}

/// Factory for creating queue clients with appropriate providers
pub struct QueueClientFactory;

impl QueueClientFactory {
    /// Create queue client from configuration
    ///
    /// The client is wrapped in a [`BufferedQueueClient`] when the configuration
    /// carries buffer settings.
    pub async fn create_client(config: QueueConfig) -> Result<Arc<dyn QueueClient>, QueueError> {
        let provider: Arc<dyn QueueProvider> = match config.provider {
            ProviderConfig::InMemory(in_memory_config) => {
                Arc::new(InMemoryProvider::new(in_memory_config))
            }
            ProviderConfig::AwsSqs(aws_config) => Arc::new(
                AwsSqsProvider::new(aws_config)
                    .await
                    .map_err(|e| e.to_queue_error())?,
            ),
        };

        Ok(Self::from_provider(provider, config.buffer))
    }

    /// Create a client over an existing provider
    pub fn from_provider(
        provider: Arc<dyn QueueProvider>,
        buffer: Option<BufferConfig>,
    ) -> Arc<dyn QueueClient> {
        let client = StandardQueueClient::new(provider);
        match buffer {
            Some(buffer) => Arc::new(BufferedQueueClient::new(Arc::new(client), buffer)),
            None => Arc::new(client),
        }
    }
}

/// Standard queue client implementation
pub struct StandardQueueClient {
    provider: Arc<dyn QueueProvider>,
}

impl StandardQueueClient {
    /// Create new standard queue client with provider
    pub fn new(provider: Arc<dyn QueueProvider>) -> Self {
        Self { provider }
    }

    /// Largest request the underlying provider accepts
    pub fn max_batch_size(&self) -> u32 {
        self.provider.max_batch_size()
    }
}

#[async_trait]
impl QueueClient for StandardQueueClient {
    async fn receive(&self, request: &ReceiveRequest) -> Result<ReceivedBatch, QueueError> {
        self.provider.receive_messages(request).await
    }

    async fn delete_batch(
        &self,
        queue: &QueueAddress,
        entries: Vec<DeleteEntry>,
    ) -> Result<DeleteBatchResult, QueueError> {
        if entries.is_empty() {
            return Ok(DeleteBatchResult::default());
        }

        let max_size = self.provider.max_batch_size() as usize;
        if entries.len() > max_size {
            return Err(QueueError::BatchTooLarge {
                size: entries.len(),
                max_size,
            });
        }

        self.provider.delete_message_batch(queue, &entries).await
    }

    fn provider_type(&self) -> ProviderType {
        self.provider.provider_type()
    }

    async fn shutdown(&self) {}
}
