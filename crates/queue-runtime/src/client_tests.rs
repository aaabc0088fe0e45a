//! Tests for queue client traits and implementations.

use super::*;
use crate::message::ReceiptHandle;
use crate::provider::AwsSqsConfig;
use std::time::Duration;

fn queue() -> QueueAddress {
    "client-test".parse().unwrap()
}

fn memory_client() -> (Arc<InMemoryProvider>, StandardQueueClient) {
    let provider = Arc::new(InMemoryProvider::default());
    let client = StandardQueueClient::new(provider.clone());
    (provider, client)
}

// ============================================================================
// StandardQueueClient Tests
// ============================================================================

#[tokio::test]
async fn test_receive_then_delete_acknowledges_messages() {
    let (provider, client) = memory_client();
    provider.enqueue(&queue(), "one").unwrap();
    provider.enqueue(&queue(), "two").unwrap();

    let batch = client.receive(&ReceiveRequest::new(queue())).await.unwrap();
    assert_eq!(batch.len(), 2);

    let entries: Vec<DeleteEntry> = batch
        .iter()
        .enumerate()
        .map(|(i, m)| DeleteEntry::new(i, m.receipt_handle.clone()))
        .collect();

    let result = client.delete_batch(&queue(), entries).await.unwrap();
    assert!(result.is_complete_success());
    assert_eq!(provider.in_flight_count(&queue()), 0);
    assert_eq!(provider.visible_count(&queue()), 0);
}

#[tokio::test]
async fn test_delete_empty_batch_is_a_no_op() {
    let (_provider, client) = memory_client();
    let result = client.delete_batch(&queue(), Vec::new()).await.unwrap();
    assert!(result.successful.is_empty());
    assert!(result.failed.is_empty());
}

#[tokio::test]
async fn test_delete_rejects_oversized_batch() {
    let (_provider, client) = memory_client();
    let entries: Vec<DeleteEntry> = (0..11)
        .map(|i| DeleteEntry::new(i, ReceiptHandle::new(format!("h{}", i))))
        .collect();

    let result = client.delete_batch(&queue(), entries).await;
    assert!(matches!(
        result,
        Err(QueueError::BatchTooLarge {
            size: 11,
            max_size: 10
        })
    ));
}

#[tokio::test]
async fn test_receive_from_empty_queue() {
    let (_provider, client) = memory_client();
    let batch = client.receive(&ReceiveRequest::new(queue())).await.unwrap();
    assert!(batch.is_empty());
    assert_eq!(client.max_batch_size(), 10);
}

// ============================================================================
// Factory Tests
// ============================================================================

#[tokio::test]
async fn test_factory_creates_in_memory_client() {
    let client = QueueClientFactory::create_client(QueueConfig::default())
        .await
        .unwrap();
    assert_eq!(client.provider_type(), ProviderType::InMemory);
}

#[tokio::test(start_paused = true)]
async fn test_factory_wraps_buffered_client() {
    let provider = Arc::new(InMemoryProvider::default());
    provider.enqueue(&queue(), "buffered").unwrap();

    let client = QueueClientFactory::from_provider(
        provider.clone(),
        Some(BufferConfig {
            max_batch_open_ms: 200,
            max_inflight_receive_batches: 1,
            max_done_receive_batches: 1,
        }),
    );

    let batch = client.receive(&ReceiveRequest::new(queue())).await.unwrap();
    assert_eq!(batch.len(), 1);

    // A second receive on the drained queue comes back empty after the open delay
    let started = tokio::time::Instant::now();
    let batch = client.receive(&ReceiveRequest::new(queue())).await.unwrap();
    assert!(batch.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(200));

    client.shutdown().await;
    assert!(matches!(
        client.receive(&ReceiveRequest::new(queue())).await,
        Err(QueueError::ClientClosed)
    ));
}

#[tokio::test]
async fn test_factory_creates_aws_client_with_static_credentials() {
    let mut aws = AwsSqsConfig::new("us-east-1");
    aws.endpoint_url = Some("http://localhost:4566".to_string());
    aws.credentials = crate::provider::AwsCredentials::Static {
        access_key_id: "AKIDEXAMPLE".to_string(),
        secret_access_key: "secret".to_string(),
        session_token: None,
    };

    let client = QueueClientFactory::create_client(QueueConfig {
        provider: ProviderConfig::AwsSqs(aws),
        buffer: None,
    })
    .await
    .unwrap();

    assert_eq!(client.provider_type(), ProviderType::AwsSqs);
}

#[tokio::test]
async fn test_factory_reports_invalid_aws_configuration() {
    let mut aws = AwsSqsConfig::new("");
    aws.credentials = crate::provider::AwsCredentials::Static {
        access_key_id: "AKIDEXAMPLE".to_string(),
        secret_access_key: "secret".to_string(),
        session_token: None,
    };

    let result = QueueClientFactory::create_client(QueueConfig {
        provider: ProviderConfig::AwsSqs(aws),
        buffer: None,
    })
    .await;

    assert!(matches!(result, Err(QueueError::ConfigurationError(_))));
}
