//! Tests for message types.

use super::*;

// ============================================================================
// QueueAddress Tests
// ============================================================================

#[test]
fn test_queue_address_accepts_full_url() {
    let address =
        QueueAddress::new("https://sqs.us-east-1.amazonaws.com/123456789012/events".to_string())
            .unwrap();

    assert!(address.is_url());
    assert_eq!(address.queue_name(), "events");
    assert_eq!(
        address.as_str(),
        "https://sqs.us-east-1.amazonaws.com/123456789012/events"
    );
}

#[test]
fn test_queue_address_accepts_bare_name() {
    let address: QueueAddress = "orders-high_priority".parse().unwrap();
    assert!(!address.is_url());
    assert_eq!(address.queue_name(), "orders-high_priority");

    let fifo: QueueAddress = "orders.fifo".parse().unwrap();
    assert_eq!(fifo.queue_name(), "orders.fifo");
}

#[test]
fn test_queue_address_trims_whitespace() {
    let address = QueueAddress::new("  events \n".to_string()).unwrap();
    assert_eq!(address.as_str(), "events");
}

#[test]
fn test_queue_address_rejects_invalid_values() {
    assert!(matches!(
        QueueAddress::new(String::new()),
        Err(ValidationError::Required { .. })
    ));
    assert!(matches!(
        QueueAddress::new("has spaces".to_string()),
        Err(ValidationError::InvalidFormat { .. })
    ));
    assert!(matches!(
        QueueAddress::new("a".repeat(81)),
        Err(ValidationError::OutOfRange { .. })
    ));
    assert!(matches!(
        QueueAddress::new(".fifo".to_string()),
        Err(ValidationError::OutOfRange { .. })
    ));
    assert!(QueueAddress::new("https://sqs.us-east-1.amazonaws.com/".to_string()).is_err());
    assert!(QueueAddress::new("http://".to_string()).is_err());
}

#[test]
fn test_queue_address_url_with_trailing_slash() {
    let address = QueueAddress::new("http://localhost:4566/000000000000/jobs/".to_string()).unwrap();
    assert_eq!(address.queue_name(), "jobs");
}

#[test]
fn test_queue_address_serde_validates() {
    let address: QueueAddress = serde_json::from_str("\"events\"").unwrap();
    assert_eq!(address.as_str(), "events");
    assert_eq!(serde_json::to_string(&address).unwrap(), "\"events\"");

    let invalid: Result<QueueAddress, _> = serde_json::from_str("\"bad name!\"");
    assert!(invalid.is_err());
}

// ============================================================================
// Identifier Tests
// ============================================================================

#[test]
fn test_message_id_generation_is_unique() {
    let a = MessageId::new();
    let b = MessageId::new();
    assert_ne!(a, b);
}

#[test]
fn test_message_id_from_str() {
    let id: MessageId = "5fea7756-0ea4-451a-a703-a558b933e274".parse().unwrap();
    assert_eq!(id.as_str(), "5fea7756-0ea4-451a-a703-a558b933e274");
    assert!("".parse::<MessageId>().is_err());
}

// ============================================================================
// Batch Tests
// ============================================================================

fn received(body: &str, handle: &str) -> ReceivedMessage {
    ReceivedMessage::new(
        MessageId::new(),
        Bytes::from(body.to_string()),
        ReceiptHandle::new(handle.to_string()),
    )
}

#[test]
fn test_received_batch_preserves_order() {
    let batch = ReceivedBatch::new(vec![
        received("first", "h0"),
        received("second", "h1"),
        received("third", "h2"),
    ]);

    assert_eq!(batch.len(), 3);
    assert!(!batch.is_empty());

    let handles: Vec<&str> = batch.iter().map(|m| m.receipt_handle.handle()).collect();
    assert_eq!(handles, vec!["h0", "h1", "h2"]);

    let bodies: Vec<Bytes> = batch.into_iter().map(|m| m.body).collect();
    assert_eq!(bodies[1], Bytes::from("second"));
}

#[test]
fn test_empty_batch() {
    let batch = ReceivedBatch::empty();
    assert!(batch.is_empty());
    assert_eq!(batch.len(), 0);
}

#[test]
fn test_redelivery_detection() {
    let mut message = received("body", "h");
    assert!(!message.is_redelivery());

    message.delivery_count = 3;
    assert!(message.is_redelivery());
}

// ============================================================================
// ReceiveRequest Tests
// ============================================================================

#[test]
fn test_receive_request_defaults() {
    let request = ReceiveRequest::new("events".parse().unwrap());
    assert_eq!(request.max_messages, MAX_MESSAGES_PER_BATCH);
    assert_eq!(request.wait_time, Duration::ZERO);
    assert_eq!(request.visibility_timeout, None);
}

#[test]
fn test_receive_request_clamps_limits() {
    let queue: QueueAddress = "events".parse().unwrap();

    assert_eq!(
        ReceiveRequest::new(queue.clone())
            .with_max_messages(0)
            .max_messages,
        1
    );
    assert_eq!(
        ReceiveRequest::new(queue.clone())
            .with_max_messages(25)
            .max_messages,
        10
    );
    assert_eq!(
        ReceiveRequest::new(queue)
            .with_wait_time(Duration::from_secs(60))
            .wait_time,
        MAX_WAIT_TIME
    );
}

// ============================================================================
// Delete Tests
// ============================================================================

#[test]
fn test_delete_entry_uses_batch_index_as_id() {
    let entry = DeleteEntry::new(4, ReceiptHandle::new("handle-4".to_string()));
    assert_eq!(entry.id, "4");
    assert_eq!(entry.receipt_handle.handle(), "handle-4");
}

#[test]
fn test_delete_batch_result_success() {
    let mut result = DeleteBatchResult {
        successful: vec!["0".to_string(), "1".to_string()],
        failed: Vec::new(),
    };
    assert!(result.is_complete_success());

    result.failed.push(DeleteFailure {
        id: "2".to_string(),
        code: "ReceiptHandleIsInvalid".to_string(),
        message: "expired".to_string(),
        sender_fault: true,
    });
    assert!(!result.is_complete_success());
}
