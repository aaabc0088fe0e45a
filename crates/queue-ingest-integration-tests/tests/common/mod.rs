//! Common test utilities for queue-ingest integration tests
//!
//! This module provides:
//! - A wiremock server speaking the SQS Query API
//! - XML response builders for ReceiveMessage, DeleteMessageBatch and errors
//! - Provider configuration pointing at the mock server

use queue_runtime::{AwsCredentials, AwsSqsConfig};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[allow(dead_code)]
pub const ACCOUNT_ID: &str = "123456789012";

// ============================================================================
// Provider Configuration
// ============================================================================

/// SQS configuration sending every request to the mock server
#[allow(dead_code)]
pub fn aws_config(server: &MockServer) -> AwsSqsConfig {
    let mut config = AwsSqsConfig::new("us-east-1");
    config.endpoint_url = Some(server.uri());
    config.credentials = AwsCredentials::Static {
        access_key_id: "AKIDEXAMPLE".to_string(),
        secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
        session_token: None,
    };
    config.request_timeout_ms = 5_000;
    config
}

/// Full queue URL hosted by the mock server
#[allow(dead_code)]
pub fn queue_url(server: &MockServer, name: &str) -> String {
    format!("{}/{}/{}", server.uri(), ACCOUNT_ID, name)
}

// ============================================================================
// Response Builders
// ============================================================================

#[allow(dead_code)]
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A message in a ReceiveMessage response
#[allow(dead_code)]
pub struct SqsMessage<'a> {
    pub message_id: &'a str,
    pub receipt_handle: &'a str,
    pub body: &'a str,
    pub receive_count: u32,
}

#[allow(dead_code)]
pub fn receive_response(messages: &[SqsMessage<'_>]) -> String {
    let mut xml = String::from(
        "<ReceiveMessageResponse xmlns=\"http://queue.amazonaws.com/doc/2012-11-05/\">\
         <ReceiveMessageResult>",
    );

    for message in messages {
        xml.push_str(&format!(
            "<Message>\
               <MessageId>{}</MessageId>\
               <ReceiptHandle>{}</ReceiptHandle>\
               <MD5OfBody>d41d8cd98f00b204e9800998ecf8427e</MD5OfBody>\
               <Body>{}</Body>\
               <Attribute><Name>ApproximateReceiveCount</Name><Value>{}</Value></Attribute>\
               <Attribute><Name>SentTimestamp</Name><Value>1700000000000</Value></Attribute>\
             </Message>",
            message.message_id,
            escape(message.receipt_handle),
            escape(message.body),
            message.receive_count,
        ));
    }

    xml.push_str(
        "</ReceiveMessageResult>\
         <ResponseMetadata><RequestId>b6633655-283d-45b4-aee4-4e84e0ae6afa</RequestId></ResponseMetadata>\
         </ReceiveMessageResponse>",
    );
    xml
}

#[allow(dead_code)]
pub fn delete_response(successful: &[&str], failed: &[(&str, &str)]) -> String {
    let mut xml = String::from(
        "<DeleteMessageBatchResponse xmlns=\"http://queue.amazonaws.com/doc/2012-11-05/\">\
         <DeleteMessageBatchResult>",
    );

    for id in successful {
        xml.push_str(&format!(
            "<DeleteMessageBatchResultEntry><Id>{}</Id></DeleteMessageBatchResultEntry>",
            id
        ));
    }
    for (id, code) in failed {
        xml.push_str(&format!(
            "<BatchResultErrorEntry>\
               <Id>{}</Id><Code>{}</Code><Message>The receipt handle has expired.</Message>\
               <SenderFault>true</SenderFault>\
             </BatchResultErrorEntry>",
            id, code
        ));
    }

    xml.push_str(
        "</DeleteMessageBatchResult>\
         <ResponseMetadata><RequestId>d6f86b7a-74d1-4439-b43f-196a1e29cd85</RequestId></ResponseMetadata>\
         </DeleteMessageBatchResponse>",
    );
    xml
}

#[allow(dead_code)]
pub fn queue_url_response(url: &str) -> String {
    format!(
        "<GetQueueUrlResponse xmlns=\"http://queue.amazonaws.com/doc/2012-11-05/\">\
         <GetQueueUrlResult><QueueUrl>{}</QueueUrl></GetQueueUrlResult>\
         <ResponseMetadata><RequestId>470a6f13-2ed9-4181-ad8a-2fdea142988e</RequestId></ResponseMetadata>\
         </GetQueueUrlResponse>",
        url
    )
}

#[allow(dead_code)]
pub fn error_response(code: &str, message: &str) -> String {
    format!(
        "<ErrorResponse xmlns=\"http://queue.amazonaws.com/doc/2012-11-05/\">\
         <Error><Type>Sender</Type><Code>{}</Code><Message>{}</Message><Detail/></Error>\
         <RequestId>42d59b56-7407-4c4a-be0f-4c88daeea257</RequestId>\
         </ErrorResponse>",
        code, message
    )
}

// ============================================================================
// Mock Mounting
// ============================================================================

/// Answer every request for `action` with `status` and `body`
#[allow(dead_code)]
pub async fn mount_action(server: &MockServer, action: &str, status: u16, body: String) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(query_param("Action", action))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}
