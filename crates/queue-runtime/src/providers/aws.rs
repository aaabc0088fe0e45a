//! AWS SQS provider implementation using the SQS Query API over HTTP.
//!
//! Requests are form-style query parameters signed with AWS Signature V4;
//! responses are XML. Direct HTTP keeps the provider testable against mocked
//! endpoints and SQS-compatible local services.
//!
//! ## Authentication
//!
//! Credentials come from an `aws-config` credentials provider:
//! - **Default chain**: environment, shared config files, web identity,
//!   container and instance metadata
//! - **Profile**: a named profile from the shared config files
//! - **Static**: explicit keys with an optional session token
//!
//! Credentials are resolved per request so temporary credentials refresh.
//!
//! ## Queue Addresses
//!
//! A full queue URL is used directly. A bare queue name is resolved once with
//! `GetQueueUrl` and cached for the life of the provider.
//!
//! ## Example
//!
//! ```no_run
//! use queue_runtime::{AwsCredentials, AwsSqsConfig, ProviderConfig, QueueClientFactory, QueueConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut aws = AwsSqsConfig::new("us-east-1");
//! aws.credentials = AwsCredentials::Profile { name: "ingest".to_string() };
//!
//! let config = QueueConfig {
//!     provider: ProviderConfig::AwsSqs(aws),
//!     buffer: None,
//! };
//!
//! let client = QueueClientFactory::create_client(config).await?;
//! # Ok(())
//! # }
//! ```

use crate::client::QueueProvider;
use crate::error::{ConfigurationError, QueueError, SerializationError};
use crate::message::{
    DeleteBatchResult, DeleteEntry, DeleteFailure, MessageId, QueueAddress, ReceiptHandle,
    ReceiveRequest, ReceivedBatch, ReceivedMessage, Timestamp,
};
use crate::provider::{AwsCredentials, AwsSqsConfig, ProviderType};
use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_credential_types::Credentials;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client as HttpClient;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;

const SQS_API_VERSION: &str = "2012-11-05";

// ============================================================================
// Error Types
// ============================================================================

/// AWS SQS specific errors
#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("SQS service error: {code}: {message}")]
    ServiceError { code: String, message: String },

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Invalid receipt handle: {0}")]
    InvalidReceipt(String),

    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Response is missing element '{0}'")]
    MissingElement(String),
}

impl AwsError {
    /// Map AWS error to QueueError
    pub fn to_queue_error(self) -> QueueError {
        match self {
            Self::Authentication(msg) => QueueError::AuthenticationFailed { message: msg },
            Self::AccessDenied(msg) => QueueError::PermissionDenied { operation: msg },
            Self::Throttled(msg) => QueueError::Throttled { message: msg },
            Self::NetworkError(msg) => QueueError::ConnectionFailed { message: msg },
            Self::Timeout(duration) => QueueError::Timeout { duration },
            Self::ServiceError { code, message } => QueueError::ProviderError {
                provider: ProviderType::AwsSqs.to_string(),
                code,
                message,
            },
            Self::QueueNotFound(queue) => QueueError::QueueNotFound { queue_name: queue },
            Self::InvalidReceipt(receipt) => QueueError::MessageNotFound { receipt },
            Self::ConfigurationError(msg) => {
                QueueError::ConfigurationError(ConfigurationError::Invalid { message: msg })
            }
            Self::SerializationError(msg) => {
                QueueError::SerializationError(SerializationError::MalformedResponse {
                    message: msg,
                })
            }
            Self::MissingElement(element) => {
                QueueError::SerializationError(SerializationError::MissingElement { element })
            }
        }
    }
}

// ============================================================================
// AWS Signature V4 Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// AWS Signature Version 4 signer for request authentication
///
/// Implements the AWS Signature V4 signing process:
/// 1. Create canonical request (method, URI, query, headers, payload)
/// 2. Create string to sign (algorithm, timestamp, scope, request hash)
/// 3. Derive signing key (4-level HMAC chain)
/// 4. Calculate signature and build Authorization header
///
/// A signer is built per request from freshly resolved credentials.
#[derive(Clone)]
struct AwsV4Signer {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
    region: String,
    service: String,
}

impl AwsV4Signer {
    fn new(credentials: &Credentials, region: &str) -> Self {
        Self {
            access_key: credentials.access_key_id().to_string(),
            secret_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().map(str::to_string),
            region: region.to_string(),
            service: "sqs".to_string(),
        }
    }

    /// Sign an HTTP request with AWS Signature V4
    ///
    /// Returns the headers to add to the request: `Authorization`,
    /// `x-amz-date`, `host` and, for temporary credentials,
    /// `x-amz-security-token`.
    fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        query_params: &HashMap<String, String>,
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> HashMap<String, String> {
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        // Task 1: Create canonical request
        let canonical_query_string = canonical_query(query_params);

        // Canonical headers (must be sorted)
        let mut canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let mut signed_headers = "host;x-amz-date".to_string();
        if let Some(token) = &self.session_token {
            canonical_headers.push_str(&format!("x-amz-security-token:{}\n", token));
            signed_headers.push_str(";x-amz-security-token");
        }

        let payload_hash = format!("{:x}", Sha256::digest(body.as_bytes()));

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, path, canonical_query_string, canonical_headers, signed_headers, payload_hash
        );

        // Task 2: Create string to sign
        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let canonical_request_hash = format!("{:x}", Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm, amz_date, credential_scope, canonical_request_hash
        );

        // Task 3: Calculate signature
        let signing_key = self.signing_key(&date_stamp);
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        // Task 4: Build authorization header
        let authorization_header = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm, self.access_key, credential_scope, signed_headers, signature
        );

        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), authorization_header);
        headers.insert("x-amz-date".to_string(), amz_date);
        headers.insert("host".to_string(), host.to_string());
        if let Some(token) = &self.session_token {
            headers.insert("x-amz-security-token".to_string(), token.clone());
        }

        headers
    }

    /// Derive the signing key with the HMAC-SHA256 chain
    /// `"AWS4" + secret -> date -> region -> service -> "aws4_request"`
    fn signing_key(&self, date_stamp: &str) -> Vec<u8> {
        let k_secret = format!("AWS4{}", self.secret_key);
        let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes());
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        hmac_sha256(&k_service, b"aws4_request")
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Sorted, RFC 3986 encoded query string shared by signing and the request URL
fn canonical_query(query_params: &HashMap<String, String>) -> String {
    let mut pairs = query_params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>();
    pairs.sort();
    pairs.join("&")
}

// ============================================================================
// XML Walking
// ============================================================================

/// Flattened view of a Query API response document
#[derive(Debug)]
enum XmlNode {
    /// Element that contains child elements
    Open(String),
    /// Element holding only text, with entities resolved
    Leaf { name: String, text: String },
    Close(String),
}

/// Visit every element of a response document in document order
///
/// Text is not trimmed, so message bodies keep their exact content.
fn walk_xml(
    xml: &str,
    mut visit: impl FnMut(XmlNode) -> Result<(), AwsError>,
) -> Result<(), AwsError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut text = String::new();
    // One entry per open element: whether it has child elements
    let mut has_children: Vec<bool> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                if let Some(parent) = has_children.last_mut() {
                    *parent = true;
                }
                has_children.push(false);
                text.clear();
                visit(XmlNode::Open(element_name(e.local_name().as_ref())))?;
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(parent) = has_children.last_mut() {
                    *parent = true;
                }
                visit(XmlNode::Leaf {
                    name: element_name(e.local_name().as_ref()),
                    text: String::new(),
                })?;
            }
            Ok(Event::Text(e)) => {
                let unescaped = e.unescape().map_err(|e| {
                    AwsError::SerializationError(format!("Failed to parse XML: {}", e))
                })?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) => {
                let raw = e.into_inner();
                let data = std::str::from_utf8(&raw).map_err(|e| {
                    AwsError::SerializationError(format!("Invalid UTF-8 in CDATA: {}", e))
                })?;
                text.push_str(data);
            }
            Ok(Event::End(ref e)) => {
                let name = element_name(e.local_name().as_ref());
                if has_children.pop().unwrap_or(true) {
                    visit(XmlNode::Close(name))?;
                } else {
                    visit(XmlNode::Leaf {
                        name,
                        text: std::mem::take(&mut text),
                    })?;
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AwsError::SerializationError(format!(
                    "XML parsing error: {}",
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn element_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Message fields collected while walking a `<Message>` element
#[derive(Default)]
struct PartialMessage {
    message_id: Option<String>,
    receipt_handle: Option<String>,
    body: Option<String>,
    attributes: HashMap<String, String>,
    attribute_name: Option<String>,
}

impl PartialMessage {
    fn finish(self) -> Result<ReceivedMessage, AwsError> {
        let receipt_handle = self
            .receipt_handle
            .ok_or_else(|| AwsError::MissingElement("ReceiptHandle".to_string()))?;
        let body = self
            .body
            .ok_or_else(|| AwsError::MissingElement("Body".to_string()))?;

        let message_id = self
            .message_id
            .as_deref()
            .and_then(|id| id.parse::<MessageId>().ok())
            .unwrap_or_else(MessageId::new);

        let delivery_count = self
            .attributes
            .get("ApproximateReceiveCount")
            .and_then(|count| count.parse().ok())
            .unwrap_or(1);

        Ok(ReceivedMessage {
            message_id,
            body: Bytes::from(body),
            receipt_handle: ReceiptHandle::new(receipt_handle),
            attributes: self.attributes,
            delivery_count,
            received_at: Timestamp::now(),
        })
    }
}

impl AwsSqsProvider {
    /// Parse GetQueueUrl XML response
    fn parse_queue_url_response(xml: &str) -> Result<String, AwsError> {
        let mut queue_url = None;
        walk_xml(xml, |node| {
            if let XmlNode::Leaf { name, text } = node {
                if name == "QueueUrl" {
                    queue_url = Some(text.trim().to_string());
                }
            }
            Ok(())
        })?;

        queue_url.ok_or_else(|| AwsError::MissingElement("QueueUrl".to_string()))
    }

    /// Parse error response from XML
    fn parse_error_response(xml: &str, status_code: u16) -> AwsError {
        let mut error_code = None;
        let mut error_message = None;

        // Unparseable error bodies fall through to the status code mapping
        let _ = walk_xml(xml, |node| {
            if let XmlNode::Leaf { name, text } = node {
                match name.as_str() {
                    "Code" => error_code = Some(text),
                    "Message" => error_message = Some(text),
                    _ => {}
                }
            }
            Ok(())
        });

        let code = error_code.unwrap_or_else(|| format!("HTTP{}", status_code));
        let message = error_message.unwrap_or_else(|| "Unknown error".to_string());

        // Map AWS error codes to our error types
        match code.as_str() {
            "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
                AwsError::QueueNotFound(message)
            }
            "InvalidClientTokenId"
            | "UnrecognizedClientException"
            | "SignatureDoesNotMatch"
            | "MissingAuthenticationToken"
            | "ExpiredToken"
            | "InvalidSecurity" => AwsError::Authentication(format!("{}: {}", code, message)),
            "AccessDenied" | "AccessDeniedException" => {
                AwsError::AccessDenied(format!("{}: {}", code, message))
            }
            "Throttling"
            | "ThrottlingException"
            | "RequestThrottled"
            | "OverLimit"
            | "AWS.SimpleQueueService.RequestThrottled" => {
                AwsError::Throttled(format!("{}: {}", code, message))
            }
            "InvalidReceiptHandle" | "ReceiptHandleIsInvalid" => AwsError::InvalidReceipt(message),
            _ if status_code == 401 => AwsError::Authentication(format!("{}: {}", code, message)),
            _ if status_code == 403 => AwsError::AccessDenied(format!("{}: {}", code, message)),
            _ => AwsError::ServiceError { code, message },
        }
    }

    /// Parse ReceiveMessage XML response
    ///
    /// Bodies are taken verbatim; no encoding is applied on the wire.
    fn parse_receive_message_response(xml: &str) -> Result<Vec<ReceivedMessage>, AwsError> {
        let mut messages = Vec::new();
        let mut current: Option<PartialMessage> = None;
        let mut in_attribute = false;

        walk_xml(xml, |node| {
            match node {
                XmlNode::Open(name) => match name.as_str() {
                    "Message" => current = Some(PartialMessage::default()),
                    "Attribute" => in_attribute = true,
                    _ => {}
                },
                XmlNode::Close(name) => match name.as_str() {
                    "Message" => {
                        if let Some(partial) = current.take() {
                            messages.push(partial.finish()?);
                        }
                    }
                    "Attribute" => in_attribute = false,
                    _ => {}
                },
                XmlNode::Leaf { name, text } => {
                    let Some(message) = current.as_mut() else {
                        return Ok(());
                    };
                    match name.as_str() {
                        "MessageId" => message.message_id = Some(text),
                        "ReceiptHandle" => message.receipt_handle = Some(text),
                        "Body" => message.body = Some(text),
                        "Name" if in_attribute => message.attribute_name = Some(text),
                        "Value" if in_attribute => {
                            if let Some(attribute) = message.attribute_name.take() {
                                message.attributes.insert(attribute, text);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(())
        })?;

        Ok(messages)
    }

    /// Parse DeleteMessageBatch XML response
    fn parse_delete_message_batch_response(xml: &str) -> Result<DeleteBatchResult, AwsError> {
        let mut result = DeleteBatchResult::default();
        let mut failure: Option<DeleteFailure> = None;
        let mut in_success = false;

        walk_xml(xml, |node| {
            match node {
                XmlNode::Open(name) => match name.as_str() {
                    "DeleteMessageBatchResultEntry" => in_success = true,
                    "BatchResultErrorEntry" => {
                        failure = Some(DeleteFailure {
                            id: String::new(),
                            code: String::new(),
                            message: String::new(),
                            sender_fault: false,
                        })
                    }
                    _ => {}
                },
                XmlNode::Close(name) => match name.as_str() {
                    "DeleteMessageBatchResultEntry" => in_success = false,
                    "BatchResultErrorEntry" => {
                        if let Some(failure) = failure.take() {
                            result.failed.push(failure);
                        }
                    }
                    _ => {}
                },
                XmlNode::Leaf { name, text } => match (name.as_str(), failure.as_mut()) {
                    ("Id", Some(f)) => f.id = text,
                    ("Code", Some(f)) => f.code = text,
                    ("Message", Some(f)) => f.message = text,
                    ("SenderFault", Some(f)) => {
                        f.sender_fault = text.trim().eq_ignore_ascii_case("true")
                    }
                    ("Id", None) if in_success => result.successful.push(text),
                    _ => {}
                },
            }
            Ok(())
        })?;

        Ok(result)
    }
}

// ============================================================================
// AWS SQS Provider
// ============================================================================

/// AWS SQS queue provider implementation
///
/// ## Thread Safety
///
/// The provider is thread-safe and can be shared across async tasks using `Arc`.
/// Internal state (queue URL cache) is protected by `RwLock`.
pub struct AwsSqsProvider {
    http_client: HttpClient,
    credentials: SharedCredentialsProvider,
    config: AwsSqsConfig,
    endpoint: url::Url,
    queue_url_cache: Arc<RwLock<HashMap<String, String>>>,
}

impl AwsSqsProvider {
    /// Create new AWS SQS provider
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The region is empty or the endpoint override is not a valid URL
    /// - Static credentials are incomplete
    /// - The HTTP client cannot be built
    pub async fn new(config: AwsSqsConfig) -> Result<Self, AwsError> {
        if config.region.trim().is_empty() {
            return Err(AwsError::ConfigurationError(
                "Region cannot be empty".to_string(),
            ));
        }

        let endpoint_str = config
            .endpoint_url
            .clone()
            .unwrap_or_else(|| format!("https://sqs.{}.amazonaws.com", config.region));
        let endpoint = url::Url::parse(&endpoint_str).map_err(|e| {
            AwsError::ConfigurationError(format!("Invalid endpoint '{}': {}", endpoint_str, e))
        })?;
        if endpoint.host_str().is_none() {
            return Err(AwsError::ConfigurationError(format!(
                "Endpoint '{}' has no host",
                endpoint_str
            )));
        }

        let credentials = Self::credentials_provider(&config).await?;

        let http_client = HttpClient::builder()
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(config.max_connections)
            .build()
            .map_err(|e| AwsError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            credentials,
            config,
            endpoint,
            queue_url_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Build the credentials provider for the configured source
    async fn credentials_provider(
        config: &AwsSqsConfig,
    ) -> Result<SharedCredentialsProvider, AwsError> {
        match &config.credentials {
            AwsCredentials::Static {
                access_key_id,
                secret_access_key,
                session_token,
            } => {
                if access_key_id.is_empty() || secret_access_key.is_empty() {
                    return Err(AwsError::ConfigurationError(
                        "Static credentials require access_key_id and secret_access_key"
                            .to_string(),
                    ));
                }

                Ok(SharedCredentialsProvider::new(Credentials::new(
                    access_key_id.clone(),
                    secret_access_key.clone(),
                    session_token.clone(),
                    None,
                    "queue-ingest-static",
                )))
            }
            AwsCredentials::DefaultChain | AwsCredentials::Profile { .. } => {
                let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(aws_config::Region::new(config.region.clone()));

                if let AwsCredentials::Profile { name } = &config.credentials {
                    loader = loader.profile_name(name);
                }

                let sdk_config = loader.load().await;
                sdk_config.credentials_provider().ok_or_else(|| {
                    AwsError::ConfigurationError("No AWS credentials provider available".to_string())
                })
            }
        }
    }

    /// Host header value for the endpoint, including a non-default port
    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Resolve a queue address to its URL, with caching for bare names
    async fn get_queue_url(&self, queue: &QueueAddress) -> Result<String, AwsError> {
        if queue.is_url() {
            return Ok(queue.as_str().to_string());
        }

        {
            let cache = self.queue_url_cache.read().await;
            if let Some(url) = cache.get(queue.as_str()) {
                return Ok(url.clone());
            }
        }

        let mut params = HashMap::new();
        params.insert("Action".to_string(), "GetQueueUrl".to_string());
        params.insert("QueueName".to_string(), queue.as_str().to_string());
        params.insert("Version".to_string(), SQS_API_VERSION.to_string());

        let response = self.make_request("POST", "/", &params, "").await?;
        let queue_url = Self::parse_queue_url_response(&response)?;

        debug!(queue = %queue, queue_url = %queue_url, "Resolved queue URL");

        let mut cache = self.queue_url_cache.write().await;
        cache.insert(queue.as_str().to_string(), queue_url.clone());

        Ok(queue_url)
    }

    /// Make an HTTP request to AWS SQS with signature
    async fn make_request(
        &self,
        method: &str,
        path: &str,
        query_params: &HashMap<String, String>,
        body: &str,
    ) -> Result<String, AwsError> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| AwsError::Authentication(format!("Credentials unavailable: {}", e)))?;
        let signer = AwsV4Signer::new(&credentials, &self.config.region);

        let host = self.host();
        let timestamp = Utc::now();
        let auth_headers = signer.sign_request(method, &host, path, query_params, body, &timestamp);

        let mut url = format!("{}{}", self.endpoint.as_str().trim_end_matches('/'), path);
        if !query_params.is_empty() {
            url = format!("{}?{}", url, canonical_query(query_params));
        }

        let mut request = self.http_client.request(
            method
                .parse()
                .map_err(|e| AwsError::ConfigurationError(format!("Invalid HTTP method: {}", e)))?,
            &url,
        );

        for (key, value) in auth_headers {
            request = request.header(&key, value);
        }

        if !body.is_empty() {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AwsError::Timeout(self.config.request_timeout())
            } else if e.is_connect() {
                AwsError::NetworkError(format!("Connection failed: {}", e))
            } else {
                AwsError::NetworkError(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| AwsError::NetworkError(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(Self::parse_error_response(&response_body, status.as_u16()));
        }

        Ok(response_body)
    }
}

impl fmt::Debug for AwsSqsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsSqsProvider")
            .field("config", &self.config)
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

#[async_trait]
impl QueueProvider for AwsSqsProvider {
    #[instrument(skip(self, request), fields(queue = %request.queue, max_messages = request.max_messages))]
    async fn receive_messages(
        &self,
        request: &ReceiveRequest,
    ) -> Result<ReceivedBatch, QueueError> {
        let queue_url = self
            .get_queue_url(&request.queue)
            .await
            .map_err(|e| e.to_queue_error())?;

        let wait_time_seconds = request.wait_time.as_secs().min(20);

        let mut params = HashMap::new();
        params.insert("Action".to_string(), "ReceiveMessage".to_string());
        params.insert("Version".to_string(), SQS_API_VERSION.to_string());
        params.insert("QueueUrl".to_string(), queue_url);
        params.insert(
            "MaxNumberOfMessages".to_string(),
            request.max_messages.clamp(1, 10).to_string(),
        );
        params.insert("WaitTimeSeconds".to_string(), wait_time_seconds.to_string());
        params.insert("AttributeName.1".to_string(), "All".to_string());
        if let Some(visibility) = request.visibility_timeout {
            params.insert(
                "VisibilityTimeout".to_string(),
                visibility.as_secs().to_string(),
            );
        }

        let response = self
            .make_request("POST", "/", &params, "")
            .await
            .map_err(|e| e.to_queue_error())?;

        let messages =
            Self::parse_receive_message_response(&response).map_err(|e| e.to_queue_error())?;

        debug!(received = messages.len(), "ReceiveMessage completed");
        Ok(ReceivedBatch::new(messages))
    }

    #[instrument(skip(self, entries), fields(queue = %queue, entries = entries.len()))]
    async fn delete_message_batch(
        &self,
        queue: &QueueAddress,
        entries: &[DeleteEntry],
    ) -> Result<DeleteBatchResult, QueueError> {
        let queue_url = self
            .get_queue_url(queue)
            .await
            .map_err(|e| e.to_queue_error())?;

        let mut params = HashMap::new();
        params.insert("Action".to_string(), "DeleteMessageBatch".to_string());
        params.insert("Version".to_string(), SQS_API_VERSION.to_string());
        params.insert("QueueUrl".to_string(), queue_url);

        // Entry numbering in the Query API is 1-based
        for (i, entry) in entries.iter().enumerate() {
            let n = i + 1;
            params.insert(
                format!("DeleteMessageBatchRequestEntry.{}.Id", n),
                entry.id.clone(),
            );
            params.insert(
                format!("DeleteMessageBatchRequestEntry.{}.ReceiptHandle", n),
                entry.receipt_handle.handle().to_string(),
            );
        }

        let response = self
            .make_request("POST", "/", &params, "")
            .await
            .map_err(|e| e.to_queue_error())?;

        Self::parse_delete_message_batch_response(&response).map_err(|e| e.to_queue_error())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::AwsSqs
    }

    fn max_batch_size(&self) -> u32 {
        ProviderType::AwsSqs.max_batch_size()
    }
}
