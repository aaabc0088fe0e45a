//! Provider types and configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Enumeration of supported queue providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    AwsSqs,
    InMemory,
}

impl ProviderType {
    /// Get maximum number of messages per receive or delete batch
    pub fn max_batch_size(&self) -> u32 {
        match self {
            Self::AwsSqs => 10,
            Self::InMemory => 10,
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwsSqs => write!(f, "aws-sqs"),
            Self::InMemory => write!(f, "in-memory"),
        }
    }
}

/// Configuration for queue client initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub provider: ProviderConfig,
    /// Receive buffering; `None` gives a direct, unbuffered client
    #[serde(default)]
    pub buffer: Option<BufferConfig>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::InMemory(InMemoryConfig::default()),
            buffer: None,
        }
    }
}

/// Provider-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    AwsSqs(AwsSqsConfig),
    InMemory(InMemoryConfig),
}

impl ProviderConfig {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::AwsSqs(_) => ProviderType::AwsSqs,
            Self::InMemory(_) => ProviderType::InMemory,
        }
    }
}

/// AWS SQS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsSqsConfig {
    pub region: String,
    /// Override for SQS-compatible local endpoints
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub credentials: AwsCredentials,
    /// Upper bound on pooled idle connections per host
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl AwsSqsConfig {
    /// Configuration for a region using the default credential chain
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint_url: None,
            credentials: AwsCredentials::default(),
            max_connections: default_max_connections(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_max_connections() -> usize {
    1000
}

// Long polls hold the request open for up to 20s.
fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Source of AWS credentials
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AwsCredentials {
    /// Environment, shared config files, web identity, container and instance metadata
    #[default]
    DefaultChain,
    /// Named profile from the shared config files
    Profile { name: String },
    /// Fixed keys, with an optional session token
    Static {
        access_key_id: String,
        secret_access_key: String,
        #[serde(default)]
        session_token: Option<String>,
    },
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DefaultChain => write!(f, "DefaultChain"),
            Self::Profile { name } => f.debug_struct("Profile").field("name", name).finish(),
            Self::Static { access_key_id, .. } => f
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"<REDACTED>")
                .finish(),
        }
    }
}

/// In-memory provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryConfig {
    pub max_queue_size: usize,
    /// How long a received message stays hidden before redelivery
    pub visibility_timeout_ms: u64,
}

impl InMemoryConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.visibility_timeout_ms)
    }
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10000,
            visibility_timeout_ms: 30_000,
        }
    }
}

/// Receive buffering for the buffered client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// How long a buffered receive may stay open to fill a batch
    pub max_batch_open_ms: u64,
    /// Concurrent outstanding receive calls
    pub max_inflight_receive_batches: usize,
    /// Completed batches held until the consumer takes them
    pub max_done_receive_batches: usize,
}

impl BufferConfig {
    pub fn max_batch_open(&self) -> Duration {
        Duration::from_millis(self.max_batch_open_ms)
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_batch_open_ms: 5000,
            max_inflight_receive_batches: 50,
            max_done_receive_batches: 50,
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
