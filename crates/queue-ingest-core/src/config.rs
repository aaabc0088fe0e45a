//! Consumer configuration.
//!
//! Sources, applied in order with later sources overriding earlier ones:
//!  1. An optional YAML file
//!  2. Environment variables prefixed `QI__` with `__` between nested keys,
//!     e.g. `QI__RETRY_COUNT=3` or `QI__LOGGING__LEVEL=debug`
//!
//! Every field has a default except `queue_url`.

use crate::codec::CodecKind;
use crate::consumer::ConsumerSettings;
use crate::error::ConfigError;
use crate::event::Decorator;
use crate::poll_loop::AckMode;
use crate::retry::{RetryPolicy, RetryResetPolicy};
use queue_runtime::{
    AwsCredentials, AwsSqsConfig, BufferConfig, ProviderConfig, QueueAddress, QueueConfig,
    ReceiveRequest, MAX_MESSAGES_PER_BATCH,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "QI";

/// Separator between nested keys in environment variable names
pub const ENV_SEPARATOR: &str = "__";

const REDACTED: &str = "********";

/// Complete configuration for one ingest process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Queue URL or bare queue name
    pub queue_url: String,

    pub region: String,

    /// Endpoint for SQS-compatible services
    pub endpoint_url: Option<String>,

    /// HTTP connection pool size
    pub max_connections: usize,

    pub request_timeout_ms: u64,

    /// How long a receive waits for a fuller batch before returning
    pub max_batch_open_ms: u64,

    /// Concurrent receive requests kept outstanding by the buffer
    pub max_inflight_receive_batches: usize,

    /// Completed batches held before prefetching pauses
    pub max_done_receive_batches: usize,

    /// Messages handed to one poll cycle (1-10)
    pub max_number_of_messages: u32,

    /// Failed cycles tolerated before a consumer stops
    pub retry_count: u32,

    pub retry_delay_ms: u64,

    pub retry_reset: RetryResetPolicy,

    pub ack_mode: AckMode,

    pub credentials: AwsCredentials,

    pub codec: CodecKind,

    /// Value for the `type` field of events that lack one
    #[serde(rename = "type")]
    pub event_type: Option<String>,

    /// Tags appended to every event
    pub tags: Vec<String>,

    /// Fields set on events that lack them
    pub add_field: BTreeMap<String, String>,

    /// Number of independent consumers
    pub consumer_threads: usize,

    pub logging: LoggingConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_url: String::new(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            max_connections: 1000,
            request_timeout_ms: 30_000,
            max_batch_open_ms: 5_000,
            max_inflight_receive_batches: 50,
            max_done_receive_batches: 50,
            max_number_of_messages: MAX_MESSAGES_PER_BATCH,
            retry_count: 5,
            retry_delay_ms: 10_000,
            retry_reset: RetryResetPolicy::Never,
            ack_mode: AckMode::WholeBatch,
            credentials: AwsCredentials::DefaultChain,
            codec: CodecKind::Json,
            event_type: None,
            tags: Vec::new(),
            add_field: BTreeMap::new(),
            consumer_threads: 1,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl IngestConfig {
    /// Load from an optional YAML file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(
            path,
            config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR),
        )
    }

    fn load_from(path: Option<&Path>, environment: config::Environment) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }

        let config = builder.add_source(environment).build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_url.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "queue_url".to_string(),
            });
        }
        self.queue_address()?;

        if self.region.trim().is_empty() {
            return Err(invalid("region", "must not be empty"));
        }
        if self.max_connections == 0 {
            return Err(invalid("max_connections", "must be at least 1"));
        }
        if self.max_number_of_messages == 0 {
            return Err(invalid("max_number_of_messages", "must be at least 1"));
        }
        if self.max_batch_open_ms == 0 {
            return Err(invalid("max_batch_open_ms", "must be at least 1"));
        }
        if self.max_inflight_receive_batches == 0 {
            return Err(invalid("max_inflight_receive_batches", "must be at least 1"));
        }
        if self.max_done_receive_batches == 0 {
            return Err(invalid("max_done_receive_batches", "must be at least 1"));
        }
        if self.consumer_threads == 0 {
            return Err(invalid("consumer_threads", "must be at least 1"));
        }

        match &self.credentials {
            AwsCredentials::Static {
                access_key_id,
                secret_access_key,
                ..
            } if access_key_id.is_empty() || secret_access_key.is_empty() => {
                return Err(invalid(
                    "credentials",
                    "static credentials need both access_key_id and secret_access_key",
                ));
            }
            AwsCredentials::Profile { name } if name.trim().is_empty() => {
                return Err(invalid("credentials", "profile name must not be empty"));
            }
            _ => {}
        }

        Ok(())
    }

    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let AwsCredentials::Static {
            secret_access_key,
            session_token,
            ..
        } = &mut copy.credentials
        {
            *secret_access_key = REDACTED.to_string();
            if let Some(token) = session_token {
                *token = REDACTED.to_string();
            }
        }
        copy
    }

    pub fn queue_address(&self) -> Result<QueueAddress, ConfigError> {
        self.queue_url
            .parse()
            .map_err(|e: queue_runtime::ValidationError| invalid("queue_url", &e.to_string()))
    }

    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig {
            max_batch_open_ms: self.max_batch_open_ms,
            max_inflight_receive_batches: self.max_inflight_receive_batches,
            max_done_receive_batches: self.max_done_receive_batches,
        }
    }

    /// Client configuration: SQS behind a receive buffer
    pub fn queue_config(&self) -> QueueConfig {
        let aws = AwsSqsConfig {
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            credentials: self.credentials.clone(),
            max_connections: self.max_connections,
            request_timeout_ms: self.request_timeout_ms,
        };

        QueueConfig {
            provider: ProviderConfig::AwsSqs(aws),
            buffer: Some(self.buffer_config()),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_count, Duration::from_millis(self.retry_delay_ms))
            .with_reset(self.retry_reset)
    }

    pub fn receive_request(&self) -> Result<ReceiveRequest, ConfigError> {
        Ok(ReceiveRequest::new(self.queue_address()?).with_max_messages(self.max_number_of_messages))
    }

    pub fn decorator(&self) -> Decorator {
        let mut decorator = Decorator::new().with_tags(self.tags.iter().cloned());
        if let Some(event_type) = &self.event_type {
            decorator = decorator.with_type(event_type.clone());
        }
        for (field, value) in &self.add_field {
            decorator = decorator.with_field(field.clone(), value.clone());
        }
        decorator
    }

    pub fn settings(&self) -> Result<ConsumerSettings, ConfigError> {
        Ok(ConsumerSettings::new(self.receive_request()?)
            .with_retry(self.retry_policy())
            .with_ack_mode(self.ack_mode))
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}
