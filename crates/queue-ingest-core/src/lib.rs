//! # Queue Ingest Core
//!
//! Poll, decode, emit and acknowledge pipeline for queue consumers.
//!
//! Each consumer runs a sequential loop on its own task:
//! 1. Receive a batch through a [`queue_runtime::QueueClient`]
//! 2. Decode every message body into events and emit them to an [`EventSink`]
//! 3. Delete the processed messages with one batch request
//!
//! A failed cycle is retried after a fixed delay while the retry budget
//! lasts; the consumer stops once it runs out. Delivery is at-least-once.
//!
//! ## Module Organization
//!
//! - [`config`] - Configuration loading and validation
//! - [`event`] - Events and decoration
//! - [`codec`] - Message body decoding
//! - [`sink`] - Event destinations
//! - [`processor`] - Per-batch processing
//! - [`retry`] - Retry budget and reset policies
//! - [`poll_loop`] - The consumer state machine
//! - [`consumer`] - Consumer lifecycle and handles
//! - [`stats`] - Per-consumer counters
//! - [`error`] - Error types

pub mod codec;
pub mod config;
pub mod consumer;
pub mod error;
pub mod event;
pub mod poll_loop;
pub mod processor;
pub mod retry;
pub mod sink;
pub mod stats;

pub use codec::{Codec, CodecKind, JsonCodec, JsonLinesCodec, PlainCodec};
pub use config::{IngestConfig, LogFormat, LoggingConfig};
pub use consumer::{Consumer, ConsumerHandle, ConsumerSettings};
pub use error::{CodecError, ConfigError, IngestError, SinkError};
pub use event::{Decorator, Event};
pub use poll_loop::{AckMode, ConsumerState, CycleOutcome, LoopExit, PollLoop, StopSignal};
pub use processor::{BatchOutcome, BatchProcessor, ProcessingFailure};
pub use retry::{RetryBudget, RetryDecision, RetryPolicy, RetryResetPolicy};
pub use sink::{ChannelSink, EventSink, JsonLinesSink};
pub use stats::{ConsumerStats, StatsSnapshot};
