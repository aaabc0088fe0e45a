//! Batch processing: decode, decorate, emit, then build delete entries.

use crate::codec::Codec;
use crate::error::IngestError;
use crate::event::Decorator;
use crate::sink::EventSink;
use queue_runtime::{DeleteEntry, ReceivedBatch, ReceivedMessage};
use std::sync::Arc;
use tracing::debug;

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;

/// Result of processing one batch
///
/// `entries` holds one delete entry for every message processed cleanly
/// before `failure`, in batch order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub entries: Vec<DeleteEntry>,
    pub events_emitted: u64,
    pub failure: Option<ProcessingFailure>,
}

/// The message that stopped a batch and why
#[derive(Debug)]
pub struct ProcessingFailure {
    pub index: usize,
    pub error: IngestError,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// All entries on success; the failure otherwise
    pub fn into_result(self) -> Result<Vec<DeleteEntry>, IngestError> {
        match self.failure {
            None => Ok(self.entries),
            Some(failure) => Err(failure.error),
        }
    }
}

/// Turns received batches into emitted events
#[derive(Clone)]
pub struct BatchProcessor {
    codec: Arc<dyn Codec>,
    decorator: Decorator,
    sink: Arc<dyn EventSink>,
}

impl BatchProcessor {
    pub fn new(codec: Arc<dyn Codec>, decorator: Decorator, sink: Arc<dyn EventSink>) -> Self {
        Self {
            codec,
            decorator,
            sink,
        }
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Process messages strictly in order, stopping at the first failure
    pub async fn process(&self, batch: &ReceivedBatch) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            entries: Vec::with_capacity(batch.len()),
            events_emitted: 0,
            failure: None,
        };

        for (index, message) in batch.iter().enumerate() {
            match self.process_message(index, message).await {
                Ok(emitted) => {
                    outcome.events_emitted += emitted;
                    outcome
                        .entries
                        .push(DeleteEntry::new(index, message.receipt_handle.clone()));
                }
                Err(error) => {
                    outcome.failure = Some(ProcessingFailure { index, error });
                    break;
                }
            }
        }

        // Flush what was emitted even when the batch failed part way. After a
        // flush failure no event of the batch is known to be written, so
        // nothing is acknowledged in any ack mode.
        if !batch.is_empty() {
            if let Err(source) = self.sink.flush().await {
                outcome.entries.clear();
                if outcome.failure.is_none() {
                    let index = batch.len() - 1;
                    outcome.failure = Some(ProcessingFailure {
                        index,
                        error: IngestError::Emit { index, source },
                    });
                }
            }
        }

        debug!(
            batch_size = batch.len(),
            events = outcome.events_emitted,
            acknowledged = outcome.entries.len(),
            failed = outcome.failure.is_some(),
            "Processed batch"
        );

        outcome
    }

    async fn process_message(
        &self,
        index: usize,
        message: &ReceivedMessage,
    ) -> Result<u64, IngestError> {
        let mut emitted = 0;

        for decoded in self.codec.decode(&message.body) {
            let mut event = decoded.map_err(|source| IngestError::Decode {
                index,
                message_id: message.message_id.to_string(),
                source,
            })?;

            self.decorator.decorate(&mut event);

            self.sink
                .emit(event)
                .await
                .map_err(|source| IngestError::Emit { index, source })?;
            emitted += 1;
        }

        Ok(emitted)
    }
}
