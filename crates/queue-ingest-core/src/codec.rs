//! Codecs turning message bodies into events.
//!
//! Decoding is lazy: a body yields an iterator of results, and the batch
//! processor stops pulling from it at the first error. Events produced before
//! the error have already been emitted by then.

use crate::error::CodecError;
use crate::event::Event;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Field that carries the raw body for the plain codec
pub const MESSAGE_FIELD: &str = "message";

/// Lazy sequence of decoded events
pub type EventIter<'a> = Box<dyn Iterator<Item = Result<Event, CodecError>> + Send + 'a>;

/// Decodes one message body into zero or more events
pub trait Codec: Send + Sync {
    fn decode<'a>(&'a self, body: &'a [u8]) -> EventIter<'a>;

    /// Name used in configuration and logs
    fn name(&self) -> &'static str;
}

/// Codec selection as written in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecKind {
    #[default]
    Json,
    JsonLines,
    Plain,
}

impl CodecKind {
    pub fn build(self) -> Arc<dyn Codec> {
        match self {
            Self::Json => Arc::new(JsonCodec),
            Self::JsonLines => Arc::new(JsonLinesCodec),
            Self::Plain => Arc::new(PlainCodec),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn into_event(value: Value) -> Result<Event, CodecError> {
    match value {
        Value::Object(map) => Ok(Event::from(map)),
        other => Err(CodecError::NotAnObject {
            found: json_type_name(&other),
        }),
    }
}

/// One JSON document per body
///
/// An object becomes one event and an array becomes one event per element.
/// A body that is empty or only whitespace yields no events.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode<'a>(&'a self, body: &'a [u8]) -> EventIter<'a> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Box::new(std::iter::empty());
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Array(items)) => Box::new(items.into_iter().map(into_event)),
            Ok(value) => Box::new(std::iter::once(into_event(value))),
            Err(e) => Box::new(std::iter::once(Err(CodecError::InvalidJson(e)))),
        }
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// One JSON object per line; blank lines are skipped
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesCodec;

impl Codec for JsonLinesCodec {
    fn decode<'a>(&'a self, body: &'a [u8]) -> EventIter<'a> {
        let lines = body
            .split(|b| *b == b'\n')
            .enumerate()
            .filter(|(_, line)| !line.iter().all(u8::is_ascii_whitespace))
            .map(|(i, line)| {
                let value: Value =
                    serde_json::from_slice(line).map_err(|source| CodecError::InvalidJsonLine {
                        line: i + 1,
                        source,
                    })?;
                into_event(value)
            });

        Box::new(lines)
    }

    fn name(&self) -> &'static str {
        "json_lines"
    }
}

/// The whole body as the `message` field of a single event
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodec;

impl Codec for PlainCodec {
    fn decode<'a>(&'a self, body: &'a [u8]) -> EventIter<'a> {
        let mut event = Event::new();
        event.insert(MESSAGE_FIELD, String::from_utf8_lossy(body).into_owned());
        Box::new(std::iter::once(Ok(event)))
    }

    fn name(&self) -> &'static str {
        "plain"
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
