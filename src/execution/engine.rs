use async_trait::async_trait;
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::Connection;
use crate::event::Event;
use crate::shared::FanoutError;
use crate::subscription::OperationRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionErrorEntry {
    pub message: String,
}

/// Result of executing an operation against one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ExecutionErrorEntry>,
}

impl ExecutionResult {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            errors: vec![ExecutionErrorEntry {
                message: message.into(),
            }],
        }
    }
}

/// Lazy, one-shot sequence of execution results
///
/// The dispatcher consumes at most one element.
pub type ExecutionStream = BoxStream<'static, Result<ExecutionResult, FanoutError>>;

/// Publish source holding exactly one event
///
/// A fresh source is built for every subscriber branch, so no branch can
/// observe another's consumption of the event.
#[derive(Debug, Clone)]
pub struct SingleEventSource {
    event: Event,
}

impl SingleEventSource {
    pub fn new(event: Event) -> Self {
        Self { event }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_stream(self) -> BoxStream<'static, Event> {
        stream::once(future::ready(self.event)).boxed()
    }
}

/// Contract of the query execution engine
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Event names an operation listens to, resolved when the client subscribes
    async fn topics(
        &self,
        operation: &OperationRequest,
        connection: &Connection,
    ) -> Result<Vec<String>, FanoutError>;

    /// Run `operation` for the single event in `source`
    ///
    /// `connection` carries the subscriber's context (auth, tenant) for the
    /// engine's own checks. An empty stream means the event was filtered out.
    async fn execute(
        &self,
        operation: &OperationRequest,
        connection: &Connection,
        source: SingleEventSource,
    ) -> Result<ExecutionStream, FanoutError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_single_event_source_yields_once() {
        let source = SingleEventSource::new(Event::new("chat", json!({"text": "hi"})));
        let events: Vec<Event> = source.into_stream().collect().await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, json!({"text": "hi"}));
    }

    #[test]
    fn test_result_serialization_omits_empty_parts() {
        let data = serde_json::to_value(ExecutionResult::data(json!({"chat": 1}))).unwrap();
        assert_eq!(data, json!({"data": {"chat": 1}}));

        let error = serde_json::to_value(ExecutionResult::error("nope")).unwrap();
        assert_eq!(error, json!({"errors": [{"message": "nope"}]}));
    }
}
