use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::StreamExt;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::engine::{ExecutionEngine, ExecutionResult, ExecutionStream, SingleEventSource};
use crate::connection::Connection;
use crate::shared::FanoutError;
use crate::subscription::OperationRequest;

/// Deliverability predicate: `(payload, variables, context) -> bool`
pub type FilterFn = Arc<
    dyn Fn(Value, Map<String, Value>, Map<String, Value>) -> BoxFuture<'static, Result<bool, FanoutError>>
        + Send
        + Sync,
>;

/// Maps an event payload to the value delivered under the field name
pub type ResolveFn = Arc<dyn Fn(Value) -> Result<Value, FanoutError> + Send + Sync>;

/// One subscribable root field
#[derive(Clone)]
pub struct SubscriptionField {
    topics: Vec<String>,
    filter: Option<FilterFn>,
    resolve: Option<ResolveFn>,
}

impl SubscriptionField {
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            filter: None,
            resolve: None,
        }
    }

    /// Only deliver events for which `filter` resolves to true
    pub fn with_filter<F, Fut>(mut self, filter: F) -> Self
    where
        F: Fn(Value, Map<String, Value>, Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, FanoutError>> + Send + 'static,
    {
        self.filter = Some(Arc::new(move |payload, variables, context| {
            filter(payload, variables, context).boxed()
        }));
        self
    }

    pub fn with_resolve<F>(mut self, resolve: F) -> Self
    where
        F: Fn(Value) -> Result<Value, FanoutError> + Send + Sync + 'static,
    {
        self.resolve = Some(Arc::new(resolve));
        self
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }
}

/// Reference execution engine resolving operations by their root field
///
/// `subscription OnChat { chat }` resolves to the field registered as `chat`;
/// a delivered result is `{"data": {"chat": <payload>}}`.
#[derive(Clone, Default)]
pub struct ResolverEngine {
    fields: HashMap<String, SubscriptionField>,
}

impl ResolverEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, field: SubscriptionField) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    fn field_for(&self, operation: &OperationRequest) -> Result<(String, SubscriptionField), FanoutError> {
        let name = root_field(&operation.query).ok_or_else(|| {
            FanoutError::execution(format!("Cannot find root field in '{}'", operation.query))
        })?;

        self.fields
            .get(name)
            .map(|field| (name.to_string(), field.clone()))
            .ok_or_else(|| FanoutError::execution(format!("Unknown subscription field '{}'", name)))
    }
}

#[async_trait]
impl ExecutionEngine for ResolverEngine {
    async fn topics(
        &self,
        operation: &OperationRequest,
        _connection: &Connection,
    ) -> Result<Vec<String>, FanoutError> {
        let (_, field) = self.field_for(operation)?;
        Ok(field.topics)
    }

    async fn execute(
        &self,
        operation: &OperationRequest,
        connection: &Connection,
        source: SingleEventSource,
    ) -> Result<ExecutionStream, FanoutError> {
        let (name, field) = self.field_for(operation)?;
        let variables = operation.variables.clone();
        let context = connection.context().clone();

        let results = source
            .into_stream()
            .then(move |event| {
                let field = field.clone();
                let name = name.clone();
                let variables = variables.clone();
                let context = context.clone();

                async move {
                    if let Some(filter) = &field.filter {
                        match filter(event.data.clone(), variables, context).await {
                            Ok(true) => {}
                            Ok(false) => {
                                debug!(event = %event.name, field = %name, "Filtered out");
                                return None;
                            }
                            Err(e) => return Some(Err(e)),
                        }
                    }

                    let value = match &field.resolve {
                        Some(resolve) => resolve(event.data),
                        None => Ok(event.data),
                    };
                    Some(value.map(|value| {
                        let mut data = Map::new();
                        data.insert(name, value);
                        ExecutionResult::data(Value::Object(data))
                    }))
                }
            })
            .filter_map(future::ready);

        Ok(results.boxed())
    }
}

/// Name of the first selection inside the operation's outer braces
pub fn root_field(query: &str) -> Option<&str> {
    let start = query.find('{')? + 1;
    let body = query[start..].trim_start();
    let end = body
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(body.len());

    (end > 0).then(|| &body[..end])
}
