use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::connection::{
    ChannelTransport, Connection, ConnectionRegistry, StoreConnectionRegistry, Transport,
};
use crate::event::{EventDispatcher, OnError};
use crate::execution::{ExecutionEngine, ResolverEngine};
use crate::store::InMemoryStore;
use crate::subscription::{
    NameFunctions, StoreSubscriptionIndex, Subscriber, SubscriptionIndex,
};
use crate::websockets::SubscriptionServer;

/// Collaborators that dispatch and protocol handling run against
///
/// Passed explicitly into every call instead of living in module-level
/// singletons, so tests can wire any combination of implementations.
#[derive(Clone)]
pub struct ServerContext {
    pub registry: Arc<dyn ConnectionRegistry>,
    pub index: Arc<dyn SubscriptionIndex>,
    pub engine: Arc<dyn ExecutionEngine>,
}

/// Shared application state for the HTTP/WebSocket surface
#[derive(Clone)]
pub struct AppState {
    pub context: ServerContext,
    pub dispatcher: Arc<EventDispatcher>,
    pub server: Arc<SubscriptionServer>,
    pub transport: Arc<ChannelTransport>,
    pub config: ServerConfig,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FanoutError {
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Stale connection {connection_id} (status {status})")]
    StaleConnection { connection_id: String, status: u16 },

    #[error("Execution failed: {0}")]
    ExecutionFailure(String),

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl FanoutError {
    pub fn execution(msg: impl Into<String>) -> Self {
        FanoutError::ExecutionFailure(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        FanoutError::MalformedEvent(msg.into())
    }
}

impl From<serde_json::Error> for FanoutError {
    fn from(err: serde_json::Error) -> Self {
        FanoutError::Protocol(err.to_string())
    }
}

impl IntoResponse for FanoutError {
    fn into_response(self) -> Response {
        let status = match &self {
            FanoutError::MalformedEvent(_) | FanoutError::Protocol(_) => StatusCode::BAD_REQUEST,
            FanoutError::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
            FanoutError::StaleConnection { .. } => StatusCode::GONE,
            FanoutError::ExecutionFailure(_)
            | FanoutError::Transport(_)
            | FanoutError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

/// Builder wiring the in-memory reference stack, with overrides for tests
pub struct AppStateBuilder {
    config: ServerConfig,
    engine: Option<Arc<dyn ExecutionEngine>>,
    transport: Option<Arc<dyn Transport>>,
    on_error: Option<OnError>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            engine: None,
            transport: None,
            on_error: None,
        }
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn ExecutionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Route outbound posts through `transport` instead of the socket channels
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = Some(on_error);
        self
    }

    pub fn build(self) -> AppState {
        let channels = Arc::new(ChannelTransport::new());
        let transport = self
            .transport
            .unwrap_or_else(|| channels.clone() as Arc<dyn Transport>);

        let registry = Arc::new(StoreConnectionRegistry::new(
            Arc::new(InMemoryStore::<Connection>::new()),
            transport,
            self.config.close_grace,
        ));

        let names = match &self.config.tenant {
            Some(tenant) => NameFunctions::tenant_prefixed(tenant.clone()),
            None => NameFunctions::default(),
        };
        let index = Arc::new(StoreSubscriptionIndex::with_names(
            Arc::new(InMemoryStore::<Vec<Subscriber>>::new()),
            names,
        ));

        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(ResolverEngine::new()));

        let context = ServerContext {
            registry,
            index,
            engine,
        };

        let mut dispatcher = EventDispatcher::new();
        if let Some(on_error) = self.on_error {
            dispatcher = dispatcher.with_on_error(on_error);
        }
        if let Some(timeout) = self.config.branch_timeout {
            dispatcher = dispatcher.with_branch_timeout(timeout);
        }

        AppState {
            server: Arc::new(SubscriptionServer::new(context.clone())),
            context,
            dispatcher: Arc::new(dispatcher),
            transport: channels,
            config: self.config,
        }
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_status_codes() {
        let cases = vec![
            (FanoutError::malformed("bad"), StatusCode::BAD_REQUEST),
            (
                FanoutError::ConnectionNotFound("c1".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (FanoutError::execution("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_builder_wires_tenant_prefix() {
        let config = ServerConfig {
            tenant: Some("acme".to_string()),
            ..ServerConfig::default()
        };
        let state = AppStateBuilder::new().with_config(config).build();

        let connection = state
            .context
            .registry
            .hydrate_or_register("c1", "local")
            .await
            .unwrap();
        state
            .context
            .index
            .subscribe(
                &["chat".to_string()],
                &connection,
                crate::subscription::OperationRequest::new("subscription { chat }"),
                "op-1",
            )
            .await
            .unwrap();

        let subscribers = state
            .context
            .index
            .subscribers_by_event(&crate::event::Event::new("chat", json!({})))
            .collect_all()
            .await
            .unwrap();
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].event, "acme:chat");
    }
}
