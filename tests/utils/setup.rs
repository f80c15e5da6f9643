#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fanout::{
    event::route_inbound, AppState, AppStateBuilder, DispatchFailure, DispatchReport, Event,
    FanoutError, ResolverEngine, ServerConfig, SubscriptionField,
};

use super::mocks::RecordingTransport;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub state: AppState,
    pub transport: Arc<RecordingTransport>,
    pub failures: Arc<Mutex<Vec<DispatchFailure>>>,
}

pub struct TestSetupBuilder {
    config: ServerConfig,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig {
                close_grace: Duration::from_millis(1),
                ..ServerConfig::default()
            },
        }
    }

    pub fn with_tenant(mut self, tenant: &str) -> Self {
        self.config.tenant = Some(tenant.to_string());
        self
    }

    pub fn with_branch_timeout(mut self, limit: Duration) -> Self {
        self.config.branch_timeout = Some(limit);
        self
    }

    pub fn build(self) -> TestSetup {
        let transport = Arc::new(RecordingTransport::new());
        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();

        let state = AppStateBuilder::new()
            .with_config(self.config)
            .with_engine(Arc::new(test_engine()))
            .with_transport(transport.clone())
            .with_on_error(Arc::new(move |failure: &DispatchFailure| {
                sink.lock().unwrap().push(failure.clone());
            }))
            .build();

        TestSetup {
            state,
            transport,
            failures,
        }
    }
}

/// Engine with the fields the workflow tests subscribe to
///
/// `chat` honors two variables: `fail` makes its filter error, `onlyType`
/// only lets payloads with that `type` through. `slow` never settles.
fn test_engine() -> ResolverEngine {
    ResolverEngine::new()
        .with_field(
            "chat",
            SubscriptionField::new(["chat"]).with_filter(
                |payload: Value, variables: Map<String, Value>, _context| async move {
                    if variables.get("fail") == Some(&Value::Bool(true)) {
                        return Err(FanoutError::execution("filter blew up"));
                    }
                    Ok(match variables.get("onlyType") {
                        Some(wanted) => payload.get("type") == Some(wanted),
                        None => true,
                    })
                },
            ),
        )
        .with_field(
            "slow",
            SubscriptionField::new(["chat"]).with_filter(|_payload, _variables, _context| async {
                futures::future::pending::<()>().await;
                Ok(true)
            }),
        )
        .with_field(
            "mine",
            SubscriptionField::new(["chat"]).with_filter(
                |payload: Value, _variables, context: Map<String, Value>| async move {
                    Ok(context.get("user").is_some() && payload.get("to") == context.get("user"))
                },
            ),
        )
}

impl TestSetup {
    /// CONNECT frame through the inbound boundary
    pub async fn connect(&self, connection_id: &str) {
        route_inbound(
            &self.state,
            json!({
                "connectionId": connection_id,
                "endpoint": "local",
                "eventType": "CONNECT"
            }),
        )
        .await
        .expect("connect frame should route");
    }

    pub async fn disconnect(&self, connection_id: &str) {
        route_inbound(
            &self.state,
            json!({
                "connectionId": connection_id,
                "endpoint": "local",
                "eventType": "DISCONNECT"
            }),
        )
        .await
        .expect("disconnect frame should route");
    }

    /// MESSAGE frame carrying one protocol message
    pub async fn client_message(&self, connection_id: &str, message: Value) {
        route_inbound(
            &self.state,
            json!({
                "connectionId": connection_id,
                "endpoint": "local",
                "eventType": "MESSAGE",
                "body": message.to_string()
            }),
        )
        .await
        .expect("message frame should route");
    }

    pub async fn init(&self, connection_id: &str, payload: Value) {
        self.client_message(
            connection_id,
            json!({"type": "connection_init", "payload": payload}),
        )
        .await;
    }

    pub async fn start(&self, connection_id: &str, operation_id: &str, query: &str, variables: Value) {
        self.client_message(
            connection_id,
            json!({
                "type": "start",
                "id": operation_id,
                "payload": {"query": query, "variables": variables}
            }),
        )
        .await;
    }

    /// Connect, initialize and start one operation
    pub async fn subscriber(&self, connection_id: &str, operation_id: &str, query: &str, variables: Value) {
        self.connect(connection_id).await;
        self.init(connection_id, json!({})).await;
        self.start(connection_id, operation_id, query, variables).await;
    }

    pub async fn publish(&self, name: &str, data: Value) -> DispatchReport {
        self.state
            .dispatcher
            .dispatch(&Event::new(name, data), &self.state.context)
            .await
    }

    pub fn failures(&self) -> Vec<DispatchFailure> {
        self.failures.lock().unwrap().clone()
    }

    pub async fn data_messages(&self, connection_id: &str) -> Vec<Value> {
        self.transport.messages_of_type(connection_id, "data").await
    }

    /// Connection ids the index currently holds for an event
    pub async fn subscriber_ids(&self, event: &str) -> Vec<String> {
        self.state
            .context
            .index
            .subscribers_by_event(&Event::new(event, json!({})))
            .collect_all()
            .await
            .expect("subscriber lookup should succeed")
            .into_iter()
            .map(|subscriber| subscriber.connection.id)
            .collect()
    }

    pub async fn is_registered(&self, connection_id: &str) -> bool {
        self.state.context.registry.hydrate(connection_id).await.is_ok()
    }
}
