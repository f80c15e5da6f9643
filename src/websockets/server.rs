use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::messages::{ClientMessage, ServerMessage};
use super::socket::MessageHandler;
use crate::connection::{Connection, ConnectionData, SendOutcome};
use crate::event::{TransportEventType, TransportFrame};
use crate::shared::{FanoutError, ServerContext};
use crate::subscription::OperationRequest;

/// Connection-side protocol handling
///
/// Turns connect/disconnect/message frames into registry and index calls:
/// - CONNECT registers a connection pending its handshake
/// - `connection_init` stores the client context and acknowledges
/// - `start` subscribes the operation to the event names it listens to
/// - `stop` removes that one operation
/// - DISCONNECT removes every subscription and the connection record
pub struct SubscriptionServer {
    context: ServerContext,
}

impl SubscriptionServer {
    pub fn new(context: ServerContext) -> Self {
        Self { context }
    }

    pub async fn handle_frame(&self, frame: TransportFrame) -> Result<(), FanoutError> {
        match frame.event_type {
            TransportEventType::Connect => {
                self.on_connect(&frame.connection_id, &frame.endpoint)
                    .await?;
                Ok(())
            }
            TransportEventType::Disconnect => self.on_disconnect(&frame.connection_id).await,
            TransportEventType::Message => {
                let body = frame
                    .body
                    .ok_or_else(|| FanoutError::malformed("MESSAGE frame without body"))?;
                self.on_message(&frame.connection_id, &body).await
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn on_connect(
        &self,
        connection_id: &str,
        endpoint: &str,
    ) -> Result<Connection, FanoutError> {
        self.context.registry.register(connection_id, endpoint).await
    }

    /// Handle one client frame
    ///
    /// Fails with `ConnectionNotFound` for an unknown connection, which the
    /// caller should treat as a reason to terminate the session.
    #[instrument(skip(self, text))]
    pub async fn on_message(&self, connection_id: &str, text: &str) -> Result<(), FanoutError> {
        let connection = self.context.registry.hydrate(connection_id).await?;

        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(connection_id = %connection_id, error = %e, "Invalid client frame");
                return self
                    .reply(&connection, ServerMessage::connection_error(format!("Invalid message: {}", e)))
                    .await;
            }
        };

        match message {
            ClientMessage::ConnectionInit { payload } => {
                let connection = self
                    .context
                    .registry
                    .set_data(
                        connection_id,
                        ConnectionData::initialized(payload.unwrap_or_default()),
                    )
                    .await?;
                info!(connection_id = %connection_id, "Connection initialized");
                self.reply(&connection, ServerMessage::ConnectionAck).await
            }
            ClientMessage::Start { id, payload } => self.start(&connection, id, payload).await,
            ClientMessage::Stop { id } => {
                self.context
                    .index
                    .unsubscribe_operation(connection_id, &id)
                    .await?;
                debug!(connection_id = %connection_id, operation_id = %id, "Operation stopped");
                self.reply(&connection, ServerMessage::Complete { id }).await
            }
            ClientMessage::ConnectionTerminate => {
                info!(connection_id = %connection_id, "Client requested termination");
                self.context.registry.close(&connection);
                Ok(())
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn on_disconnect(&self, connection_id: &str) -> Result<(), FanoutError> {
        self.context
            .index
            .unsubscribe_all_by_connection_id(connection_id)
            .await?;

        match self.context.registry.hydrate(connection_id).await {
            Ok(connection) => self.context.registry.unregister(&connection).await?,
            Err(FanoutError::ConnectionNotFound(_)) => {
                debug!(connection_id = %connection_id, "Disconnect for unknown connection");
            }
            Err(e) => return Err(e),
        }

        info!(connection_id = %connection_id, "Connection disconnected");
        Ok(())
    }

    async fn start(
        &self,
        connection: &Connection,
        operation_id: String,
        operation: OperationRequest,
    ) -> Result<(), FanoutError> {
        if !connection.is_initialized() {
            warn!(connection_id = %connection.id, "Start before connection_init");
            self.reply(
                connection,
                ServerMessage::connection_error("Prior to start, client must send connection_init"),
            )
            .await?;
            self.context.registry.close(connection);
            return Ok(());
        }

        let topics = match self.context.engine.topics(&operation, connection).await {
            Ok(topics) => topics,
            Err(e) => {
                warn!(
                    connection_id = %connection.id,
                    operation_id = %operation_id,
                    error = %e,
                    "Rejected subscription"
                );
                return self
                    .reply(connection, ServerMessage::error(Some(operation_id), e.to_string()))
                    .await;
            }
        };

        self.context
            .index
            .subscribe(&topics, connection, operation, &operation_id)
            .await?;

        info!(
            connection_id = %connection.id,
            operation_id = %operation_id,
            topics = ?topics,
            "Subscription started"
        );
        Ok(())
    }

    async fn reply(&self, connection: &Connection, message: ServerMessage) -> Result<(), FanoutError> {
        match self.context.registry.send(connection, &message).await? {
            SendOutcome::Delivered => Ok(()),
            SendOutcome::Pruned => {
                self.context
                    .index
                    .unsubscribe_all_by_connection_id(&connection.id)
                    .await
            }
        }
    }
}

#[async_trait]
impl MessageHandler for SubscriptionServer {
    async fn handle_message(&self, connection_id: &str, message: String) -> Result<(), FanoutError> {
        self.on_message(connection_id, &message).await
    }
}
