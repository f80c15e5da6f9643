use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::models::{Connection, ConnectionData};
use super::transport::{Transport, TransportError};
use crate::shared::FanoutError;
use crate::store::KeyValueStore;
use crate::websockets::ServerMessage;

/// What became of a message handed to [`ConnectionRegistry::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The transport reported the peer gone and its record was removed
    Pruned,
}

/// Connection identity, per-connection data and outbound delivery
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Return the stored connection, or create an initialized one on first contact
    async fn hydrate_or_register(
        &self,
        connection_id: &str,
        endpoint: &str,
    ) -> Result<Connection, FanoutError>;

    /// Return the stored connection; `ConnectionNotFound` if absent
    async fn hydrate(&self, connection_id: &str) -> Result<Connection, FanoutError>;

    /// Create an uninitialized connection pending its handshake, replacing any stale record
    async fn register(&self, connection_id: &str, endpoint: &str)
        -> Result<Connection, FanoutError>;

    /// Replace the connection's data payload
    async fn set_data(
        &self,
        connection_id: &str,
        data: ConnectionData,
    ) -> Result<Connection, FanoutError>;

    /// Deliver a message
    ///
    /// A connection the transport reports as gone is unregistered and
    /// `SendOutcome::Pruned` is returned, so the caller can drop whatever it
    /// still holds for that connection. Any other transport failure is returned.
    async fn send(
        &self,
        connection: &Connection,
        message: &ServerMessage,
    ) -> Result<SendOutcome, FanoutError>;

    /// Remove the connection record; removing twice is not an error
    async fn unregister(&self, connection: &Connection) -> Result<(), FanoutError>;

    /// Close the connection after a short grace period, in the background
    fn close(&self, connection: &Connection);

    async fn connections(&self) -> Result<Vec<Connection>, FanoutError>;
}

/// ConnectionRegistry over a pluggable key-value store
pub struct StoreConnectionRegistry {
    store: Arc<dyn KeyValueStore<Connection>>,
    transport: Arc<dyn Transport>,
    close_grace: Duration,
}

impl StoreConnectionRegistry {
    pub fn new(
        store: Arc<dyn KeyValueStore<Connection>>,
        transport: Arc<dyn Transport>,
        close_grace: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            close_grace,
        }
    }
}

#[async_trait]
impl ConnectionRegistry for StoreConnectionRegistry {
    #[instrument(skip(self))]
    async fn hydrate_or_register(
        &self,
        connection_id: &str,
        endpoint: &str,
    ) -> Result<Connection, FanoutError> {
        let fresh = Connection::new(
            connection_id,
            endpoint,
            ConnectionData::initialized(Default::default()),
        );

        self.store
            .update(
                connection_id,
                Box::new(move |current| {
                    if current.is_none() {
                        debug!(connection_id = %fresh.id, "Lazily registering connection");
                    }
                    Some(current.unwrap_or(fresh))
                }),
            )
            .await?
            .ok_or_else(|| FanoutError::Storage(format!("{} vanished on register", connection_id)))
    }

    #[instrument(skip(self))]
    async fn hydrate(&self, connection_id: &str) -> Result<Connection, FanoutError> {
        self.store
            .get(connection_id)
            .await?
            .ok_or_else(|| FanoutError::ConnectionNotFound(connection_id.to_string()))
    }

    #[instrument(skip(self))]
    async fn register(
        &self,
        connection_id: &str,
        endpoint: &str,
    ) -> Result<Connection, FanoutError> {
        let connection = Connection::new(connection_id, endpoint, ConnectionData::default());
        self.store.set(connection_id, connection.clone()).await?;

        info!(connection_id = %connection_id, endpoint = %endpoint, "Connection registered");
        Ok(connection)
    }

    #[instrument(skip(self, data))]
    async fn set_data(
        &self,
        connection_id: &str,
        data: ConnectionData,
    ) -> Result<Connection, FanoutError> {
        // a record pruned in the meantime stays pruned
        self.store
            .update(
                connection_id,
                Box::new(move |current| {
                    current.map(|mut connection| {
                        connection.data = data;
                        connection
                    })
                }),
            )
            .await?
            .ok_or_else(|| FanoutError::ConnectionNotFound(connection_id.to_string()))
    }

    async fn send(
        &self,
        connection: &Connection,
        message: &ServerMessage,
    ) -> Result<SendOutcome, FanoutError> {
        let body =
            serde_json::to_vec(message).map_err(|e| FanoutError::Transport(e.to_string()))?;

        match self
            .transport
            .post(&connection.id, &connection.endpoint, &body)
            .await
        {
            Ok(()) => Ok(SendOutcome::Delivered),
            Err(TransportError::Gone { status }) => {
                let stale = FanoutError::StaleConnection {
                    connection_id: connection.id.clone(),
                    status,
                };
                warn!(connection_id = %connection.id, error = %stale, "Pruning stale connection");
                self.unregister(connection).await?;
                Ok(SendOutcome::Pruned)
            }
            Err(TransportError::Other(msg)) => Err(FanoutError::Transport(msg)),
        }
    }

    #[instrument(skip(self, connection), fields(connection_id = %connection.id))]
    async fn unregister(&self, connection: &Connection) -> Result<(), FanoutError> {
        self.store.delete(&connection.id).await?;
        debug!("Connection unregistered");
        Ok(())
    }

    fn close(&self, connection: &Connection) {
        let transport = self.transport.clone();
        let grace = self.close_grace;
        let connection_id = connection.id.clone();
        let endpoint = connection.endpoint.clone();

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Err(e) = transport.close(&connection_id, &endpoint).await {
                debug!(connection_id = %connection_id, error = %e, "Close failed");
            }
        });
    }

    async fn connections(&self) -> Result<Vec<Connection>, FanoutError> {
        let mut connections = Vec::new();
        for key in self.store.keys().await? {
            if let Some(connection) = self.store.get(&key).await? {
                connections.push(connection);
            }
        }
        Ok(connections)
    }
}
