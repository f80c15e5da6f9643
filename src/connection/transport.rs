use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// Status a transport reports when the peer is no longer reachable
pub const GONE_STATUS: u16 = 410;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("Connection gone (status {status})")]
    Gone { status: u16 },

    #[error("Transport failure: {0}")]
    Other(String),
}

impl TransportError {
    pub fn gone() -> Self {
        TransportError::Gone {
            status: GONE_STATUS,
        }
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, TransportError::Gone { .. })
    }
}

/// Byte-level send primitive the connection registry delivers through
#[async_trait]
pub trait Transport: Send + Sync {
    /// Post one message to a connection
    ///
    /// Must report `TransportError::Gone` when the peer has disconnected,
    /// so the caller can prune it.
    async fn post(
        &self,
        connection_id: &str,
        endpoint: &str,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Terminate a connection from the server side
    async fn close(&self, connection_id: &str, endpoint: &str) -> Result<(), TransportError>;
}

/// In-process transport backed by per-socket channels
///
/// Each accepted WebSocket attaches the sending half of its outbound queue.
/// Dropping that sender (via `close` or `detach`) ends the socket loop.
pub struct ChannelTransport {
    // connection_id -> outbound sender
    senders: RwLock<HashMap<String, mpsc::UnboundedSender<String>>>,
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
        }
    }

    pub async fn attach(&self, connection_id: String, sender: mpsc::UnboundedSender<String>) {
        self.senders.write().await.insert(connection_id, sender);
    }

    pub async fn detach(&self, connection_id: &str) {
        self.senders.write().await.remove(connection_id);
    }

    pub async fn is_attached(&self, connection_id: &str) -> bool {
        self.senders.read().await.contains_key(connection_id)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn post(
        &self,
        connection_id: &str,
        _endpoint: &str,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let message = String::from_utf8(payload.to_vec())
            .map_err(|e| TransportError::Other(format!("payload is not UTF-8: {}", e)))?;

        let senders = self.senders.read().await;
        let Some(sender) = senders.get(connection_id) else {
            return Err(TransportError::gone());
        };

        if sender.send(message).is_err() {
            drop(senders);
            debug!(connection_id = %connection_id, "Outbound channel closed");
            self.detach(connection_id).await;
            return Err(TransportError::gone());
        }

        Ok(())
    }

    async fn close(&self, connection_id: &str, _endpoint: &str) -> Result<(), TransportError> {
        self.detach(connection_id).await;
        Ok(())
    }
}
