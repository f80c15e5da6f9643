#![allow(dead_code)] // Test utilities may not all be used in every test

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use fanout::{Transport, TransportError};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Transport that records every post instead of writing to a socket
///
/// Connections can be marked gone (posts fail with 410) or failing (posts
/// fail with a non-gone error) to exercise the registry's pruning paths.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent_messages: Arc<RwLock<HashMap<String, Vec<String>>>>,
    closed: Arc<RwLock<Vec<String>>>,
    gone: Arc<RwLock<HashSet<String>>>,
    failing: Arc<RwLock<HashSet<String>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn mark_gone(&self, connection_id: &str) {
        self.gone.write().await.insert(connection_id.to_string());
    }

    pub async fn mark_failing(&self, connection_id: &str) {
        self.failing.write().await.insert(connection_id.to_string());
    }

    pub async fn get_messages_for(&self, connection_id: &str) -> Vec<Value> {
        self.sent_messages
            .read()
            .await
            .get(connection_id)
            .map(|messages| {
                messages
                    .iter()
                    .map(|m| serde_json::from_str(m).expect("posted payload should be JSON"))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Messages of one protocol `type` sent to a connection
    pub async fn messages_of_type(&self, connection_id: &str, message_type: &str) -> Vec<Value> {
        self.get_messages_for(connection_id)
            .await
            .into_iter()
            .filter(|m| m["type"] == message_type)
            .collect()
    }

    pub async fn total_sent(&self) -> usize {
        self.sent_messages.read().await.values().map(Vec::len).sum()
    }

    pub async fn closed_connections(&self) -> Vec<String> {
        self.closed.read().await.clone()
    }

    pub async fn clear_messages(&self) {
        self.sent_messages.write().await.clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post(
        &self,
        connection_id: &str,
        _endpoint: &str,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if self.gone.read().await.contains(connection_id) {
            return Err(TransportError::gone());
        }
        if self.failing.read().await.contains(connection_id) {
            return Err(TransportError::Other("socket write failed".to_string()));
        }

        let message = String::from_utf8_lossy(payload).into_owned();
        self.sent_messages
            .write()
            .await
            .entry(connection_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn close(&self, connection_id: &str, _endpoint: &str) -> Result<(), TransportError> {
        self.closed.write().await.push(connection_id.to_string());
        Ok(())
    }
}
