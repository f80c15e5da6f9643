use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Custom per-connection data, replaced as a whole by `set_data`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionData {
    /// Arbitrary context attached during the handshake (auth claims, tenant, ...)
    pub context: Map<String, Value>,
    /// Whether the client completed `connection_init`
    pub is_initialized: bool,
}

impl ConnectionData {
    pub fn initialized(context: Map<String, Value>) -> Self {
        Self {
            context,
            is_initialized: true,
        }
    }
}

/// A live client connection as stored by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    /// Transport address used to post messages back to the client
    pub endpoint: String,
    pub data: ConnectionData,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>, data: ConnectionData) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            data,
            created_at: Utc::now(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.data.is_initialized
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.data.context
    }
}
