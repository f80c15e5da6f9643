use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::connection::Connection;

/// A subscription operation as sent by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub query: String,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl OperationRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Map::new(),
            operation_name: None,
        }
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }
}

/// A (connection, operation) pair registered against one event name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Snapshot of the connection at subscribe time; it may go stale before delivery
    pub connection: Connection,
    pub operation: OperationRequest,
    pub operation_id: String,
    /// Tenant-scoped event name this entry is stored under
    pub event: String,
}
