use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::execution::ExecutionResult;
use crate::subscription::OperationRequest;

/// WebSocket subprotocol spoken on the socket
pub const PROTOCOL: &str = "graphql-ws";

/// Client -> Server frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConnectionInit {
        #[serde(default)]
        payload: Option<Map<String, Value>>,
    },
    #[serde(alias = "subscribe")]
    Start {
        id: String,
        payload: OperationRequest,
    },
    #[serde(alias = "complete")]
    Stop { id: String },
    ConnectionTerminate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Server -> Client frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck,
    /// Delivery envelope for one subscription result
    Data {
        id: String,
        payload: ExecutionResult,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        payload: ErrorPayload,
    },
    Complete {
        id: String,
    },
    ConnectionError {
        payload: ErrorPayload,
    },
}

impl ServerMessage {
    pub fn data(operation_id: String, payload: ExecutionResult) -> Self {
        ServerMessage::Data {
            id: operation_id,
            payload,
        }
    }

    pub fn error(operation_id: Option<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            id: operation_id,
            payload: ErrorPayload {
                message: message.into(),
            },
        }
    }

    pub fn connection_error(message: impl Into<String>) -> Self {
        ServerMessage::ConnectionError {
            payload: ErrorPayload {
                message: message.into(),
            },
        }
    }
}
