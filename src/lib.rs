// Library crate for the subscription fanout server
// This file exposes the public API for integration tests

pub mod app;
pub mod config;
pub mod connection;
pub mod event;
pub mod execution;
pub mod shared;
pub mod store;
pub mod subscription;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use config::ServerConfig;
pub use connection::{Connection, ConnectionRegistry, Transport, TransportError};
pub use event::{DispatchFailure, DispatchReport, Event, EventDispatcher};
pub use execution::{ExecutionEngine, ExecutionResult, ResolverEngine, SubscriptionField};
pub use shared::{AppState, AppStateBuilder, FanoutError, ServerContext};
pub use subscription::{OperationRequest, Subscriber, SubscriptionIndex};
pub use websockets::{ClientMessage, ServerMessage, SubscriptionServer};
