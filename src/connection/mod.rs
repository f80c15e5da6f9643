// Connection lifecycle and outbound delivery
//
// The registry owns connection identity and per-connection data, and is the
// only component that talks to the transport. It knows nothing about
// subscriptions.

// Public API - what other modules can use
pub use cleanup_task::{start_cleanup_task, sweep_pending_connections};
pub use models::{Connection, ConnectionData};
pub use registry::{ConnectionRegistry, SendOutcome, StoreConnectionRegistry};
pub use transport::{ChannelTransport, Transport, TransportError, GONE_STATUS};

// Internal modules
mod cleanup_task;
mod models;
mod registry;
mod transport;
