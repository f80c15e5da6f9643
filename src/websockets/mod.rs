// Public API
pub use handler::websocket_handler;
pub use messages::{ClientMessage, ErrorPayload, ServerMessage, PROTOCOL};
pub use server::SubscriptionServer;
pub use socket::{MessageHandler, SocketError, SocketSession, SocketWrapper};

// Internal modules
mod handler;
mod messages;
mod server;
mod socket;
