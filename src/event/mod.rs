// Event fanout
//
// An inbound application event is resolved against the subscription index
// and delivered to every subscriber whose operation yields a result. Each
// subscriber runs in its own isolated branch.

// Public API - what other modules can use
pub use dispatcher::{DispatchFailure, DispatchReport, EventDispatcher, OnError};
pub use events::{Event, InboundEvent, TransportEventType, TransportFrame};
pub use handlers::{publish_event, receive_inbound};
pub use router::{route_inbound, RouteOutcome};

// Internal modules
mod dispatcher;
mod events;
mod handlers;
mod router;
