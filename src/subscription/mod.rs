// Subscription bookkeeping keyed by event name
//
// The index maps a (possibly tenant-scoped) event name to the subscribers
// registered against it. It has no knowledge of the transport.

// Public API - what other modules can use
pub use index::{StoreSubscriptionIndex, SubscriptionIndex};
pub use models::{OperationRequest, Subscriber};
pub use names::{NameFromConnection, NameFromEvent, NameFunctions};
pub use pages::SubscriberPages;

// Internal modules
mod index;
mod models;
mod names;
mod pages;
