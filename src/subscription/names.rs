use std::sync::Arc;

use crate::connection::Connection;
use crate::event::Event;

/// Derives the index key for a published event
pub type NameFromEvent = Arc<dyn Fn(&Event) -> String + Send + Sync>;

/// Derives the index key for a name requested by a connection
pub type NameFromConnection = Arc<dyn Fn(&str, &Connection) -> String + Send + Sync>;

/// Pure name-derivation functions injected into the subscription index
///
/// Both sides must agree on the key for an event to reach its subscribers.
#[derive(Clone)]
pub struct NameFunctions {
    pub from_event: NameFromEvent,
    pub from_connection: NameFromConnection,
}

impl Default for NameFunctions {
    fn default() -> Self {
        Self {
            from_event: Arc::new(|event: &Event| event.name.clone()),
            from_connection: Arc::new(|name: &str, _connection: &Connection| name.to_string()),
        }
    }
}

impl NameFunctions {
    pub fn new(from_event: NameFromEvent, from_connection: NameFromConnection) -> Self {
        Self {
            from_event,
            from_connection,
        }
    }

    /// Prefix every key with `"{tenant}:"` on both the publish and subscribe side
    pub fn tenant_prefixed(tenant: String) -> Self {
        let event_tenant = tenant.clone();
        Self {
            from_event: Arc::new(move |event: &Event| format!("{}:{}", event_tenant, event.name)),
            from_connection: Arc::new(move |name: &str, _connection: &Connection| {
                format!("{}:{}", tenant, name)
            }),
        }
    }

    pub fn name_from_event(&self, event: &Event) -> String {
        (self.from_event)(event)
    }

    pub fn name_from_connection(&self, name: &str, connection: &Connection) -> String {
        (self.from_connection)(name, connection)
    }
}
