use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::models::{OperationRequest, Subscriber};
use super::names::NameFunctions;
use super::pages::SubscriberPages;
use crate::connection::Connection;
use crate::event::Event;
use crate::shared::FanoutError;
use crate::store::KeyValueStore;

/// Event-name to subscriber-list mapping
#[async_trait]
pub trait SubscriptionIndex: Send + Sync {
    /// Register `connection` against each of `names`
    ///
    /// A connection already subscribed under a key is left as is, so each
    /// key holds at most one subscriber per connection id.
    async fn subscribe(
        &self,
        names: &[String],
        connection: &Connection,
        operation: OperationRequest,
        operation_id: &str,
    ) -> Result<(), FanoutError>;

    /// Remove every entry under `subscriber.event` for the subscriber's connection
    async fn unsubscribe(&self, subscriber: &Subscriber) -> Result<(), FanoutError>;

    /// Remove the one operation of a connection, across all keys
    async fn unsubscribe_operation(
        &self,
        connection_id: &str,
        operation_id: &str,
    ) -> Result<(), FanoutError>;

    /// Remove every subscription held by a connection, across all keys
    async fn unsubscribe_all_by_connection_id(&self, connection_id: &str)
        -> Result<(), FanoutError>;

    /// One-shot sequence of the subscribers for `event`'s key
    fn subscribers_by_event(&self, event: &Event) -> SubscriberPages;
}

/// SubscriptionIndex over a pluggable key-value store
///
/// Each key holds the ordered subscriber list for one event name; insertion
/// order is delivery order. Keys whose list becomes empty are deleted.
pub struct StoreSubscriptionIndex {
    store: Arc<dyn KeyValueStore<Vec<Subscriber>>>,
    names: NameFunctions,
}

impl StoreSubscriptionIndex {
    pub fn new(store: Arc<dyn KeyValueStore<Vec<Subscriber>>>) -> Self {
        Self::with_names(store, NameFunctions::default())
    }

    pub fn with_names(store: Arc<dyn KeyValueStore<Vec<Subscriber>>>, names: NameFunctions) -> Self {
        Self { store, names }
    }

    /// Drop every subscriber under `key` matching `remove`
    async fn remove_where<F>(&self, key: &str, remove: F) -> Result<(), FanoutError>
    where
        F: Fn(&Subscriber) -> bool + Send + 'static,
    {
        self.store
            .update(
                key,
                Box::new(move |current| {
                    let mut list = current?;
                    list.retain(|subscriber| !remove(subscriber));
                    (!list.is_empty()).then_some(list)
                }),
            )
            .await?;
        Ok(())
    }

    /// Apply `remove_where` to every key currently in the store
    async fn remove_everywhere<F>(&self, remove: F) -> Result<(), FanoutError>
    where
        F: Fn(&Subscriber) -> bool + Clone + Send + 'static,
    {
        for key in self.store.keys().await? {
            self.remove_where(&key, remove.clone()).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionIndex for StoreSubscriptionIndex {
    #[instrument(skip(self, connection, operation), fields(connection_id = %connection.id))]
    async fn subscribe(
        &self,
        names: &[String],
        connection: &Connection,
        operation: OperationRequest,
        operation_id: &str,
    ) -> Result<(), FanoutError> {
        for name in names {
            let key = self.names.name_from_connection(name, connection);
            let subscriber = Subscriber {
                connection: connection.clone(),
                operation: operation.clone(),
                operation_id: operation_id.to_string(),
                event: key.clone(),
            };

            self.store
                .update(
                    &key,
                    Box::new(move |current| {
                        let mut list = current.unwrap_or_default();
                        let already_subscribed = list
                            .iter()
                            .any(|existing| existing.connection.id == subscriber.connection.id);
                        if !already_subscribed {
                            list.push(subscriber);
                        }
                        Some(list)
                    }),
                )
                .await?;

            debug!(event = %key, operation_id = %operation_id, "Subscribed");
        }

        Ok(())
    }

    #[instrument(skip(self, subscriber), fields(event = %subscriber.event))]
    async fn unsubscribe(&self, subscriber: &Subscriber) -> Result<(), FanoutError> {
        let connection_id = subscriber.connection.id.clone();
        self.remove_where(&subscriber.event, move |s| s.connection.id == connection_id)
            .await
    }

    #[instrument(skip(self))]
    async fn unsubscribe_operation(
        &self,
        connection_id: &str,
        operation_id: &str,
    ) -> Result<(), FanoutError> {
        let connection_id = connection_id.to_string();
        let operation_id = operation_id.to_string();
        self.remove_everywhere(move |s| {
            s.connection.id == connection_id && s.operation_id == operation_id
        })
        .await
    }

    #[instrument(skip(self))]
    async fn unsubscribe_all_by_connection_id(
        &self,
        connection_id: &str,
    ) -> Result<(), FanoutError> {
        let target = connection_id.to_string();
        self.remove_everywhere(move |s| s.connection.id == target)
            .await?;

        info!(connection_id = %connection_id, "Removed all subscriptions for connection");
        Ok(())
    }

    fn subscribers_by_event(&self, event: &Event) -> SubscriberPages {
        let key = self.names.name_from_event(event);
        let store = self.store.clone();

        SubscriberPages::once(async move {
            let subscribers = store.get(&key).await?.unwrap_or_default();
            debug!(event = %key, subscribers = subscribers.len(), "Resolved subscribers");
            Ok(subscribers)
        })
    }
}
