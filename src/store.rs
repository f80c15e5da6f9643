use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::shared::FanoutError;

/// Read-modify-write closure handed to [`KeyValueStore::update`]
///
/// Receives the current value (if any) and returns the value to store;
/// returning `None` deletes the key.
pub type UpdateFn<V> = Box<dyn FnOnce(Option<V>) -> Option<V> + Send>;

/// Pluggable key-value storage backing the connection registry and subscription index
///
/// The core never assumes a concrete structure. Consistency under concurrent
/// writers is the backend's responsibility.
#[async_trait]
pub trait KeyValueStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, FanoutError>;

    async fn set(&self, key: &str, value: V) -> Result<(), FanoutError>;

    /// Remove a key; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), FanoutError>;

    async fn keys(&self) -> Result<Vec<String>, FanoutError>;

    /// Apply `f` to the current value and store the result
    ///
    /// The default implementation is a plain get followed by set/delete.
    /// Backends that can do better (a single lock, a transaction) should override it.
    async fn update(&self, key: &str, f: UpdateFn<V>) -> Result<Option<V>, FanoutError> {
        let current = self.get(key).await?;
        match f(current) {
            Some(value) => {
                self.set(key, value.clone()).await?;
                Ok(Some(value))
            }
            None => {
                self.delete(key).await?;
                Ok(None)
            }
        }
    }
}

/// In-memory implementation of KeyValueStore for single-process use and tests
///
/// Data is lost when the process exits.
pub struct InMemoryStore<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> Default for InMemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> InMemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl<V> KeyValueStore<V> for InMemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, FanoutError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: V) -> Result<(), FanoutError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), FanoutError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, FanoutError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    #[instrument(skip(self, f))]
    async fn update(&self, key: &str, f: UpdateFn<V>) -> Result<Option<V>, FanoutError> {
        let mut entries = self.entries.write().await;
        let current = entries.remove(key);
        let next = f(current);
        match &next {
            Some(value) => {
                entries.insert(key.to_string(), value.clone());
            }
            None => debug!(key = %key, "Update removed key"),
        }
        Ok(next)
    }
}
