//! In-process store guarded by a single reader/writer lock.
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::{
    address::Address,
    error::StoreError,
    store::{SubscriberStore, SubscriptionState},
};

/// Map held in memory; lost on restart.
///
/// Reads share the lock, writes take it exclusively for the whole map. Guards
/// are never held across an `.await`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    subscribers: RwLock<HashMap<Address, SubscriptionState>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscriptions.
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether there are no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

#[async_trait]
impl SubscriberStore for MemoryStore {
    async fn get_all(&self) -> Result<HashMap<Address, SubscriptionState>, StoreError> {
        Ok(self.subscribers.read().clone())
    }

    async fn get(&self, address: &Address) -> Result<SubscriptionState, StoreError> {
        self.subscribers
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(address.clone()))
    }

    async fn set(&self, address: &Address, state: SubscriptionState) -> Result<(), StoreError> {
        self.subscribers.write().insert(address.clone(), state);
        Ok(())
    }

    async fn exists(&self, address: &Address) -> Result<bool, StoreError> {
        Ok(self.subscribers.read().contains_key(address))
    }

    async fn delete(&self, address: &Address) -> Result<(), StoreError> {
        self.subscribers.write().remove(address);
        Ok(())
    }

    async fn update<F, R>(&self, address: &Address, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut SubscriptionState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let mut map = self.subscribers.write();
        let state = map
            .get_mut(address)
            .ok_or_else(|| StoreError::NotFound(address.clone()))?;
        Ok(f(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[tokio::test]
    async fn get_all_is_an_isolated_copy() {
        let store = MemoryStore::new();
        let a = addr("alice");
        store.set(&a, SubscriptionState::new(a.clone(), 7)).await.unwrap();

        let mut snapshot = store.get_all().await.unwrap();
        snapshot.get_mut(&a).unwrap().last_processed_height = 99;
        snapshot.remove(&a);

        assert_eq!(store.get(&a).await.unwrap().last_processed_height, 7);
    }

    #[tokio::test]
    async fn crud_semantics() {
        let store = MemoryStore::new();
        let a = addr("alice");

        assert!(matches!(store.get(&a).await, Err(StoreError::NotFound(_))));
        assert!(!store.exists(&a).await.unwrap());

        store.set(&a, SubscriptionState::new(a.clone(), 1)).await.unwrap();
        store.set(&a, SubscriptionState::new(a.clone(), 5)).await.unwrap();
        assert_eq!(store.get(&a).await.unwrap().last_processed_height, 5);
        assert_eq!(store.len(), 1);

        store.delete(&a).await.unwrap();
        store.delete(&a).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn update_requires_entry() {
        let store = MemoryStore::new();
        let a = addr("alice");
        let r = store.update(&a, |s| s.last_processed_height += 1).await;
        assert!(matches!(r, Err(StoreError::NotFound(_))));

        store.set(&a, SubscriptionState::new(a.clone(), 3)).await.unwrap();
        let h = store
            .update(&a, |s| {
                s.last_processed_height += 1;
                s.last_processed_height
            })
            .await
            .unwrap();
        assert_eq!(h, 4);
    }
}
