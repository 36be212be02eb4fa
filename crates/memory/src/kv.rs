//! Key/value scratchpad the model writes through the `memory` tool.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Session-scoped string store. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns the previous value.
    pub async fn store(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.write().await.insert(key.into(), value.into())
    }

    /// Same as [`store`](Self::store); updating a missing key creates it.
    pub async fn update(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.store(key, value).await
    }

    pub async fn retrieve(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn delete(&self, key: &str) -> Option<String> {
        self.entries.write().await.remove(key)
    }

    /// All entries, sorted by key.
    pub async fn list(&self) -> Vec<(String, String)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_and_retrieve() {
        let mem = MemoryStore::new();
        assert!(mem.store("price", "$19.99").await.is_none());
        assert_eq!(mem.retrieve("price").await.as_deref(), Some("$19.99"));
        assert!(mem.retrieve("missing").await.is_none());
    }

    #[tokio::test]
    async fn update_missing_key_stores_it() {
        let mem = MemoryStore::new();
        assert!(mem.update("cart", "2 items").await.is_none());
        assert_eq!(mem.update("cart", "3 items").await.as_deref(), Some("2 items"));
        assert_eq!(mem.retrieve("cart").await.as_deref(), Some("3 items"));
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let mem = MemoryStore::new();
        mem.store("a", "1").await;
        mem.store("b", "2").await;

        assert_eq!(mem.delete("a").await.as_deref(), Some("1"));
        assert!(mem.delete("a").await.is_none());
        assert_eq!(mem.len().await, 1);

        mem.clear().await;
        assert!(mem.is_empty().await);
    }

    #[tokio::test]
    async fn list_is_sorted_and_clones_share_state() {
        let mem = MemoryStore::new();
        let shared = mem.clone();
        shared.store("zeta", "last").await;
        shared.store("alpha", "first").await;

        let listed = mem.list().await;
        assert_eq!(
            listed,
            vec![
                ("alpha".to_string(), "first".to_string()),
                ("zeta".to_string(), "last".to_string())
            ]
        );
    }
}
