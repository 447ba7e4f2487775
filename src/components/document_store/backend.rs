use crate::error::{not_found, AppResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Storage backend for the document store.
///
/// Documents are opaque JSON objects grouped into named collections and
/// keyed by string identifiers.
#[async_trait]
pub trait DocumentBackend: Send + Sync + 'static {
    /// Get a document by key
    async fn get(&self, collection: &str, key: &str) -> AppResult<Option<Value>>;

    /// Store a document under a key, replacing any existing one
    async fn put(&self, collection: &str, key: &str, doc: Value) -> AppResult<()>;

    /// List every document in a collection
    async fn query(&self, collection: &str) -> AppResult<Vec<Value>>;

    /// Merge the given fields into an existing document
    async fn update_fields(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> AppResult<()>;

    /// Delete a document by key
    async fn delete(&self, collection: &str, key: &str) -> AppResult<()>;
}

/// In-memory implementation of the backend (for testing)
#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn get(&self, collection: &str, key: &str) -> AppResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn put(&self, collection: &str, key: &str, doc: Value) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), doc);
        Ok(())
    }

    async fn query(&self, collection: &str) -> AppResult<Vec<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn update_fields(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| not_found(&format!("document {}/{}", collection, key)))?;

        if let Value::Object(existing) = doc {
            for (field, value) in fields {
                existing.insert(field, value);
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_backend_round_trip() {
        let backend = MemoryBackend::new();

        backend
            .put("events", "e1", json!({"id": "e1", "title": "Breakfast"}))
            .await
            .unwrap();

        let doc = backend.get("events", "e1").await.unwrap().unwrap();
        assert_eq!(doc["title"], "Breakfast");

        let all = backend.query("events").await.unwrap();
        assert_eq!(all.len(), 1);

        backend.delete("events", "e1").await.unwrap();
        assert!(backend.get("events", "e1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_backend_update_fields() {
        let backend = MemoryBackend::new();

        backend
            .put("events", "e1", json!({"id": "e1", "title": "Breakfast"}))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("title".to_string(), json!("Brunch"));
        backend.update_fields("events", "e1", fields).await.unwrap();

        let doc = backend.get("events", "e1").await.unwrap().unwrap();
        assert_eq!(doc["title"], "Brunch");
        assert_eq!(doc["id"], "e1");

        // Updating an absent document is an error
        let mut fields = Map::new();
        fields.insert("title".to_string(), json!("Lunch"));
        assert!(backend.update_fields("events", "e2", fields).await.is_err());
    }
}
