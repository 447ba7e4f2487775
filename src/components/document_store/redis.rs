use super::backend::DocumentBackend;
use crate::error::{not_found, store_error, AppResult};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client as RedisClient};
use serde_json::{Map, Value};

/// Redis-backed document store.
///
/// Each document lives at `<collection>:<key>` as a JSON string; a set named
/// after the collection tracks its member keys so collections can be listed.
#[derive(Clone)]
pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    /// Connect to Redis and return a backend
    pub async fn connect(redis_url: &str) -> AppResult<Self> {
        let client = RedisClient::open(redis_url)
            .map_err(|e| store_error(&format!("Failed to create Redis client: {}", e)))?;

        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| store_error(&format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { manager })
    }

    fn doc_key(collection: &str, key: &str) -> String {
        format!("{}:{}", collection, key)
    }
}

#[async_trait]
impl DocumentBackend for RedisBackend {
    async fn get(&self, collection: &str, key: &str) -> AppResult<Option<Value>> {
        let mut conn = self.manager.clone();

        let raw: Option<String> = conn
            .get(Self::doc_key(collection, key))
            .await
            .map_err(|e| store_error(&format!("Failed to read document: {}", e)))?;

        match raw {
            Some(json) => {
                let doc: Value = serde_json::from_str(&json)
                    .map_err(|e| store_error(&format!("Failed to deserialize document: {}", e)))?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, collection: &str, key: &str, doc: Value) -> AppResult<()> {
        let mut conn = self.manager.clone();

        let json = serde_json::to_string(&doc)
            .map_err(|e| store_error(&format!("Failed to serialize document: {}", e)))?;

        let _: () = conn
            .set(Self::doc_key(collection, key), json)
            .await
            .map_err(|e| store_error(&format!("Failed to write document: {}", e)))?;

        let _: () = conn
            .sadd(collection, key)
            .await
            .map_err(|e| store_error(&format!("Failed to index document: {}", e)))?;

        Ok(())
    }

    async fn query(&self, collection: &str) -> AppResult<Vec<Value>> {
        let mut conn = self.manager.clone();

        let keys: Vec<String> = conn
            .smembers(collection)
            .await
            .map_err(|e| store_error(&format!("Failed to list collection: {}", e)))?;

        let mut docs = Vec::with_capacity(keys.len());
        for key in keys {
            // Membership set entries can outlive their documents; skip the holes
            if let Some(doc) = self.get(collection, &key).await? {
                docs.push(doc);
            }
        }

        Ok(docs)
    }

    async fn update_fields(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> AppResult<()> {
        let mut doc = self
            .get(collection, key)
            .await?
            .ok_or_else(|| not_found(&format!("document {}/{}", collection, key)))?;

        if let Value::Object(existing) = &mut doc {
            for (field, value) in fields {
                existing.insert(field, value);
            }
        }

        self.put(collection, key, doc).await
    }

    async fn delete(&self, collection: &str, key: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();

        let _: () = conn
            .del(Self::doc_key(collection, key))
            .await
            .map_err(|e| store_error(&format!("Failed to delete document: {}", e)))?;

        let _: () = conn
            .srem(collection, key)
            .await
            .map_err(|e| store_error(&format!("Failed to unindex document: {}", e)))?;

        Ok(())
    }
}
