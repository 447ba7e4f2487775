use super::backend::DocumentBackend;
use crate::error::{store_error, AppResult};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::info;

/// The document store actor that processes messages
pub struct DocumentStoreActor {
    backend: Box<dyn DocumentBackend>,
    command_rx: mpsc::Receiver<DocumentStoreCommand>,
}

/// Commands that can be sent to the document store actor
pub enum DocumentStoreCommand {
    Get(String, String, mpsc::Sender<AppResult<Option<Value>>>),
    Put(String, String, Value, mpsc::Sender<AppResult<()>>),
    Query(String, mpsc::Sender<AppResult<Vec<Value>>>),
    UpdateFields(
        String,
        String,
        Map<String, Value>,
        mpsc::Sender<AppResult<()>>,
    ),
    Delete(String, String, mpsc::Sender<AppResult<()>>),
    Shutdown,
}

/// Handle for communicating with the document store actor
#[derive(Clone)]
pub struct DocumentStoreHandle {
    command_tx: mpsc::Sender<DocumentStoreCommand>,
}

impl DocumentStoreHandle {
    /// Create a new empty handle for initialization purposes
    pub fn empty() -> Self {
        let (command_tx, _) = mpsc::channel(32);
        Self { command_tx }
    }

    /// Get a document by key
    pub async fn get(&self, collection: &str, key: &str) -> AppResult<Option<Value>> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(DocumentStoreCommand::Get(
                collection.to_string(),
                key.to_string(),
                response_tx,
            ))
            .await
            .map_err(|e| store_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| store_error("Response channel closed"))?
    }

    /// Store a document under a key
    pub async fn put(&self, collection: &str, key: &str, doc: Value) -> AppResult<()> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(DocumentStoreCommand::Put(
                collection.to_string(),
                key.to_string(),
                doc,
                response_tx,
            ))
            .await
            .map_err(|e| store_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| store_error("Response channel closed"))?
    }

    /// List every document in a collection
    pub async fn query(&self, collection: &str) -> AppResult<Vec<Value>> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(DocumentStoreCommand::Query(
                collection.to_string(),
                response_tx,
            ))
            .await
            .map_err(|e| store_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| store_error("Response channel closed"))?
    }

    /// Merge fields into an existing document
    pub async fn update_fields(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
    ) -> AppResult<()> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(DocumentStoreCommand::UpdateFields(
                collection.to_string(),
                key.to_string(),
                fields,
                response_tx,
            ))
            .await
            .map_err(|e| store_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| store_error("Response channel closed"))?
    }

    /// Delete a document by key
    pub async fn delete(&self, collection: &str, key: &str) -> AppResult<()> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(DocumentStoreCommand::Delete(
                collection.to_string(),
                key.to_string(),
                response_tx,
            ))
            .await
            .map_err(|e| store_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| store_error("Response channel closed"))?
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> AppResult<()> {
        let _ = self.command_tx.send(DocumentStoreCommand::Shutdown).await;
        Ok(())
    }
}

impl DocumentStoreActor {
    /// Create a new actor over the given backend and return its handle
    pub fn new(backend: Box<dyn DocumentBackend>) -> (Self, DocumentStoreHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self {
            backend,
            command_rx,
        };

        let handle = DocumentStoreHandle { command_tx };

        (actor, handle)
    }

    /// Create an actor over the given backend and spawn it onto the runtime
    pub fn spawn(backend: Box<dyn DocumentBackend>) -> DocumentStoreHandle {
        let (mut actor, handle) = Self::new(backend);
        tokio::spawn(async move {
            actor.run().await;
        });
        handle
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Document store actor started");

        // Process commands
        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                DocumentStoreCommand::Get(collection, key, response_tx) => {
                    let result = self.backend.get(&collection, &key).await;
                    let _ = response_tx.send(result).await;
                }
                DocumentStoreCommand::Put(collection, key, doc, response_tx) => {
                    let result = self.backend.put(&collection, &key, doc).await;
                    let _ = response_tx.send(result).await;
                }
                DocumentStoreCommand::Query(collection, response_tx) => {
                    let result = self.backend.query(&collection).await;
                    let _ = response_tx.send(result).await;
                }
                DocumentStoreCommand::UpdateFields(collection, key, fields, response_tx) => {
                    let result = self.backend.update_fields(&collection, &key, fields).await;
                    let _ = response_tx.send(result).await;
                }
                DocumentStoreCommand::Delete(collection, key, response_tx) => {
                    let result = self.backend.delete(&collection, &key).await;
                    let _ = response_tx.send(result).await;
                }
                DocumentStoreCommand::Shutdown => {
                    info!("Document store actor shutting down");
                    break;
                }
            }
        }

        info!("Document store actor shut down");
    }
}
