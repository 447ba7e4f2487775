pub mod import;
pub mod models;
pub mod store;
pub mod time;

pub use models::{calendar_id_for, Event, RecurrenceType, User};
pub use store::EventStore;

use crate::components::document_store::DocumentStoreHandle;
use crate::config::Config;
use crate::error::AppResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Events component exposing the typed event store
#[derive(Default)]
pub struct Events {
    store: RwLock<Option<EventStore>>,
}

impl Events {
    /// Create a new events component
    pub fn new() -> Self {
        Self {
            store: RwLock::new(None),
        }
    }

    /// Get the event store if the component has been initialized
    pub async fn get_store(&self) -> Option<EventStore> {
        let store_lock = self.store.read().await;
        store_lock.clone()
    }
}

#[async_trait]
impl super::Component for Events {
    fn name(&self) -> &'static str {
        "events"
    }

    async fn init(
        &self,
        config: Arc<RwLock<Config>>,
        store_handle: DocumentStoreHandle,
    ) -> AppResult<()> {
        let (title_match, timezone) = {
            let config_read = config.read().await;
            (
                config_read.title_match,
                time::resolve_timezone(&config_read.timezone)?,
            )
        };

        let mut store_lock = self.store.write().await;
        if store_lock.is_none() {
            *store_lock = Some(EventStore::new(store_handle, title_match, timezone));
        }

        Ok(())
    }

    async fn shutdown(&self) -> AppResult<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
