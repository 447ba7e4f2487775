mod actor;
pub mod engine;
mod handle;
pub mod history;
pub mod parser;
pub mod prompt;

pub use engine::{ChangeRequest, PlacementRequest, ReconcileOutcome, ReconciliationEngine};
pub use handle::SchedulerHandle;
pub use history::{TaskHistory, TaskHistoryRecord, HISTORY_WINDOW};
pub use prompt::{ChangeDirective, PromptConfig};

use crate::components::completion::GeminiCompletionClient;
use crate::components::document_store::DocumentStoreHandle;
use crate::components::events::store::EventStore;
use crate::components::events::time::resolve_timezone;
use crate::config::Config;
use crate::error::AppResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Scheduler component owning the reconciliation engine
#[derive(Default)]
pub struct Scheduler {
    handle: RwLock<Option<SchedulerHandle>>,
}

impl Scheduler {
    /// Create a new scheduler component
    pub fn new() -> Self {
        Self {
            handle: RwLock::new(None),
        }
    }

    /// Get the handle if the component has been initialized
    pub async fn get_handle(&self) -> Option<SchedulerHandle> {
        let handle_lock = self.handle.read().await;
        handle_lock.clone()
    }
}

#[async_trait]
impl super::Component for Scheduler {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    async fn init(
        &self,
        config: Arc<RwLock<Config>>,
        store_handle: DocumentStoreHandle,
    ) -> AppResult<()> {
        let mut handle_lock = self.handle.write().await;
        if handle_lock.is_some() {
            return Ok(());
        }

        let config_read = config.read().await;
        let timezone = resolve_timezone(&config_read.timezone)?;

        let events = EventStore::new(store_handle.clone(), config_read.title_match, timezone);
        let history = TaskHistory::new(store_handle);

        let completion = Arc::new(GeminiCompletionClient::new(
            config_read.gemini_api_key.clone(),
            config_read.gemini_model.clone(),
            Duration::from_secs(config_read.completion_timeout_secs),
        ));

        let mut prompt_config = PromptConfig::new(timezone);
        prompt_config.strict_overlap_check = config_read.strict_overlap_check;

        let engine = ReconciliationEngine::new(
            events,
            completion,
            history,
            prompt_config,
            config_read.user_id.clone(),
        );

        *handle_lock = Some(SchedulerHandle::new(engine));

        Ok(())
    }

    async fn shutdown(&self) -> AppResult<()> {
        // Shutdown the handle if it exists
        let handle_lock = self.handle.read().await;
        if let Some(handle) = &*handle_lock {
            handle.shutdown().await?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
