use crate::components::document_store::{collections, DocumentStoreHandle};
use crate::error::AppResult;
use serde::{Deserialize, Serialize};
use serde_json;

/// Number of duration observations kept per task
pub const HISTORY_WINDOW: usize = 3;

/// Rolling record of how long one recurring task actually took
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHistoryRecord {
    pub user_id: String,
    pub task_name: String,
    /// Observed durations in minutes, oldest first
    pub durations: Vec<u32>,
}

/// Store-backed aggregator of per-task duration history
#[derive(Clone)]
pub struct TaskHistory {
    store: DocumentStoreHandle,
}

impl TaskHistory {
    pub fn new(store: DocumentStoreHandle) -> Self {
        Self { store }
    }

    fn record_key(user_id: &str, task_name: &str) -> String {
        format!("{}:{}", user_id, task_name)
    }

    /// Record one observed duration, keeping only the most recent
    /// [`HISTORY_WINDOW`] observations. Returns the updated window.
    pub async fn record_duration(
        &self,
        user_id: &str,
        task_name: &str,
        minutes: u32,
    ) -> AppResult<Vec<u32>> {
        let key = Self::record_key(user_id, task_name);

        let mut record = match self.store.get(collections::TASK_HISTORY, &key).await? {
            Some(doc) => serde_json::from_value::<TaskHistoryRecord>(doc)?,
            None => TaskHistoryRecord {
                user_id: user_id.to_string(),
                task_name: task_name.to_string(),
                durations: Vec::new(),
            },
        };

        record.durations.push(minutes);
        while record.durations.len() > HISTORY_WINDOW {
            record.durations.remove(0);
        }

        self.store
            .put(collections::TASK_HISTORY, &key, serde_json::to_value(&record)?)
            .await?;

        Ok(record.durations)
    }

    /// Most recent durations for a task, oldest first; empty when the task
    /// has no history
    pub async fn recent_durations(&self, user_id: &str, task_name: &str) -> AppResult<Vec<u32>> {
        let key = Self::record_key(user_id, task_name);

        match self.store.get(collections::TASK_HISTORY, &key).await? {
            Some(doc) => {
                let record: TaskHistoryRecord = serde_json::from_value(doc)?;
                Ok(record.durations)
            }
            None => Ok(Vec::new()),
        }
    }
}
