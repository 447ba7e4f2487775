use super::actor::{SchedulerActor, SchedulerActorHandle};
use super::engine::{ChangeRequest, PlacementRequest, ReconcileOutcome, ReconciliationEngine};
use crate::error::AppResult;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Handle for interacting with the scheduler actor
#[derive(Clone)]
pub struct SchedulerHandle {
    actor_handle: SchedulerActorHandle,
    _actor_task: Arc<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Create a new SchedulerHandle and spawn the actor
    pub fn new(engine: ReconciliationEngine) -> Self {
        // Create the actor and get its handle
        let (mut actor, handle) = SchedulerActor::new(engine);

        // Spawn a task to run the actor
        let actor_task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            actor_handle: handle,
            _actor_task: Arc::new(actor_task),
        }
    }

    /// Place new microtasks into a day
    pub async fn place_tasks(&self, request: PlacementRequest) -> AppResult<ReconcileOutcome> {
        self.actor_handle.place_tasks(request).await
    }

    /// Reflow a day around a moved or deleted event
    pub async fn apply_change(&self, request: ChangeRequest) -> AppResult<ReconcileOutcome> {
        self.actor_handle.apply_change(request).await
    }

    /// Record an observed task duration
    pub async fn record_duration(&self, task_name: String, minutes: u32) -> AppResult<Vec<u32>> {
        self.actor_handle.record_duration(task_name, minutes).await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> AppResult<()> {
        self.actor_handle.shutdown().await
    }
}
