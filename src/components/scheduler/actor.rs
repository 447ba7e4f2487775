use super::engine::{ChangeRequest, PlacementRequest, ReconcileOutcome, ReconciliationEngine};
use crate::error::{store_error, AppResult};
use tokio::sync::mpsc;
use tracing::info;

/// The scheduler actor that processes reconciliation requests.
///
/// Requests drain one at a time through the mailbox, so two reconciliations
/// for the same user can never interleave their store writes.
pub struct SchedulerActor {
    engine: ReconciliationEngine,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

/// Commands that can be sent to the scheduler actor
pub enum SchedulerCommand {
    PlaceTasks(PlacementRequest, mpsc::Sender<AppResult<ReconcileOutcome>>),
    ApplyChange(ChangeRequest, mpsc::Sender<AppResult<ReconcileOutcome>>),
    RecordDuration(String, u32, mpsc::Sender<AppResult<Vec<u32>>>),
    Shutdown,
}

/// Handle for communicating with the scheduler actor
#[derive(Clone)]
pub struct SchedulerActorHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerActorHandle {
    /// Place new microtasks into a day
    pub async fn place_tasks(&self, request: PlacementRequest) -> AppResult<ReconcileOutcome> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(SchedulerCommand::PlaceTasks(request, response_tx))
            .await
            .map_err(|e| store_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| store_error("Response channel closed"))?
    }

    /// Reflow a day around a moved or deleted event
    pub async fn apply_change(&self, request: ChangeRequest) -> AppResult<ReconcileOutcome> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(SchedulerCommand::ApplyChange(request, response_tx))
            .await
            .map_err(|e| store_error(&format!("Actor mailbox error: {}", e)))?;

        response_rx
            .recv()
            .await
            .ok_or_else(|| store_error("Response channel closed"))?
    }

    /// Record an observed task duration
    pub async fn record_duration(&self, task_name: String, minutes: u32) -> AppResult<Vec<u32>> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.command_tx
            .send(SchedulerCommand::RecordDuration(
                task_name, minutes, response_tx,
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
        let _ = self.command_tx.send(SchedulerCommand::Shutdown).await;
        Ok(())
    }
}

impl SchedulerActor {
    /// Create a new actor and return its handle
    pub fn new(engine: ReconciliationEngine) -> (Self, SchedulerActorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);

        let actor = Self { engine, command_rx };

        let handle = SchedulerActorHandle { command_tx };

        (actor, handle)
    }

    /// Start the actor's processing loop
    pub async fn run(&mut self) {
        info!("Scheduler actor started");

        // Process commands
        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                SchedulerCommand::PlaceTasks(request, response_tx) => {
                    let result = self.engine.place_tasks(request).await;
                    let _ = response_tx.send(result).await;
                }
                SchedulerCommand::ApplyChange(request, response_tx) => {
                    let result = self.engine.apply_change(request).await;
                    let _ = response_tx.send(result).await;
                }
                SchedulerCommand::RecordDuration(task_name, minutes, response_tx) => {
                    let result = self.engine.record_duration(&task_name, minutes).await;
                    let _ = response_tx.send(result).await;
                }
                SchedulerCommand::Shutdown => {
                    info!("Scheduler actor shutting down");
                    break;
                }
            }
        }

        info!("Scheduler actor shut down");
    }
}
