use super::history::TaskHistory;
use super::parser::{normalize_schedule, parse_schedule, DroppedEntry, ScheduledTask};
use super::prompt::{
    build_change_prompt, build_placement_prompt, ChangeDirective, PromptConfig, TaskHistoryHint,
};
use crate::components::completion::CompletionService;
use crate::components::events::models::{calendar_id_for, Event, RecurrenceType, MICROTASK_CATEGORY};
use crate::components::events::store::EventStore;
use crate::components::events::time::from_local_time;
use crate::error::{invalid_format, AppResult, Error};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

/// One initial-placement attempt: insert the named tasks into a day
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub date: NaiveDate,
    pub additions: Vec<String>,
    /// Fold recent task durations into the instruction
    pub use_history: bool,
}

/// One schedule-modification attempt: reflow a day around a single change
#[derive(Debug, Clone)]
pub struct ChangeRequest {
    pub date: NaiveDate,
    pub change: ChangeDirective,
}

/// What a successful reconciliation actually did
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Titles newly created in the store
    pub created: Vec<String>,
    /// Titles whose times were rewritten
    pub updated: Vec<String>,
    /// Requested titles that already existed and were left alone
    pub already_present: Vec<String>,
    /// Response titles refused because nobody asked for them
    pub discarded: Vec<String>,
    /// Response elements dropped during parsing or overlap validation
    pub dropped: Vec<DroppedEntry>,
}

/// Orchestrates one user's schedule reconciliation against the event store
/// and the completion service. Each flow is a fixed sequence of explicit
/// async steps; nothing is retried, and per-event write failures never roll
/// back earlier writes.
pub struct ReconciliationEngine {
    events: EventStore,
    completion: Arc<dyn CompletionService>,
    history: TaskHistory,
    prompt_config: PromptConfig,
    user_id: String,
}

impl ReconciliationEngine {
    pub fn new(
        events: EventStore,
        completion: Arc<dyn CompletionService>,
        history: TaskHistory,
        prompt_config: PromptConfig,
        user_id: String,
    ) -> Self {
        Self {
            events,
            completion,
            history,
            prompt_config,
            user_id,
        }
    }

    /// Flow A: place new microtasks into a day.
    ///
    /// Fails with `CompletionUnavailable`, `MalformedResponse` or
    /// `EmptySchedule` before anything is written; once applying has begun,
    /// failures surface as `PartialApplyFailure` naming every requested
    /// title that was not realized.
    pub async fn place_tasks(&self, request: PlacementRequest) -> AppResult<ReconcileOutcome> {
        if request.additions.is_empty() {
            return Err(invalid_format("No task additions requested"));
        }

        let user = self.events.get_user(&self.user_id).await?;
        let calendar_id = calendar_id_for(&self.user_id);

        let existing = self
            .events
            .list_events_for_day(&calendar_id, request.date)
            .await?;
        info!(
            "Placing {} task(s) into {} with {} existing event(s)",
            request.additions.len(),
            request.date,
            existing.len()
        );

        let history = if request.use_history {
            self.collect_history(&request.additions).await?
        } else {
            Vec::new()
        };

        let instruction = build_placement_prompt(
            &self.prompt_config,
            request.date,
            &user.wake_time,
            &user.sleep_time,
            &existing,
            &request.additions,
            &history,
        );

        let response = self
            .completion
            .complete(&self.prompt_config.system_prompt, &instruction)
            .await?;

        let parsed = parse_schedule(&response, request.date, self.prompt_config.timezone)?;
        if parsed.entries.is_empty() {
            return Err(Error::EmptySchedule);
        }
        let (entries, overlap_drops) =
            normalize_schedule(parsed.entries, self.prompt_config.strict_overlap_check);

        let mut outcome = ReconcileOutcome {
            dropped: parsed.dropped,
            ..Default::default()
        };
        outcome.dropped.extend(overlap_drops);

        self.apply_placement(&request, &existing, entries, &mut outcome)
            .await;

        // Done only when every requested title was created or already there
        let unrealized: Vec<String> = request
            .additions
            .iter()
            .filter(|title| {
                !outcome.created.contains(title) && !outcome.already_present.contains(title)
            })
            .cloned()
            .collect();

        if !unrealized.is_empty() {
            error!(
                "Placement left {} requested title(s) unrealized: {}",
                unrealized.len(),
                unrealized.join(", ")
            );
            return Err(Error::PartialApplyFailure { failed: unrealized });
        }

        Ok(outcome)
    }

    /// Flow B: a single event was moved or deleted; persist that change and
    /// reflow the day's remaining movable events around it.
    pub async fn apply_change(&self, request: ChangeRequest) -> AppResult<ReconcileOutcome> {
        let user = self.events.get_user(&self.user_id).await?;
        let calendar_id = calendar_id_for(&self.user_id);

        let mut existing = self
            .events
            .list_events_for_day(&calendar_id, request.date)
            .await?;

        // Persist the user's change before prompting. The changed title is
        // pinned (or gone) and is never offered for reflow.
        let changed_title = match &request.change {
            ChangeDirective::Deleted { title } => {
                let removed = self
                    .events
                    .delete_events_by_title(&calendar_id, title)
                    .await?;
                info!("Deleted {} event(s) titled '{}'", removed, title);
                existing.retain(|event| event.title != *title);
                title.clone()
            }
            ChangeDirective::Moved {
                title,
                new_start,
                new_end,
            } => {
                let start = from_local_time(request.date, new_start, self.prompt_config.timezone)?;
                let end = from_local_time(request.date, new_end, self.prompt_config.timezone)?;
                self.events
                    .update_event_time(&calendar_id, title, start, end)
                    .await?;
                for event in existing.iter_mut().filter(|event| event.title == *title) {
                    event.start_time = start;
                    event.end_time = end;
                }
                title.clone()
            }
        };

        let movable: Vec<Event> = existing
            .iter()
            .filter(|event| event.movable && event.title != changed_title)
            .cloned()
            .collect();
        let movable_titles: Vec<String> =
            movable.iter().map(|event| event.title.clone()).collect();
        if movable.is_empty() {
            info!("No movable events left after change to '{}'", changed_title);
            return Ok(ReconcileOutcome::default());
        }
        info!(
            "Reflowing {} movable event(s) after change to '{}'",
            movable.len(),
            changed_title
        );

        let instruction = build_change_prompt(
            &self.prompt_config,
            request.date,
            &user.wake_time,
            &user.sleep_time,
            &existing,
            &request.change,
            &movable_titles,
        );

        let response = self
            .completion
            .complete(&self.prompt_config.system_prompt, &instruction)
            .await?;

        let parsed = parse_schedule(&response, request.date, self.prompt_config.timezone)?;
        if parsed.entries.is_empty() {
            return Err(Error::EmptySchedule);
        }
        let (entries, overlap_drops) =
            normalize_schedule(parsed.entries, self.prompt_config.strict_overlap_check);

        let mut outcome = ReconcileOutcome {
            dropped: parsed.dropped,
            ..Default::default()
        };
        outcome.dropped.extend(overlap_drops);

        let failed = self
            .apply_updates(&calendar_id, &existing, &movable, entries, &mut outcome)
            .await;

        if !failed.is_empty() {
            error!(
                "Reflow failed to update {} event(s): {}",
                failed.len(),
                failed.join(", ")
            );
            return Err(Error::PartialApplyFailure { failed });
        }

        Ok(outcome)
    }

    /// Record how long a task actually took; feeds future placements
    pub async fn record_duration(&self, task_name: &str, minutes: u32) -> AppResult<Vec<u32>> {
        self.history
            .record_duration(&self.user_id, task_name, minutes)
            .await
    }

    async fn collect_history(&self, additions: &[String]) -> AppResult<Vec<TaskHistoryHint>> {
        let mut hints = Vec::new();
        for task_name in additions {
            let recent_durations = self
                .history
                .recent_durations(&self.user_id, task_name)
                .await?;
            if !recent_durations.is_empty() {
                hints.push(TaskHistoryHint {
                    task_name: task_name.clone(),
                    recent_durations,
                });
            }
        }
        Ok(hints)
    }

    /// Applying step of Flow A. Creates only entries that were explicitly
    /// requested and are not already on the day; everything else in the
    /// response is refused. Creations are sequential and independent.
    async fn apply_placement(
        &self,
        request: &PlacementRequest,
        existing: &[Event],
        entries: Vec<ScheduledTask>,
        outcome: &mut ReconcileOutcome,
    ) {
        let calendar_id = calendar_id_for(&self.user_id);
        let existing_titles: HashSet<&str> =
            existing.iter().map(|event| event.title.as_str()).collect();
        let requested: HashSet<&str> = request
            .additions
            .iter()
            .map(|title| title.as_str())
            .collect();

        for entry in entries {
            if !requested.contains(entry.title.as_str()) {
                // The completion service may echo existing events back;
                // anything else is an invention it does not get to keep
                if !existing_titles.contains(entry.title.as_str()) {
                    info!("Discarding unrequested response title '{}'", entry.title);
                    outcome.discarded.push(entry.title);
                }
                continue;
            }

            if existing_titles.contains(entry.title.as_str()) {
                if !outcome.already_present.contains(&entry.title) {
                    outcome.already_present.push(entry.title);
                }
                continue;
            }

            if outcome.created.contains(&entry.title) {
                continue;
            }

            let event = Event {
                id: None,
                calendar_id: calendar_id.clone(),
                title: entry.title.clone(),
                description: entry.description,
                location: None,
                category: MICROTASK_CATEGORY.to_string(),
                start_time: entry.start_time,
                end_time: entry.end_time,
                recurring: entry.recurrence != RecurrenceType::None,
                recurrence_type: entry.recurrence,
                recurrence_count: entry.recurrence_count,
                movable: true,
            };

            match self.events.create_event(event).await {
                Ok(_) => outcome.created.push(entry.title),
                Err(e) => {
                    error!("Failed to create event '{}': {}", entry.title, e);
                }
            }
        }
    }

    /// Applying step of Flow B. Rewrites times only for events in the
    /// movable set, addressing them by store id whenever one is known.
    /// Returns the titles whose updates failed.
    async fn apply_updates(
        &self,
        calendar_id: &str,
        existing: &[Event],
        movable: &[Event],
        entries: Vec<ScheduledTask>,
        outcome: &mut ReconcileOutcome,
    ) -> Vec<String> {
        let mut failed = Vec::new();

        for entry in entries {
            let Some(target) = movable.iter().find(|event| event.title == entry.title) else {
                // Fixed events echoed back are expected; unknown titles are
                // refused outright
                if !existing.iter().any(|event| event.title == entry.title) {
                    info!("Ignoring response entry for unknown title '{}'", entry.title);
                    outcome.discarded.push(entry.title);
                }
                continue;
            };

            if outcome.updated.contains(&entry.title) || failed.contains(&entry.title) {
                continue;
            }

            let result = match target.id.as_deref() {
                Some(id) => {
                    self.events
                        .update_event_time_by_id(id, entry.start_time, entry.end_time)
                        .await
                }
                None => self
                    .events
                    .update_event_time(calendar_id, &entry.title, entry.start_time, entry.end_time)
                    .await
                    .map(|_| ()),
            };

            match result {
                Ok(()) => outcome.updated.push(entry.title),
                Err(e) => {
                    error!("Failed to update event '{}': {}", entry.title, e);
                    failed.push(entry.title);
                }
            }
        }

        failed
    }
}
