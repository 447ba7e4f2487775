use super::models::{user_id_for_calendar, Event, User};
use super::time::day_window;
use crate::components::document_store::{collections, DocumentStoreHandle};
use crate::config::TitleMatch;
use crate::error::{invalid_format, not_found, AppResult};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::{json, Map, Value};
use tracing::warn;
use uuid::Uuid;

/// Fields that title-addressed updates may never touch
const PROTECTED_FIELDS: [&str; 2] = ["id", "calendar_id"];

/// Typed CRUD over the events collection, scoped to one calendar at a time.
///
/// Documents are validated into [`Event`] values immediately after every
/// read; malformed documents are logged and skipped rather than propagated.
#[derive(Clone)]
pub struct EventStore {
    store: DocumentStoreHandle,
    title_match: TitleMatch,
    timezone: Tz,
}

impl EventStore {
    pub fn new(store: DocumentStoreHandle, title_match: TitleMatch, timezone: Tz) -> Self {
        Self {
            store,
            title_match,
            timezone,
        }
    }

    /// Look up the owning user record
    pub async fn get_user(&self, user_id: &str) -> AppResult<User> {
        let doc = self
            .store
            .get(collections::USERS, user_id)
            .await?
            .ok_or_else(|| not_found(&format!("user {}", user_id)))?;
        Ok(serde_json::from_value(doc)?)
    }

    /// Create or replace a user record
    pub async fn put_user(&self, user: &User) -> AppResult<()> {
        self.store
            .put(collections::USERS, &user.id, serde_json::to_value(user)?)
            .await
    }

    /// Persist a new event and return its store-assigned identifier.
    /// Fails with `NotFound` when the owning user record does not exist.
    pub async fn create_event(&self, mut event: Event) -> AppResult<String> {
        let user_id = user_id_for_calendar(&event.calendar_id)
            .ok_or_else(|| invalid_format(&format!("Invalid calendar id: {}", event.calendar_id)))?;
        self.get_user(user_id).await?;

        event.validate()?;

        let id = Uuid::new_v4().to_string();
        event.id = Some(id.clone());
        self.store
            .put(collections::EVENTS, &id, event.to_document()?)
            .await?;

        Ok(id)
    }

    /// Every event in the calendar whose interval intersects the local day
    /// window. Order is unspecified; callers sort.
    pub async fn list_events_for_day(
        &self,
        calendar_id: &str,
        date: NaiveDate,
    ) -> AppResult<Vec<Event>> {
        let (window_start, window_end) = day_window(date, self.timezone)?;

        let docs = self.store.query(collections::EVENTS).await?;
        let mut events = Vec::new();
        for doc in docs {
            let event = match Event::from_document(doc) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Skipping malformed event document: {}", e);
                    continue;
                }
            };
            if event.calendar_id == calendar_id
                && event.start_time < window_end
                && event.end_time > window_start
            {
                events.push(event);
            }
        }

        Ok(events)
    }

    /// Update the time fields of events matching a title. Returns the number
    /// of events updated; zero matches is `NotFound`.
    pub async fn update_event_time(
        &self,
        calendar_id: &str,
        title: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> AppResult<usize> {
        if start_time >= end_time {
            return Err(invalid_format("Start time is not before end time"));
        }

        let matches = self.matching_events(calendar_id, title).await?;
        if matches.is_empty() {
            return Err(not_found(&format!("event '{}'", title)));
        }

        let mut updated = 0;
        for event in self.apply_title_policy(matches) {
            let Some(id) = event.id.as_deref() else {
                warn!("Stored event '{}' has no id; skipping", event.title);
                continue;
            };
            self.write_time_fields(id, start_time, end_time).await?;
            updated += 1;
        }

        Ok(updated)
    }

    /// Id-addressed variant used once an event's identifier is known
    pub async fn update_event_time_by_id(
        &self,
        id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> AppResult<()> {
        if start_time >= end_time {
            return Err(invalid_format("Start time is not before end time"));
        }
        self.write_time_fields(id, start_time, end_time).await
    }

    /// Generic single-field update by title, same matching rule as
    /// [`EventStore::update_event_time`]
    pub async fn update_event_field(
        &self,
        calendar_id: &str,
        title: &str,
        field: &str,
        value: Value,
    ) -> AppResult<usize> {
        if PROTECTED_FIELDS.contains(&field) {
            return Err(invalid_format(&format!("Field '{}' is not editable", field)));
        }

        let matches = self.matching_events(calendar_id, title).await?;
        if matches.is_empty() {
            return Err(not_found(&format!("event '{}'", title)));
        }

        let mut updated = 0;
        for event in self.apply_title_policy(matches) {
            let Some(id) = event.id.as_deref() else {
                warn!("Stored event '{}' has no id; skipping", event.title);
                continue;
            };
            let mut fields = Map::new();
            fields.insert(field.to_string(), value.clone());
            self.store
                .update_fields(collections::EVENTS, id, fields)
                .await?;
            updated += 1;
        }

        Ok(updated)
    }

    /// Delete every event with the given title. Returns the number deleted;
    /// zero is not an error.
    pub async fn delete_events_by_title(
        &self,
        calendar_id: &str,
        title: &str,
    ) -> AppResult<usize> {
        let matches = self.matching_events(calendar_id, title).await?;

        let mut deleted = 0;
        for event in matches {
            let Some(id) = event.id.as_deref() else {
                continue;
            };
            self.store.delete(collections::EVENTS, id).await?;
            deleted += 1;
        }

        Ok(deleted)
    }

    async fn matching_events(&self, calendar_id: &str, title: &str) -> AppResult<Vec<Event>> {
        let docs = self.store.query(collections::EVENTS).await?;
        let mut matches = Vec::new();
        for doc in docs {
            let event = match Event::from_document(doc) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Skipping malformed event document: {}", e);
                    continue;
                }
            };
            // Titles join case-sensitively, by exact match
            if event.calendar_id == calendar_id && event.title == title {
                matches.push(event);
            }
        }
        Ok(matches)
    }

    fn apply_title_policy(&self, mut matches: Vec<Event>) -> Vec<Event> {
        if self.title_match == TitleMatch::FirstMatch && matches.len() > 1 {
            warn!(
                "{} events share the title '{}'; updating the first match only",
                matches.len(),
                matches[0].title
            );
            matches.truncate(1);
        }
        matches
    }

    async fn write_time_fields(
        &self,
        id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut fields = Map::new();
        fields.insert("start_time".to_string(), json!(start_time));
        fields.insert("end_time".to_string(), json!(end_time));
        self.store
            .update_fields(collections::EVENTS, id, fields)
            .await
    }
}
