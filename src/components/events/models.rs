use crate::error::{invalid_format, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category assigned to events that carry none
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Category assigned to engine-created microtask events
pub const MICROTASK_CATEGORY: &str = "Microtask";

/// Derive a user's calendar identifier. Calendars are never addressed any
/// other way.
pub fn calendar_id_for(user_id: &str) -> String {
    format!("{}_calendar", user_id)
}

/// Recover the owning user id from a calendar identifier
pub fn user_id_for_calendar(calendar_id: &str) -> Option<&str> {
    calendar_id.strip_suffix("_calendar")
}

/// How often a recurring event repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RecurrenceType {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "bi-weekly")]
    BiWeekly,
}

impl RecurrenceType {
    /// Parse one of the five allowed literals
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(RecurrenceType::None),
            "daily" => Some(RecurrenceType::Daily),
            "weekly" => Some(RecurrenceType::Weekly),
            "monthly" => Some(RecurrenceType::Monthly),
            "bi-weekly" => Some(RecurrenceType::BiWeekly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::None => "none",
            RecurrenceType::Daily => "daily",
            RecurrenceType::Weekly => "weekly",
            RecurrenceType::Monthly => "monthly",
            RecurrenceType::BiWeekly => "bi-weekly",
        }
    }
}

/// A calendar event, the central entity of the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Store-assigned identifier; absent until persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub calendar_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default)]
    pub recurrence_type: RecurrenceType,
    #[serde(default)]
    pub recurrence_count: u32,
    /// Whether the reconciliation engine may reposition this event
    #[serde(default)]
    pub movable: bool,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl Event {
    /// Validate the event's internal invariants
    pub fn validate(&self) -> AppResult<()> {
        if self.start_time >= self.end_time {
            return Err(invalid_format(&format!(
                "Event '{}' start time is not before its end time",
                self.title
            )));
        }
        if !self.recurring && self.recurrence_type != RecurrenceType::None {
            return Err(invalid_format(&format!(
                "Event '{}' has a recurrence type but is not recurring",
                self.title
            )));
        }
        Ok(())
    }

    /// Deserialize and validate a stored document into a typed event.
    /// Untyped documents never travel past this point.
    pub fn from_document(doc: Value) -> AppResult<Self> {
        let event: Event = serde_json::from_value(doc)?;
        event.validate()?;
        Ok(event)
    }

    /// Serialize the event into a store document
    pub fn to_document(&self) -> AppResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Owning user record; events cannot be created for an unknown user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Start of the schedulable day (HH:MM)
    pub wake_time: String,
    /// End of the schedulable day (HH:MM)
    pub sleep_time: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_event() -> Event {
        Event {
            id: None,
            calendar_id: calendar_id_for("alice"),
            title: "Breakfast".to_string(),
            description: "Morning meal".to_string(),
            location: None,
            category: DEFAULT_CATEGORY.to_string(),
            start_time: Utc.with_ymd_and_hms(2024, 5, 6, 7, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 5, 6, 7, 30, 0).unwrap(),
            recurring: false,
            recurrence_type: RecurrenceType::None,
            recurrence_count: 0,
            movable: false,
        }
    }

    #[test]
    fn test_calendar_id_derivation() {
        assert_eq!(calendar_id_for("alice"), "alice_calendar");
        assert_eq!(user_id_for_calendar("alice_calendar"), Some("alice"));
        assert_eq!(user_id_for_calendar("alice"), None);
    }

    #[test]
    fn test_recurrence_literals() {
        assert_eq!(RecurrenceType::parse("none"), Some(RecurrenceType::None));
        assert_eq!(
            RecurrenceType::parse("bi-weekly"),
            Some(RecurrenceType::BiWeekly)
        );
        assert_eq!(RecurrenceType::parse("biweekly"), None);
        assert_eq!(RecurrenceType::parse("Daily"), None);

        for literal in ["none", "daily", "weekly", "monthly", "bi-weekly"] {
            assert_eq!(RecurrenceType::parse(literal).unwrap().as_str(), literal);
        }
    }

    #[test]
    fn test_event_document_round_trip() {
        let event = sample_event();
        let doc = event.to_document().unwrap();
        let restored = Event::from_document(doc).unwrap();
        assert_eq!(restored.title, event.title);
        assert_eq!(restored.start_time, event.start_time);
        assert_eq!(restored.category, DEFAULT_CATEGORY);
    }

    #[test]
    fn test_event_validation() {
        let mut event = sample_event();
        event.end_time = event.start_time;
        assert!(event.validate().is_err());

        let mut event = sample_event();
        event.recurrence_type = RecurrenceType::Daily;
        assert!(event.validate().is_err());

        event.recurring = true;
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_from_document_defaults() {
        let doc = json!({
            "calendar_id": "alice_calendar",
            "title": "Standup",
            "start_time": "2024-05-06T09:00:00Z",
            "end_time": "2024-05-06T09:15:00Z",
        });
        let event = Event::from_document(doc).unwrap();
        assert_eq!(event.category, DEFAULT_CATEGORY);
        assert_eq!(event.recurrence_type, RecurrenceType::None);
        assert_eq!(event.recurrence_count, 0);
        assert!(!event.movable);
    }
}
