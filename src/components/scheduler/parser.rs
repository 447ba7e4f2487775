use crate::components::events::models::RecurrenceType;
use crate::components::events::time::from_local_time;
use crate::error::{AppResult, Error};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Wire format of one completion-response element
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct RawScheduleEntry {
    pub task_name: String,
    pub task_desc: String,
    pub rec_freq: String,
    pub rec_num: i64,
    pub start_time: String,
    pub end_time: String,
}

/// A validated response entry, stamped onto the target day
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub title: String,
    pub description: String,
    pub recurrence: RecurrenceType,
    pub recurrence_count: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Diagnostic for an element the parser or validator refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedEntry {
    pub index: usize,
    pub reason: String,
}

/// Result of parsing one completion response
#[derive(Debug, Default)]
pub struct ParsedSchedule {
    pub entries: Vec<ScheduledTask>,
    pub dropped: Vec<DroppedEntry>,
}

/// Locate the JSON array inside a free-form completion response: everything
/// from the first `[` to the last `]`.
pub fn extract_json_array(response: &str) -> AppResult<&str> {
    let start = response
        .find('[')
        .ok_or_else(|| Error::MalformedResponse("no opening bracket in response".to_string()))?;
    let end = response
        .rfind(']')
        .ok_or_else(|| Error::MalformedResponse("no closing bracket in response".to_string()))?;
    if start >= end {
        return Err(Error::MalformedResponse(
            "brackets out of order in response".to_string(),
        ));
    }
    Ok(&response[start..=end])
}

/// Parse a completion response into normalized schedule entries for the
/// given day. Invalid elements are dropped and recorded; they never abort
/// the batch. Parsing is deterministic: the same text always yields the same
/// entries.
pub fn parse_schedule(response: &str, date: NaiveDate, timezone: Tz) -> AppResult<ParsedSchedule> {
    let json_str = extract_json_array(response)?;

    let elements: Vec<Value> = serde_json::from_str(json_str)
        .map_err(|e| Error::MalformedResponse(format!("response is not a JSON array: {}", e)))?;

    let mut parsed = ParsedSchedule::default();
    for (index, element) in elements.iter().enumerate() {
        match validate_element(element, date, timezone) {
            Ok(task) => parsed.entries.push(task),
            Err(reason) => {
                warn!("Dropping schedule entry {}: {}", index, reason);
                parsed.dropped.push(DroppedEntry { index, reason });
            }
        }
    }

    Ok(parsed)
}

fn validate_element(element: &Value, date: NaiveDate, timezone: Tz) -> Result<ScheduledTask, String> {
    let raw: RawScheduleEntry = serde_json::from_value(element.clone())
        .map_err(|e| format!("missing or mistyped field: {}", e))?;

    let recurrence = RecurrenceType::parse(&raw.rec_freq)
        .ok_or_else(|| format!("unknown rec_freq literal: {}", raw.rec_freq))?;

    if raw.rec_num < 0 {
        return Err(format!("negative rec_num: {}", raw.rec_num));
    }

    let start_time = from_local_time(date, &raw.start_time, timezone)
        .map_err(|e| format!("invalid start_time '{}': {}", raw.start_time, e))?;
    let end_time = from_local_time(date, &raw.end_time, timezone)
        .map_err(|e| format!("invalid end_time '{}': {}", raw.end_time, e))?;

    if start_time >= end_time {
        return Err(format!(
            "start_time {} is not before end_time {}",
            raw.start_time, raw.end_time
        ));
    }

    Ok(ScheduledTask {
        title: raw.task_name,
        description: raw.task_desc,
        recurrence,
        recurrence_count: raw.rec_num as u32,
        start_time,
        end_time,
    })
}

/// Post-parse hardening: order entries chronologically and, when strict,
/// drop any entry overlapping an already-accepted one. The completion
/// service is instructed to return a conflict-free ordering, but its word is
/// not taken for it.
pub fn normalize_schedule(
    mut entries: Vec<ScheduledTask>,
    strict_overlap_check: bool,
) -> (Vec<ScheduledTask>, Vec<DroppedEntry>) {
    entries.sort_by_key(|entry| (entry.start_time, entry.end_time));

    if !strict_overlap_check {
        return (entries, Vec::new());
    }

    let mut accepted: Vec<ScheduledTask> = Vec::with_capacity(entries.len());
    let mut dropped = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        if let Some(previous) = accepted.last() {
            if entry.start_time < previous.end_time {
                dropped.push(DroppedEntry {
                    index,
                    reason: format!(
                        "'{}' overlaps preceding entry '{}'",
                        entry.title, previous.title
                    ),
                });
                continue;
            }
        }
        accepted.push(entry);
    }

    (accepted, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc() -> Tz {
        "UTC".parse().unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
    }

    const VALID_RESPONSE: &str = r#"Here is your schedule:
[
  {"task_name": "Breakfast", "task_desc": "Morning meal", "rec_freq": "daily", "rec_num": 5, "start_time": "07:00", "end_time": "07:30"},
  {"task_name": "Laundry", "task_desc": "Wash clothes", "rec_freq": "none", "rec_num": 0, "start_time": "07:30", "end_time": "08:00"}
]
Let me know if you need anything else."#;

    #[test]
    fn test_extract_json_array() {
        assert_eq!(extract_json_array("[1, 2]").unwrap(), "[1, 2]");
        assert_eq!(extract_json_array("noise [1] noise").unwrap(), "[1]");
        assert!(extract_json_array("no array here").is_err());
        assert!(extract_json_array("only open [").is_err());
        assert!(extract_json_array("] backwards [").is_err());
    }

    #[test]
    fn test_parse_valid_response() {
        let parsed = parse_schedule(VALID_RESPONSE, date(), utc()).unwrap();
        assert_eq!(parsed.entries.len(), 2);
        assert!(parsed.dropped.is_empty());

        let laundry = &parsed.entries[1];
        assert_eq!(laundry.title, "Laundry");
        assert_eq!(laundry.recurrence, RecurrenceType::None);
        assert_eq!(
            laundry.start_time.format("%Y-%m-%d %H:%M").to_string(),
            "2024-05-06 07:30"
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = parse_schedule(VALID_RESPONSE, date(), utc()).unwrap();
        let second = parse_schedule(VALID_RESPONSE, date(), utc()).unwrap();

        assert_eq!(first.entries.len(), second.entries.len());
        for (a, b) in first.entries.iter().zip(second.entries.iter()) {
            assert_eq!(a.title, b.title);
            assert_eq!(a.start_time, b.start_time);
            assert_eq!(a.end_time, b.end_time);
        }
    }

    #[test]
    fn test_invalid_elements_dropped_not_fatal() {
        let response = r#"[
          {"task_name": "Good", "task_desc": "ok", "rec_freq": "none", "rec_num": 0, "start_time": "08:00", "end_time": "08:30"},
          {"task_name": "NoDesc", "rec_freq": "none", "rec_num": 0, "start_time": "09:00", "end_time": "09:30"},
          {"task_name": "BadFreq", "task_desc": "x", "rec_freq": "hourly", "rec_num": 0, "start_time": "10:00", "end_time": "10:30"},
          {"task_name": "BadTime", "task_desc": "x", "rec_freq": "none", "rec_num": 0, "start_time": "25:00", "end_time": "26:00"},
          {"task_name": "Inverted", "task_desc": "x", "rec_freq": "none", "rec_num": 0, "start_time": "11:00", "end_time": "10:00"}
        ]"#;

        let parsed = parse_schedule(response, date(), utc()).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].title, "Good");
        assert_eq!(parsed.dropped.len(), 4);
        assert_eq!(
            parsed.dropped.iter().map(|d| d.index).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_malformed_response_is_fatal() {
        assert!(matches!(
            parse_schedule("I could not produce a schedule.", date(), utc()),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_schedule("[{broken json]", date(), utc()),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_normalize_sorts_and_drops_overlaps() {
        let response = r#"[
          {"task_name": "Second", "task_desc": "x", "rec_freq": "none", "rec_num": 0, "start_time": "09:00", "end_time": "10:00"},
          {"task_name": "First", "task_desc": "x", "rec_freq": "none", "rec_num": 0, "start_time": "08:00", "end_time": "09:00"},
          {"task_name": "Clash", "task_desc": "x", "rec_freq": "none", "rec_num": 0, "start_time": "09:30", "end_time": "10:30"}
        ]"#;
        let parsed = parse_schedule(response, date(), utc()).unwrap();

        let (entries, dropped) = normalize_schedule(parsed.entries, true);
        let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
        assert_eq!(dropped.len(), 1);
        assert!(dropped[0].reason.contains("Clash"));

        // Back-to-back intervals are not overlaps
        let response = r#"[
          {"task_name": "A", "task_desc": "x", "rec_freq": "none", "rec_num": 0, "start_time": "08:00", "end_time": "09:00"},
          {"task_name": "B", "task_desc": "x", "rec_freq": "none", "rec_num": 0, "start_time": "09:00", "end_time": "10:00"}
        ]"#;
        let parsed = parse_schedule(response, date(), utc()).unwrap();
        let (entries, dropped) = normalize_schedule(parsed.entries, true);
        assert_eq!(entries.len(), 2);
        assert!(dropped.is_empty());
    }
}
