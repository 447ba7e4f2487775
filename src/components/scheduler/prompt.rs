use crate::components::events::models::Event;
use crate::components::events::time::to_local_display;
use chrono::NaiveDate;
use chrono_tz::Tz;

/// Default system prompt for the completion service
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a personal day-schedule planner. You receive a user's existing calendar events for one day and a scheduling request. You respond with the day's schedule as a JSON array, one object per event.";

/// Strict output contract appended to every instruction. The parser depends
/// on this shape; keep the two in sync.
const OUTPUT_CONTRACT: &str = "Respond with a JSON array only. Each array element must be an object with exactly these keys: \"task_name\", \"task_desc\", \"rec_freq\", \"rec_num\", \"start_time\", \"end_time\". \"rec_freq\" must be one of: none, daily, weekly, monthly, bi-weekly. \"rec_num\" must be a non-negative integer. \"start_time\" and \"end_time\" must be zero-padded 24-hour HH:MM times with start_time before end_time. List the events in chronological order with no overlapping intervals. Do not invent events that were not listed or requested, and include every requested addition. Do not include any introductory text, explanations, or any other text outside the JSON array in your response. The response must start with `[` and end with `]`.";

/// Explicit configuration for prompt building; there is no hidden state and
/// no randomness, so identical inputs always produce identical instructions.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub timezone: Tz,
    pub strict_overlap_check: bool,
}

impl PromptConfig {
    pub fn new(timezone: Tz) -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timezone,
            strict_overlap_check: true,
        }
    }
}

/// Duration history fed into a placement prompt for one task
#[derive(Debug, Clone)]
pub struct TaskHistoryHint {
    pub task_name: String,
    /// Most recent observed durations in minutes, oldest first
    pub recent_durations: Vec<u32>,
}

/// A single-event change to reflow the day around
#[derive(Debug, Clone)]
pub enum ChangeDirective {
    Moved {
        title: String,
        new_start: String,
        new_end: String,
    },
    Deleted {
        title: String,
    },
}

/// Serialize one event per line in stable field order: title, description,
/// recurrence frequency, recurrence count, start, end.
fn serialize_events(config: &PromptConfig, events: &[Event]) -> String {
    if events.is_empty() {
        return "(no events)".to_string();
    }

    events
        .iter()
        .map(|event| {
            format!(
                "- title: {} | description: {} | recurrence: {} | recurrence_count: {} | start: {} | end: {}",
                event.title,
                event.description,
                event.recurrence_type.as_str(),
                event.recurrence_count,
                to_local_display(event.start_time, config.timezone),
                to_local_display(event.end_time, config.timezone),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn day_header(date: NaiveDate, wake_time: &str, sleep_time: &str, existing: &str) -> String {
    format!(
        "The date is {}. The user's day runs from {} to {}; schedule nothing outside these bounds.\n\nExisting events for the day:\n{}",
        date.format("%Y-%m-%d"),
        wake_time,
        sleep_time,
        existing,
    )
}

/// Instruction for Flow A: place the requested tasks into the day
pub fn build_placement_prompt(
    config: &PromptConfig,
    date: NaiveDate,
    wake_time: &str,
    sleep_time: &str,
    existing: &[Event],
    additions: &[String],
    history: &[TaskHistoryHint],
) -> String {
    let mut prompt = day_header(
        date,
        wake_time,
        sleep_time,
        &serialize_events(config, existing),
    );

    prompt.push_str(&format!(
        "\n\nAdd the following tasks to the day without moving or removing the existing events: {}.",
        additions.join(", ")
    ));
    prompt.push_str(" Give each added task a short description of at most 10 words.");

    let hints: Vec<String> = history
        .iter()
        .filter(|hint| !hint.recent_durations.is_empty())
        .map(|hint| {
            let durations: Vec<String> = hint
                .recent_durations
                .iter()
                .map(|minutes| format!("{} min", minutes))
                .collect();
            format!("- {}: {}", hint.task_name, durations.join(", "))
        })
        .collect();

    if !hints.is_empty() {
        prompt.push_str(&format!(
            "\n\nRecent durations for these tasks, oldest first; size each task's slot accordingly:\n{}",
            hints.join("\n")
        ));
    }

    prompt.push_str("\n\n");
    prompt.push_str(OUTPUT_CONTRACT);
    prompt
}

/// Instruction for Flow B: reflow movable events around a single change
pub fn build_change_prompt(
    config: &PromptConfig,
    date: NaiveDate,
    wake_time: &str,
    sleep_time: &str,
    existing: &[Event],
    change: &ChangeDirective,
    movable_titles: &[String],
) -> String {
    let mut prompt = day_header(
        date,
        wake_time,
        sleep_time,
        &serialize_events(config, existing),
    );

    match change {
        ChangeDirective::Moved {
            title,
            new_start,
            new_end,
        } => {
            prompt.push_str(&format!(
                "\n\nThe event \"{}\" has been moved to {} - {}.",
                title, new_start, new_end
            ));
        }
        ChangeDirective::Deleted { title } => {
            prompt.push_str(&format!(
                "\n\nThe event \"{}\" has been deleted from the day.",
                title
            ));
        }
    }

    if movable_titles.is_empty() {
        prompt.push_str("\n\nThere are no repositionable events; return the day's schedule unchanged apart from the stated change.");
    } else {
        prompt.push_str(&format!(
            "\n\nRearrange the day so nothing overlaps. You may only change the times of these events: {}. Every other event is fixed and must keep its listed times.",
            movable_titles.join(", ")
        ));
    }

    prompt.push_str("\n\n");
    prompt.push_str(OUTPUT_CONTRACT);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::events::models::{calendar_id_for, RecurrenceType};
    use chrono::{TimeZone, Utc};

    fn config() -> PromptConfig {
        PromptConfig::new("UTC".parse().unwrap())
    }

    fn breakfast() -> Event {
        Event {
            id: Some("e1".to_string()),
            calendar_id: calendar_id_for("alice"),
            title: "Breakfast".to_string(),
            description: "Morning meal".to_string(),
            location: None,
            category: "Uncategorized".to_string(),
            start_time: Utc.with_ymd_and_hms(2024, 5, 6, 7, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 5, 6, 7, 30, 0).unwrap(),
            recurring: true,
            recurrence_type: RecurrenceType::Daily,
            recurrence_count: 5,
            movable: false,
        }
    }

    #[test]
    fn test_placement_prompt_is_deterministic() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let existing = vec![breakfast()];
        let additions = vec!["Laundry".to_string()];

        let first =
            build_placement_prompt(&config(), date, "07:00", "23:00", &existing, &additions, &[]);
        let second =
            build_placement_prompt(&config(), date, "07:00", "23:00", &existing, &additions, &[]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_placement_prompt_contents() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let existing = vec![breakfast()];
        let additions = vec!["Laundry".to_string(), "Trash".to_string()];
        let history = vec![TaskHistoryHint {
            task_name: "Laundry".to_string(),
            recent_durations: vec![25, 30, 35],
        }];

        let prompt = build_placement_prompt(
            &config(),
            date,
            "07:00",
            "23:00",
            &existing,
            &additions,
            &history,
        );

        assert!(prompt.contains("2024-05-06"));
        assert!(prompt.contains("07:00 to 23:00") || prompt.contains("from 07:00"));
        assert!(prompt.contains(
            "- title: Breakfast | description: Morning meal | recurrence: daily | recurrence_count: 5 | start: 07:00 | end: 07:30"
        ));
        assert!(prompt.contains("Laundry, Trash"));
        assert!(prompt.contains("- Laundry: 25 min, 30 min, 35 min"));
        assert!(prompt.contains("must start with `[` and end with `]`"));
    }

    #[test]
    fn test_change_prompt_restricts_movable_titles() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let existing = vec![breakfast()];
        let movable = vec!["Trash".to_string()];
        let change = ChangeDirective::Deleted {
            title: "Laundry".to_string(),
        };

        let prompt =
            build_change_prompt(&config(), date, "07:00", "23:00", &existing, &change, &movable);

        assert!(prompt.contains("\"Laundry\" has been deleted"));
        assert!(prompt.contains("only change the times of these events: Trash"));
    }

    #[test]
    fn test_change_prompt_move_directive() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let change = ChangeDirective::Moved {
            title: "Laundry".to_string(),
            new_start: "09:00".to_string(),
            new_end: "09:30".to_string(),
        };

        let prompt = build_change_prompt(&config(), date, "07:00", "23:00", &[], &change, &[]);

        assert!(prompt.contains("\"Laundry\" has been moved to 09:00 - 09:30"));
        assert!(prompt.contains("no repositionable events"));
    }
}
