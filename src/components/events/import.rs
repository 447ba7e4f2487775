use super::models::{Event, RecurrenceType, DEFAULT_CATEGORY};
use super::store::EventStore;
use crate::error::{store_error, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

/// One imported calendar entry, already flattened by the source
#[derive(Debug, Clone)]
pub struct ImportedEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_recurring: bool,
}

/// Read-only source of external calendar events
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn fetch_events(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<Vec<ImportedEvent>>;
}

/// Calendar source backed by a hosted JSON event feed
pub struct HttpCalendarSource {
    client: Client,
    feed_url: String,
    token: Option<String>,
}

impl HttpCalendarSource {
    pub fn new(feed_url: String, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            feed_url,
            token,
        }
    }
}

#[async_trait]
impl CalendarSource for HttpCalendarSource {
    async fn fetch_events(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> AppResult<Vec<ImportedEvent>> {
        let mut url = Url::parse(&self.feed_url)
            .map_err(|e| store_error(&format!("Failed to parse feed URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("timeMin", &window_start.to_rfc3339())
            .append_pair("timeMax", &window_end.to_rfc3339())
            .append_pair("singleEvents", "true");

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| store_error(&format!("Failed to fetch calendar feed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(store_error(&format!(
                "Failed to fetch calendar feed: HTTP {} - {}",
                status, error_body
            )));
        }

        let response_data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| store_error(&format!("Failed to parse feed response: {}", e)))?;

        let items = response_data
            .get("items")
            .and_then(|i| i.as_array())
            .ok_or_else(|| store_error("No items in feed response"))?;

        let mut events = Vec::new();
        for item in items {
            let title = item
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or("")
                .to_string();
            if title.is_empty() {
                continue;
            }

            let description = item
                .get("description")
                .and_then(|d| d.as_str())
                .map(|d| d.to_string());
            let location = item
                .get("location")
                .and_then(|l| l.as_str())
                .map(|l| l.to_string());

            let start = item
                .get("start")
                .and_then(|s| s.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            let end = item
                .get("end")
                .and_then(|e| e.as_str())
                .and_then(|e| DateTime::parse_from_rfc3339(e).ok())
                .map(|dt| dt.with_timezone(&Utc));

            let (Some(start), Some(end)) = (start, end) else {
                warn!("Feed entry '{}' has unparseable times; skipping", title);
                continue;
            };

            let is_recurring = item
                .get("isRecurring")
                .and_then(|r| r.as_bool())
                .unwrap_or(false);

            events.push(ImportedEvent {
                title,
                description,
                location,
                start,
                end,
                is_recurring,
            });
        }

        Ok(events)
    }
}

/// One-shot import of a window of external events into a calendar.
/// Imported events are fixed: the reconciliation engine never moves them.
pub async fn import_events(
    store: &EventStore,
    calendar_id: &str,
    source: &dyn CalendarSource,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> AppResult<usize> {
    let fetched = source.fetch_events(window_start, window_end).await?;
    info!("Fetched {} events from calendar source", fetched.len());

    let mut imported = 0;
    for entry in fetched {
        if entry.is_recurring {
            // The source is expected to pre-flatten recurrences
            warn!("Skipping recurring feed entry '{}'", entry.title);
            continue;
        }
        if entry.start >= entry.end {
            warn!("Skipping feed entry '{}' with empty interval", entry.title);
            continue;
        }

        let event = Event {
            id: None,
            calendar_id: calendar_id.to_string(),
            title: entry.title.clone(),
            description: entry.description.unwrap_or_default(),
            location: entry.location,
            category: DEFAULT_CATEGORY.to_string(),
            start_time: entry.start,
            end_time: entry.end,
            recurring: false,
            recurrence_type: RecurrenceType::None,
            recurrence_count: 0,
            movable: false,
        };

        match store.create_event(event).await {
            Ok(_) => imported += 1,
            Err(e) => warn!("Failed to import '{}': {}", entry.title, e),
        }
    }

    info!("Imported {} events into {}", imported, calendar_id);
    Ok(imported)
}
