use chrono::NaiveDate;
use microplan::components::document_store::{DocumentStoreActor, MemoryBackend};
use microplan::components::events::models::{calendar_id_for, Event, RecurrenceType, User};
use microplan::components::events::store::EventStore;
use microplan::components::events::time::from_local_time;
use microplan::config::TitleMatch;
use serde_json::json;

fn utc() -> chrono_tz::Tz {
    "UTC".parse().unwrap()
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
}

fn event(title: &str, start: &str, end: &str, movable: bool) -> Event {
    Event {
        id: None,
        calendar_id: calendar_id_for("alice"),
        title: title.to_string(),
        description: String::new(),
        location: None,
        category: "Uncategorized".to_string(),
        start_time: from_local_time(date(), start, utc()).unwrap(),
        end_time: from_local_time(date(), end, utc()).unwrap(),
        recurring: false,
        recurrence_type: RecurrenceType::None,
        recurrence_count: 0,
        movable,
    }
}

async fn store_with_user(title_match: TitleMatch) -> EventStore {
    let handle = DocumentStoreActor::spawn(Box::new(MemoryBackend::new()));
    let store = EventStore::new(handle, title_match, utc());
    store
        .put_user(&User {
            id: "alice".to_string(),
            name: "Alice".to_string(),
            wake_time: "07:00".to_string(),
            sleep_time: "23:00".to_string(),
        })
        .await
        .unwrap();
    store
}

/// Basic round trip through the document store actor
#[tokio::test]
async fn test_document_store_actor_round_trip() {
    let handle = DocumentStoreActor::spawn(Box::new(MemoryBackend::new()));

    handle
        .put("events", "e1", json!({"id": "e1", "title": "Breakfast"}))
        .await
        .unwrap();

    let doc = handle.get("events", "e1").await.unwrap().unwrap();
    assert_eq!(doc["title"], "Breakfast");

    let mut fields = serde_json::Map::new();
    fields.insert("title".to_string(), json!("Brunch"));
    handle.update_fields("events", "e1", fields).await.unwrap();

    let all = handle.query("events").await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0]["title"], "Brunch");

    handle.delete("events", "e1").await.unwrap();
    assert!(handle.get("events", "e1").await.unwrap().is_none());

    handle.shutdown().await.unwrap();
}

/// Event creation requires a resolvable owning user
#[tokio::test]
async fn test_create_event_requires_user() {
    let handle = DocumentStoreActor::spawn(Box::new(MemoryBackend::new()));
    let store = EventStore::new(handle, TitleMatch::FirstMatch, utc());

    let result = store.create_event(event("Breakfast", "07:00", "07:30", false)).await;
    assert!(matches!(
        result,
        Err(microplan::error::Error::NotFound(_))
    ));
}

/// List-by-day returns only events intersecting the day window
#[tokio::test]
async fn test_list_events_for_day() {
    let store = store_with_user(TitleMatch::FirstMatch).await;

    store
        .create_event(event("Breakfast", "07:00", "07:30", false))
        .await
        .unwrap();

    let mut other_day = event("Dentist", "10:00", "11:00", false);
    let next = date().succ_opt().unwrap();
    other_day.start_time = from_local_time(next, "10:00", utc()).unwrap();
    other_day.end_time = from_local_time(next, "11:00", utc()).unwrap();
    store.create_event(other_day).await.unwrap();

    let events = store
        .list_events_for_day(&calendar_id_for("alice"), date())
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "Breakfast");
    assert!(events[0].id.is_some());
}

/// Duplicate titles: first-match updates one event, all-matches updates all
#[tokio::test]
async fn test_title_match_policies() {
    for (policy, expected) in [(TitleMatch::FirstMatch, 1), (TitleMatch::AllMatches, 2)] {
        let store = store_with_user(policy).await;
        store
            .create_event(event("Laundry", "08:00", "08:30", true))
            .await
            .unwrap();
        store
            .create_event(event("Laundry", "18:00", "18:30", true))
            .await
            .unwrap();

        let updated = store
            .update_event_time(
                &calendar_id_for("alice"),
                "Laundry",
                from_local_time(date(), "09:00", utc()).unwrap(),
                from_local_time(date(), "09:30", utc()).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(updated, expected);
    }
}

/// Zero matches is NotFound for updates but a plain zero for deletes
#[tokio::test]
async fn test_missing_title_semantics() {
    let store = store_with_user(TitleMatch::FirstMatch).await;

    let result = store
        .update_event_time(
            &calendar_id_for("alice"),
            "Ghost",
            from_local_time(date(), "09:00", utc()).unwrap(),
            from_local_time(date(), "09:30", utc()).unwrap(),
        )
        .await;
    assert!(matches!(
        result,
        Err(microplan::error::Error::NotFound(_))
    ));

    let deleted = store
        .delete_events_by_title(&calendar_id_for("alice"), "Ghost")
        .await
        .unwrap();
    assert_eq!(deleted, 0);
}

/// Generic field updates refuse the identity fields
#[tokio::test]
async fn test_update_event_field() {
    let store = store_with_user(TitleMatch::FirstMatch).await;
    store
        .create_event(event("Laundry", "08:00", "08:30", true))
        .await
        .unwrap();

    let updated = store
        .update_event_field(
            &calendar_id_for("alice"),
            "Laundry",
            "description",
            json!("Wash and fold"),
        )
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let events = store
        .list_events_for_day(&calendar_id_for("alice"), date())
        .await
        .unwrap();
    assert_eq!(events[0].description, "Wash and fold");

    let result = store
        .update_event_field(
            &calendar_id_for("alice"),
            "Laundry",
            "calendar_id",
            json!("bob_calendar"),
        )
        .await;
    assert!(matches!(
        result,
        Err(microplan::error::Error::InvalidFormat(_))
    ));
}

/// Title deletion removes every match
#[tokio::test]
async fn test_delete_events_by_title() {
    let store = store_with_user(TitleMatch::FirstMatch).await;
    store
        .create_event(event("Laundry", "08:00", "08:30", true))
        .await
        .unwrap();
    store
        .create_event(event("Laundry", "18:00", "18:30", true))
        .await
        .unwrap();

    let deleted = store
        .delete_events_by_title(&calendar_id_for("alice"), "Laundry")
        .await
        .unwrap();
    assert_eq!(deleted, 2);

    let events = store
        .list_events_for_day(&calendar_id_for("alice"), date())
        .await
        .unwrap();
    assert!(events.is_empty());
}
