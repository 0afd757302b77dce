//! End-to-end tests for hard deletion of past slots, single and bulk.

mod common;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use uuid::Uuid;

use academeet_core::ports::DatabaseService;
use academeet_core::projection::ChangeOp;

use api_lib::web::slots::{cleanup_slots_handler, delete_slot_handler, CleanupRequest};
use api_lib::web::windows::{create_window_handler, WindowRequest};

use common::{body_json, future_date, hm, professor, rejection, student, test_state, MemoryStore};

async fn seed_slots(
    state: &std::sync::Arc<api_lib::web::state::AppState>,
    store: &MemoryStore,
    prof: academeet_core::domain::Caller,
) -> Vec<Uuid> {
    create_window_handler(
        State(state.clone()),
        Extension(prof),
        Json(WindowRequest {
            date: future_date(),
            start_time: hm(9, 0),
            end_time: hm(10, 0),
            slot_minutes: 20,
            topic: "Office hours".to_string(),
        }),
    )
    .await
    .expect("create window");

    let window = store.list_windows(prof.user_id).await.unwrap().remove(0);
    store
        .list_slots_for_window(window.id)
        .await
        .unwrap()
        .iter()
        .map(|s| s.id)
        .collect()
}

/// Rewrites a slot so it ended `hours_ago` hours before now.
async fn age_slot(store: &MemoryStore, slot_id: Uuid, hours_ago: i64) {
    let mut slot = store.slot(slot_id).await.unwrap();
    slot.end_time = Utc::now() - Duration::hours(hours_ago);
    slot.start_time = slot.end_time - Duration::minutes(20);
    store.put_slot(slot).await;
}

#[tokio::test]
async fn deleting_a_past_slot_succeeds_and_publishes_a_delete() {
    let (state, store) = test_state();
    let prof = professor(&store).await;
    let slot_ids = seed_slots(&state, &store, prof).await;
    age_slot(&store, slot_ids[0], 2).await;

    let mut events = state.slot_events.subscribe();
    let result = delete_slot_handler(State(state.clone()), Extension(prof), Path(slot_ids[0]))
        .await
        .expect("delete succeeds");
    assert_eq!(result.into_response().status(), StatusCode::NO_CONTENT);
    assert!(store.slot(slot_ids[0]).await.is_none());

    let event = events.try_recv().expect("delete event");
    assert_eq!(event.op, ChangeOp::Delete);
    assert_eq!(event.slot.id, slot_ids[0]);
}

#[tokio::test]
async fn active_slots_cannot_be_deleted() {
    let (state, store) = test_state();
    let prof = professor(&store).await;
    let slot_ids = seed_slots(&state, &store, prof).await;

    let result =
        delete_slot_handler(State(state.clone()), Extension(prof), Path(slot_ids[0])).await;
    let (status, message) = rejection(result);
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(message.contains("not ended"));
    assert!(store.slot(slot_ids[0]).await.is_some());
}

#[tokio::test]
async fn only_the_owner_may_delete_and_students_never_can() {
    let (state, store) = test_state();
    let prof = professor(&store).await;
    let other =
        common::register(&store, academeet_core::domain::Role::Professor, "Prof Two").await;
    let stu = student(&store).await;
    let slot_ids = seed_slots(&state, &store, prof).await;
    age_slot(&store, slot_ids[0], 2).await;

    let result =
        delete_slot_handler(State(state.clone()), Extension(other), Path(slot_ids[0])).await;
    assert_eq!(rejection(result).0, StatusCode::FORBIDDEN);

    let result =
        delete_slot_handler(State(state.clone()), Extension(stu), Path(slot_ids[0])).await;
    assert_eq!(rejection(result).0, StatusCode::FORBIDDEN);

    assert!(store.slot(slot_ids[0]).await.is_some());
}

#[tokio::test]
async fn deleting_a_missing_slot_is_a_404() {
    let (state, store) = test_state();
    let prof = professor(&store).await;

    let result =
        delete_slot_handler(State(state.clone()), Extension(prof), Path(Uuid::new_v4())).await;
    assert_eq!(rejection(result).0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bulk_cleanup_deletes_only_the_matching_subset() {
    let (state, store) = test_state();
    let prof = professor(&store).await;
    let slot_ids = seed_slots(&state, &store, prof).await;

    // Two of three slots have ended; the third is still upcoming.
    age_slot(&store, slot_ids[0], 3).await;
    age_slot(&store, slot_ids[1], 1).await;

    let result = cleanup_slots_handler(
        State(state.clone()),
        Extension(prof),
        Json(CleanupRequest {
            slot_ids: slot_ids.clone(),
        }),
    )
    .await
    .expect("cleanup succeeds");
    let body: serde_json::Value = body_json(result.into_response()).await;
    assert_eq!(body["deleted"], 2);

    assert!(store.slot(slot_ids[0]).await.is_none());
    assert!(store.slot(slot_ids[1]).await.is_none());
    assert!(store.slot(slot_ids[2]).await.is_some());
}
