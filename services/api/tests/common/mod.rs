//! Shared test fixtures: an in-memory implementation of the storage port
//! that mirrors the SQL predicates of the real adapter, plus helpers for
//! building application state and reading handler responses.
//!
//! Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use academeet_core::domain::{
    Caller, ConsultationWindow, NewUser, NewWindow, Role, Slot, SlotInterval, SlotOffer,
    SlotStatus, User, UserCredentials,
};
use academeet_core::ports::{DatabaseService, PortError, PortResult};
use async_trait::async_trait;
use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use uuid::Uuid;

use api_lib::config::Config;
use api_lib::web::state::AppState;

//=========================================================================================
// In-Memory Store
//=========================================================================================

struct StoredUser {
    user: User,
    hashed_password: String,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, StoredUser>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    windows: HashMap<Uuid, ConsultationWindow>,
    slots: HashMap<Uuid, Slot>,
}

/// An in-memory `DatabaseService`. Every conditional mutation holds the one
/// lock across its read-check-write, matching the atomicity the Postgres
/// adapter gets from predicated single statements and transactions.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct snapshot of a slot row, for asserting that rejected mutations
    /// changed nothing.
    pub async fn slot(&self, slot_id: Uuid) -> Option<Slot> {
        self.inner.lock().await.slots.get(&slot_id).cloned()
    }

    pub async fn window(&self, window_id: Uuid) -> Option<ConsultationWindow> {
        self.inner.lock().await.windows.get(&window_id).cloned()
    }

    pub async fn window_count(&self) -> usize {
        self.inner.lock().await.windows.len()
    }

    pub async fn slot_count(&self) -> usize {
        self.inner.lock().await.slots.len()
    }

    /// Overwrites one slot row, for arranging states (e.g. a slot in the
    /// past) that the public operations refuse to produce.
    pub async fn put_slot(&self, slot: Slot) {
        self.inner.lock().await.slots.insert(slot.id, slot);
    }
}

fn offer(inner: &Inner, slot: &Slot) -> SlotOffer {
    let topic = inner
        .windows
        .get(&slot.window_id)
        .map(|w| w.topic.clone())
        .unwrap_or_default();
    let professor_name = inner
        .users
        .get(&slot.professor_id)
        .map(|u| u.user.full_name.clone())
        .unwrap_or_default();
    SlotOffer {
        slot: slot.clone(),
        topic,
        professor_name,
    }
}

fn sorted_by_start(mut slots: Vec<Slot>) -> Vec<Slot> {
    slots.sort_by_key(|s| (s.start_time, s.id));
    slots
}

#[async_trait]
impl DatabaseService for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let mut inner = self.inner.lock().await;
        let duplicate = inner.users.values().any(|stored| {
            stored.user.email == new_user.email || stored.user.id_number == new_user.id_number
        });
        if duplicate {
            return Err(PortError::AlreadyExists(
                "email or ID number already registered".to_string(),
            ));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            full_name: new_user.full_name,
            role: new_user.role,
            id_number: new_user.id_number,
            created_at: Utc::now(),
        };
        inner.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                hashed_password: new_user.hashed_password,
            },
        );
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        self.inner
            .lock()
            .await
            .users
            .get(&user_id)
            .map(|s| s.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let inner = self.inner.lock().await;
        inner
            .users
            .values()
            .find(|s| s.user.email == email)
            .map(|s| UserCredentials {
                id: s.user.id,
                email: s.user.email.clone(),
                full_name: s.user.full_name.clone(),
                role: s.user.role,
                hashed_password: s.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound("unknown email".to_string()))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.inner
            .lock()
            .await
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<User> {
        let inner = self.inner.lock().await;
        let (user_id, expires_at) = inner
            .sessions
            .get(session_id)
            .ok_or(PortError::Unauthorized)?;
        if *expires_at <= Utc::now() {
            return Err(PortError::Unauthorized);
        }
        inner
            .users
            .get(user_id)
            .map(|s| s.user.clone())
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.inner.lock().await.sessions.remove(session_id);
        Ok(())
    }

    async fn create_window(
        &self,
        window: NewWindow,
        slots: &[SlotInterval],
    ) -> PortResult<(ConsultationWindow, Vec<Slot>)> {
        let mut inner = self.inner.lock().await;
        let created = ConsultationWindow {
            id: Uuid::new_v4(),
            professor_id: window.professor_id,
            date: window.date,
            start_time: window.start_time,
            end_time: window.end_time,
            slot_minutes: window.slot_minutes,
            topic: window.topic,
            created_at: Utc::now(),
        };
        let rows: Vec<Slot> = slots
            .iter()
            .map(|interval| Slot {
                id: Uuid::new_v4(),
                window_id: created.id,
                professor_id: created.professor_id,
                student_id: None,
                start_time: interval.start,
                end_time: interval.end,
                status: SlotStatus::Open,
                agenda: None,
                created_at: Utc::now(),
            })
            .collect();
        inner.windows.insert(created.id, created.clone());
        for row in &rows {
            inner.slots.insert(row.id, row.clone());
        }
        Ok((created, rows))
    }

    async fn get_window(&self, window_id: Uuid) -> PortResult<ConsultationWindow> {
        self.inner
            .lock()
            .await
            .windows
            .get(&window_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Window {} not found", window_id)))
    }

    async fn list_windows(&self, professor_id: Uuid) -> PortResult<Vec<ConsultationWindow>> {
        let inner = self.inner.lock().await;
        let mut windows: Vec<ConsultationWindow> = inner
            .windows
            .values()
            .filter(|w| w.professor_id == professor_id)
            .cloned()
            .collect();
        windows.sort_by(|a, b| (b.date, b.start_time).cmp(&(a.date, a.start_time)));
        Ok(windows)
    }

    async fn replace_window(
        &self,
        window_id: Uuid,
        window: NewWindow,
        slots: &[SlotInterval],
    ) -> PortResult<(ConsultationWindow, Vec<Slot>)> {
        let mut inner = self.inner.lock().await;
        let booked = inner
            .slots
            .values()
            .any(|s| s.window_id == window_id && s.status == SlotStatus::Booked);
        if booked {
            return Err(PortError::WindowHasBookings);
        }
        let existing = inner
            .windows
            .get(&window_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Window {} not found", window_id)))?;

        inner.slots.retain(|_, s| s.window_id != window_id);
        let replaced = ConsultationWindow {
            date: window.date,
            start_time: window.start_time,
            end_time: window.end_time,
            slot_minutes: window.slot_minutes,
            topic: window.topic,
            ..existing
        };
        let rows: Vec<Slot> = slots
            .iter()
            .map(|interval| Slot {
                id: Uuid::new_v4(),
                window_id,
                professor_id: replaced.professor_id,
                student_id: None,
                start_time: interval.start,
                end_time: interval.end,
                status: SlotStatus::Open,
                agenda: None,
                created_at: Utc::now(),
            })
            .collect();
        inner.windows.insert(window_id, replaced.clone());
        for row in &rows {
            inner.slots.insert(row.id, row.clone());
        }
        Ok((replaced, rows))
    }

    async fn delete_window(&self, window_id: Uuid) -> PortResult<Vec<Slot>> {
        let mut inner = self.inner.lock().await;
        inner
            .windows
            .remove(&window_id)
            .ok_or_else(|| PortError::NotFound(format!("Window {} not found", window_id)))?;
        let removed: Vec<Slot> = inner
            .slots
            .values()
            .filter(|s| s.window_id == window_id)
            .cloned()
            .collect();
        inner.slots.retain(|_, s| s.window_id != window_id);
        Ok(sorted_by_start(removed))
    }

    async fn get_slot(&self, slot_id: Uuid) -> PortResult<Slot> {
        self.inner
            .lock()
            .await
            .slots
            .get(&slot_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Slot {} not found", slot_id)))
    }

    async fn list_slots_for_window(&self, window_id: Uuid) -> PortResult<Vec<Slot>> {
        let inner = self.inner.lock().await;
        Ok(sorted_by_start(
            inner
                .slots
                .values()
                .filter(|s| s.window_id == window_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_all_slots(&self) -> PortResult<Vec<Slot>> {
        let inner = self.inner.lock().await;
        Ok(sorted_by_start(inner.slots.values().cloned().collect()))
    }

    async fn list_open_slots(&self, from: DateTime<Utc>) -> PortResult<Vec<SlotOffer>> {
        let inner = self.inner.lock().await;
        let rows = sorted_by_start(
            inner
                .slots
                .values()
                .filter(|s| s.status == SlotStatus::Open && s.start_time > from)
                .cloned()
                .collect(),
        );
        Ok(rows.iter().map(|s| offer(&inner, s)).collect())
    }

    async fn list_bookings_for_student(&self, student_id: Uuid) -> PortResult<Vec<SlotOffer>> {
        let inner = self.inner.lock().await;
        let rows = sorted_by_start(
            inner
                .slots
                .values()
                .filter(|s| s.status == SlotStatus::Booked && s.student_id == Some(student_id))
                .cloned()
                .collect(),
        );
        Ok(rows.iter().map(|s| offer(&inner, s)).collect())
    }

    async fn list_cancellations_for_student(
        &self,
        student_id: Uuid,
    ) -> PortResult<Vec<SlotOffer>> {
        let inner = self.inner.lock().await;
        let rows = sorted_by_start(
            inner
                .slots
                .values()
                .filter(|s| s.status == SlotStatus::Cancelled && s.student_id == Some(student_id))
                .cloned()
                .collect(),
        );
        Ok(rows.iter().map(|s| offer(&inner, s)).collect())
    }

    async fn book_slot(&self, slot_id: Uuid, student_id: Uuid, agenda: &str) -> PortResult<Slot> {
        let mut inner = self.inner.lock().await;
        let slot = inner
            .slots
            .get_mut(&slot_id)
            .filter(|s| s.status == SlotStatus::Open)
            .ok_or(PortError::SlotUnavailable)?;
        slot.student_id = Some(student_id);
        slot.agenda = Some(agenda.to_string());
        slot.status = SlotStatus::Booked;
        Ok(slot.clone())
    }

    async fn release_slot(&self, slot_id: Uuid, student_id: Uuid) -> PortResult<Slot> {
        let mut inner = self.inner.lock().await;
        let slot = inner
            .slots
            .get_mut(&slot_id)
            .filter(|s| s.status == SlotStatus::Booked && s.student_id == Some(student_id))
            .ok_or(PortError::NotBookingOwner)?;
        slot.student_id = None;
        slot.agenda = None;
        slot.status = SlotStatus::Open;
        Ok(slot.clone())
    }

    async fn update_agenda(
        &self,
        slot_id: Uuid,
        student_id: Uuid,
        agenda: &str,
    ) -> PortResult<Slot> {
        let mut inner = self.inner.lock().await;
        let slot = inner
            .slots
            .get_mut(&slot_id)
            .filter(|s| s.status == SlotStatus::Booked && s.student_id == Some(student_id))
            .ok_or(PortError::NotBookingOwner)?;
        slot.agenda = Some(agenda.to_string());
        Ok(slot.clone())
    }

    async fn cancel_slot(&self, slot_id: Uuid, annotated_agenda: &str) -> PortResult<Slot> {
        let mut inner = self.inner.lock().await;
        let slot = inner
            .slots
            .get_mut(&slot_id)
            .filter(|s| s.status == SlotStatus::Booked)
            .ok_or(PortError::SlotNotBooked)?;
        slot.status = SlotStatus::Cancelled;
        slot.agenda = Some(annotated_agenda.to_string());
        Ok(slot.clone())
    }

    async fn delete_slot(
        &self,
        slot_id: Uuid,
        professor_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Slot> {
        let mut inner = self.inner.lock().await;
        let matches = inner
            .slots
            .get(&slot_id)
            .is_some_and(|s| s.professor_id == professor_id && s.end_time < now);
        if !matches {
            return Err(PortError::NotFound(format!("Slot {} not found", slot_id)));
        }
        Ok(inner.slots.remove(&slot_id).unwrap())
    }

    async fn delete_slots(
        &self,
        slot_ids: &[Uuid],
        professor_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<Slot>> {
        let mut inner = self.inner.lock().await;
        let mut deleted = Vec::new();
        for slot_id in slot_ids {
            let matches = inner
                .slots
                .get(slot_id)
                .is_some_and(|s| s.professor_id == professor_id && s.end_time < now);
            if matches {
                deleted.push(inner.slots.remove(slot_id).unwrap());
            }
        }
        Ok(sorted_by_start(deleted))
    }
}

//=========================================================================================
// Fixtures
//=========================================================================================

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        cors_origin: "http://localhost:3000".to_string(),
        session_ttl_days: 30,
    }
}

/// Builds an `AppState` over a fresh `MemoryStore`, returning both.
pub fn test_state() -> (Arc<AppState>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(store.clone(), Arc::new(test_config())));
    (state, store)
}

pub async fn register(store: &MemoryStore, role: Role, name: &str) -> Caller {
    let user = store
        .create_user(NewUser {
            email: format!("{}@example.edu", name.to_lowercase().replace(' ', ".")),
            full_name: name.to_string(),
            role,
            id_number: Uuid::new_v4().to_string(),
            hashed_password: "$argon2id$test".to_string(),
        })
        .await
        .expect("user fixture");
    Caller {
        user_id: user.id,
        role: user.role,
    }
}

pub async fn professor(store: &MemoryStore) -> Caller {
    register(store, Role::Professor, "Prof Rivera").await
}

pub async fn student(store: &MemoryStore) -> Caller {
    register(store, Role::Student, "Sam Cruz").await
}

/// A date far enough in the future that not-in-the-past checks always pass.
pub fn future_date() -> NaiveDate {
    (Utc::now() + Duration::days(30)).date_naive()
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// An agenda that clears the ten-character floor.
pub const VALID_AGENDA: &str = "Discuss thesis chapter two";

//=========================================================================================
// Response Helpers
//=========================================================================================

pub async fn body_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("parse response body")
}

/// Unwraps a handler rejection, panicking on success.
pub fn rejection<T>(result: Result<T, (StatusCode, String)>) -> (StatusCode, String) {
    match result {
        Ok(_) => panic!("expected the handler to reject"),
        Err(err) => err,
    }
}

/// Parses the `Role::from_str` storage form used on the wire.
pub fn role_of(value: &str) -> Role {
    Role::from_str(value).expect("role string")
}
