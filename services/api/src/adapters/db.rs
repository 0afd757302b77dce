//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! The contested transitions from the port contract map to single predicated
//! UPDATE statements here, and the multi-row mutations (window create/replace/
//! delete) each run inside one transaction with the affected slot rows locked.

use std::str::FromStr;

use academeet_core::domain::{
    ConsultationWindow, NewUser, NewWindow, Role, Slot, SlotInterval, SlotOffer, SlotStatus, User,
    UserCredentials,
};
use academeet_core::ports::{DatabaseService, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Postgres reports unique-constraint violations as SQLSTATE 23505.
fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    full_name: String,
    role: String,
    id_number: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            role: Role::from_str(&self.role).map_err(PortError::Unexpected)?,
            id_number: self.id_number,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    full_name: String,
    role: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> PortResult<UserCredentials> {
        Ok(UserCredentials {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            role: Role::from_str(&self.role).map_err(PortError::Unexpected)?,
            hashed_password: self.hashed_password,
        })
    }
}

#[derive(FromRow)]
struct WindowRecord {
    id: Uuid,
    professor_id: Uuid,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    slot_minutes: i32,
    topic: String,
    created_at: DateTime<Utc>,
}
impl WindowRecord {
    fn to_domain(self) -> ConsultationWindow {
        ConsultationWindow {
            id: self.id,
            professor_id: self.professor_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            slot_minutes: self.slot_minutes as u32,
            topic: self.topic,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct SlotRecord {
    id: Uuid,
    window_id: Uuid,
    professor_id: Uuid,
    student_id: Option<Uuid>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    agenda: Option<String>,
    created_at: DateTime<Utc>,
}
impl SlotRecord {
    fn to_domain(self) -> PortResult<Slot> {
        Ok(Slot {
            id: self.id,
            window_id: self.window_id,
            professor_id: self.professor_id,
            student_id: self.student_id,
            start_time: self.start_time,
            end_time: self.end_time,
            status: SlotStatus::from_str(&self.status).map_err(PortError::Unexpected)?,
            agenda: self.agenda,
            created_at: self.created_at,
        })
    }
}

/// A slot joined with its window topic and the professor's name, used by the
/// browse/booking/notification listings.
#[derive(FromRow)]
struct SlotOfferRecord {
    #[sqlx(flatten)]
    slot: SlotRecord,
    topic: String,
    professor_name: String,
}
impl SlotOfferRecord {
    fn to_domain(self) -> PortResult<SlotOffer> {
        Ok(SlotOffer {
            slot: self.slot.to_domain()?,
            topic: self.topic,
            professor_name: self.professor_name,
        })
    }
}

const SLOT_COLUMNS: &str =
    "id, window_id, professor_id, student_id, start_time, end_time, status, agenda, created_at";

const OFFER_SELECT: &str = "SELECT s.id, s.window_id, s.professor_id, s.student_id, \
     s.start_time, s.end_time, s.status, s.agenda, s.created_at, \
     w.topic AS topic, u.full_name AS professor_name \
     FROM slots s \
     JOIN consultation_windows w ON w.id = s.window_id \
     JOIN users u ON u.id = s.professor_id";

/// Inserts one open slot row per generated interval inside the caller's
/// transaction, so the window and its slots commit or roll back together.
async fn insert_slots(
    tx: &mut Transaction<'_, Postgres>,
    window_id: Uuid,
    professor_id: Uuid,
    intervals: &[SlotInterval],
) -> PortResult<Vec<Slot>> {
    let mut slots = Vec::with_capacity(intervals.len());
    for interval in intervals {
        let record = sqlx::query_as::<_, SlotRecord>(
            "INSERT INTO slots (id, window_id, professor_id, start_time, end_time, status) \
             VALUES ($1, $2, $3, $4, $5, 'open') \
             RETURNING id, window_id, professor_id, student_id, start_time, end_time, \
                       status, agenda, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(window_id)
        .bind(professor_id)
        .bind(interval.start)
        .bind(interval.end)
        .fetch_one(&mut **tx)
        .await
        .map_err(unexpected)?;
        slots.push(record.to_domain()?);
    }
    Ok(slots)
}

/// Locks every slot row under a window and returns them. Run inside the
/// transaction that is about to delete or replace them, so a booking that
/// raced past the handler's guard is still caught before any row changes.
async fn lock_window_slots(
    tx: &mut Transaction<'_, Postgres>,
    window_id: Uuid,
) -> PortResult<Vec<Slot>> {
    let records = sqlx::query_as::<_, SlotRecord>(&format!(
        "SELECT {SLOT_COLUMNS} FROM slots WHERE window_id = $1 ORDER BY start_time FOR UPDATE"
    ))
    .bind(window_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(unexpected)?;
    records.into_iter().map(SlotRecord::to_domain).collect()
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, email, full_name, role, id_number, hashed_password) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, email, full_name, role, id_number, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.full_name)
        .bind(new_user.role.as_str())
        .bind(&new_user.id_number)
        .bind(&new_user.hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::AlreadyExists("email or ID number already registered".to_string())
            } else {
                unexpected(e)
            }
        })?;
        record.to_domain()
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, full_name, role, id_number, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, full_name, role, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("unknown email".to_string()),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT u.id, u.email, u.full_name, u.role, u.id_number, u.created_at \
             FROM auth_sessions s JOIN users u ON u.id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_window(
        &self,
        window: NewWindow,
        slots: &[SlotInterval],
    ) -> PortResult<(ConsultationWindow, Vec<Slot>)> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, WindowRecord>(
            "INSERT INTO consultation_windows \
             (id, professor_id, date, start_time, end_time, slot_minutes, topic) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, professor_id, date, start_time, end_time, slot_minutes, topic, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(window.professor_id)
        .bind(window.date)
        .bind(window.start_time)
        .bind(window.end_time)
        .bind(window.slot_minutes as i32)
        .bind(&window.topic)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        let created = insert_slots(&mut tx, record.id, record.professor_id, slots).await?;
        tx.commit().await.map_err(unexpected)?;
        Ok((record.to_domain(), created))
    }

    async fn get_window(&self, window_id: Uuid) -> PortResult<ConsultationWindow> {
        let record = sqlx::query_as::<_, WindowRecord>(
            "SELECT id, professor_id, date, start_time, end_time, slot_minutes, topic, created_at \
             FROM consultation_windows WHERE id = $1",
        )
        .bind(window_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Window {} not found", window_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn list_windows(&self, professor_id: Uuid) -> PortResult<Vec<ConsultationWindow>> {
        let records = sqlx::query_as::<_, WindowRecord>(
            "SELECT id, professor_id, date, start_time, end_time, slot_minutes, topic, created_at \
             FROM consultation_windows WHERE professor_id = $1 \
             ORDER BY date DESC, start_time DESC",
        )
        .bind(professor_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(WindowRecord::to_domain).collect())
    }

    async fn replace_window(
        &self,
        window_id: Uuid,
        window: NewWindow,
        slots: &[SlotInterval],
    ) -> PortResult<(ConsultationWindow, Vec<Slot>)> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Re-check the edit guard with the rows locked: a booking that landed
        // after the handler's check aborts the whole replace.
        let existing = lock_window_slots(&mut tx, window_id).await?;
        if existing.iter().any(|s| s.status == SlotStatus::Booked) {
            return Err(PortError::WindowHasBookings);
        }

        sqlx::query("DELETE FROM slots WHERE window_id = $1")
            .bind(window_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        let record = sqlx::query_as::<_, WindowRecord>(
            "UPDATE consultation_windows \
             SET date = $2, start_time = $3, end_time = $4, slot_minutes = $5, topic = $6 \
             WHERE id = $1 \
             RETURNING id, professor_id, date, start_time, end_time, slot_minutes, topic, created_at",
        )
        .bind(window_id)
        .bind(window.date)
        .bind(window.start_time)
        .bind(window.end_time)
        .bind(window.slot_minutes as i32)
        .bind(&window.topic)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Window {} not found", window_id))
            }
            _ => unexpected(e),
        })?;

        let created = insert_slots(&mut tx, record.id, record.professor_id, slots).await?;
        tx.commit().await.map_err(unexpected)?;
        Ok((record.to_domain(), created))
    }

    async fn delete_window(&self, window_id: Uuid) -> PortResult<Vec<Slot>> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // The slots are returned as they were at deletion so the caller can
        // fan out matching change events; the FK cascade removes them.
        let slots = lock_window_slots(&mut tx, window_id).await?;
        let deleted = sqlx::query("DELETE FROM consultation_windows WHERE id = $1")
            .bind(window_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if deleted.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Window {} not found",
                window_id
            )));
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(slots)
    }

    async fn get_slot(&self, slot_id: Uuid) -> PortResult<Slot> {
        let record = sqlx::query_as::<_, SlotRecord>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE id = $1"
        ))
        .bind(slot_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Slot {} not found", slot_id)),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn list_slots_for_window(&self, window_id: Uuid) -> PortResult<Vec<Slot>> {
        let records = sqlx::query_as::<_, SlotRecord>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots WHERE window_id = $1 ORDER BY start_time"
        ))
        .bind(window_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(SlotRecord::to_domain).collect()
    }

    async fn list_all_slots(&self) -> PortResult<Vec<Slot>> {
        let records = sqlx::query_as::<_, SlotRecord>(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots ORDER BY start_time"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(SlotRecord::to_domain).collect()
    }

    async fn list_open_slots(&self, from: DateTime<Utc>) -> PortResult<Vec<SlotOffer>> {
        let records = sqlx::query_as::<_, SlotOfferRecord>(&format!(
            "{OFFER_SELECT} WHERE s.status = 'open' AND s.start_time > $1 ORDER BY s.start_time"
        ))
        .bind(from)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(SlotOfferRecord::to_domain).collect()
    }

    async fn list_bookings_for_student(&self, student_id: Uuid) -> PortResult<Vec<SlotOffer>> {
        let records = sqlx::query_as::<_, SlotOfferRecord>(&format!(
            "{OFFER_SELECT} WHERE s.status = 'booked' AND s.student_id = $1 ORDER BY s.start_time"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(SlotOfferRecord::to_domain).collect()
    }

    async fn list_cancellations_for_student(
        &self,
        student_id: Uuid,
    ) -> PortResult<Vec<SlotOffer>> {
        let records = sqlx::query_as::<_, SlotOfferRecord>(&format!(
            "{OFFER_SELECT} WHERE s.status = 'cancelled' AND s.student_id = $1 ORDER BY s.start_time"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(SlotOfferRecord::to_domain).collect()
    }

    async fn book_slot(&self, slot_id: Uuid, student_id: Uuid, agenda: &str) -> PortResult<Slot> {
        // The sole guard for the contested open->booked transition: one
        // conditional UPDATE. Zero matched rows means another student won
        // the race or the slot was never open.
        let record = sqlx::query_as::<_, SlotRecord>(&format!(
            "UPDATE slots SET student_id = $2, agenda = $3, status = 'booked' \
             WHERE id = $1 AND status = 'open' \
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot_id)
        .bind(student_id)
        .bind(agenda)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::SlotUnavailable,
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn release_slot(&self, slot_id: Uuid, student_id: Uuid) -> PortResult<Slot> {
        let record = sqlx::query_as::<_, SlotRecord>(&format!(
            "UPDATE slots SET student_id = NULL, agenda = NULL, status = 'open' \
             WHERE id = $1 AND student_id = $2 AND status = 'booked' \
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotBookingOwner,
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn update_agenda(
        &self,
        slot_id: Uuid,
        student_id: Uuid,
        agenda: &str,
    ) -> PortResult<Slot> {
        let record = sqlx::query_as::<_, SlotRecord>(&format!(
            "UPDATE slots SET agenda = $3 \
             WHERE id = $1 AND student_id = $2 AND status = 'booked' \
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot_id)
        .bind(student_id)
        .bind(agenda)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotBookingOwner,
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn cancel_slot(&self, slot_id: Uuid, annotated_agenda: &str) -> PortResult<Slot> {
        // student_id is deliberately kept so the notification surface knows
        // whom the cancellation concerns.
        let record = sqlx::query_as::<_, SlotRecord>(&format!(
            "UPDATE slots SET status = 'cancelled', agenda = $2 \
             WHERE id = $1 AND status = 'booked' \
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot_id)
        .bind(annotated_agenda)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::SlotNotBooked,
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn delete_slot(
        &self,
        slot_id: Uuid,
        professor_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Slot> {
        let record = sqlx::query_as::<_, SlotRecord>(&format!(
            "DELETE FROM slots \
             WHERE id = $1 AND professor_id = $2 AND end_time < $3 \
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot_id)
        .bind(professor_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Slot {} not found", slot_id)),
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn delete_slots(
        &self,
        slot_ids: &[Uuid],
        professor_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<Slot>> {
        let records = sqlx::query_as::<_, SlotRecord>(&format!(
            "DELETE FROM slots \
             WHERE id = ANY($1) AND professor_id = $2 AND end_time < $3 \
             RETURNING {SLOT_COLUMNS}"
        ))
        .bind(slot_ids)
        .bind(professor_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(SlotRecord::to_domain).collect()
    }
}
