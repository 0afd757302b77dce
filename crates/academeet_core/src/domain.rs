//! crates/academeet_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The two account roles. Fixed at signup and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Professor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Professor => "professor",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "professor" => Ok(Role::Professor),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a slot. A cancelled slot never becomes open again;
/// it only leaves the system through hard deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Open,
    Booked,
    Cancelled,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Open => "open",
            SlotStatus::Booked => "booked",
            SlotStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for SlotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(SlotStatus::Open),
            "booked" => Ok(SlotStatus::Booked),
            "cancelled" => Ok(SlotStatus::Cancelled),
            other => Err(format!("unknown slot status '{}'", other)),
        }
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved identity making a request. Every operation takes this as an
/// explicit parameter; nothing reads the "current user" from ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub id_number: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub hashed_password: String,
}

/// Input for creating an account. The password arrives already hashed;
/// the core never sees plaintext credentials.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub id_number: String,
    pub hashed_password: String,
}

/// A professor-declared block of availability on a given date. The block is
/// sliced into `slot_minutes`-sized bookable slots at creation/edit time.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsultationWindow {
    pub id: Uuid,
    pub professor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: u32,
    pub topic: String,
    pub created_at: DateTime<Utc>,
}

/// The window fields a professor supplies on create/edit.
#[derive(Debug, Clone)]
pub struct NewWindow {
    pub professor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: u32,
    pub topic: String,
}

/// One fixed-duration bookable sub-interval of a window.
///
/// Invariants maintained by the storage layer: `start_time < end_time`;
/// `Booked` implies `student_id` and `agenda` are set; `Open` implies
/// `student_id` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub id: Uuid,
    pub window_id: Uuid,
    pub professor_id: Uuid,
    pub student_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
    pub agenda: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A half-open interval produced by the slot generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A slot joined with its window topic and professor name, the shape the
/// browse/booking listings display.
#[derive(Debug, Clone)]
pub struct SlotOffer {
    pub slot: Slot,
    pub topic: String,
    pub professor_name: String,
}
