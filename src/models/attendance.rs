//! Attendance record data models.
//!
//! One record per user per local calendar day. Clock-in creates it, clock-out
//! fills in `clock_out` exactly once.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::geo::PositionReading;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ClockAction {
    ClockIn,
    ClockOut,
}

impl ClockAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClockAction::ClockIn => "clock-in",
            ClockAction::ClockOut => "clock-out",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Completed,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClockEvent {
    pub time: DateTime<Utc>,
    pub position: PositionReading,
    pub address: String,
    pub device_fingerprint: String,
    pub photo_ref: String,
    pub token_value: String,
    /// Name of the zone or network that authorized the event.
    pub matched_location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub clock_in: ClockEvent,
    pub clock_out: Option<ClockEvent>,
    pub status: AttendanceStatus,
    pub late_by_minutes: u32,
    pub worked_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn is_clocked_out(&self) -> bool {
        self.clock_out.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub clock_in: ClockEvent,
    pub status: AttendanceStatus,
    pub late_by_minutes: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceUpdate {
    pub clock_out: ClockEvent,
    pub status: AttendanceStatus,
    pub worked_minutes: u32,
}

/// Verification photo handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub user_id: String,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}
