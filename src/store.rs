//! Persistence seams used by the capture controller.
//!
//! [`crate::db::Database`] implements all three; tests swap in mocks.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::automock;

use crate::models::{
    AllowedNetwork, AllowedZone, AttendanceRecord, AttendanceUpdate, Coordinate,
    NewAttendanceRecord, NewPhoto,
};

#[automock]
#[async_trait]
pub trait AttendanceRecordStore: Send + Sync {
    /// Records whose `date` falls in `[from, to]`, oldest first.
    async fn find_by_user_between(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>>;

    /// Fails if the user already has a record for `record.date`.
    async fn create(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord>;

    /// Sets the clock-out. Fails if the record is missing or already closed.
    async fn update(&self, id: &str, update: AttendanceUpdate) -> Result<AttendanceRecord>;

    /// Stores the verification photo and returns its reference.
    async fn save_photo(&self, photo: NewPhoto) -> Result<String>;
}

#[automock]
#[async_trait]
pub trait LocationDirectory: Send + Sync {
    async fn allowed_zones(&self) -> Result<Vec<AllowedZone>>;
    async fn allowed_networks(&self) -> Result<Vec<AllowedNetwork>>;
}

#[automock]
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn reverse(&self, coords: &Coordinate) -> Result<String>;
}

/// Fallback address when no resolver is configured or it fails.
pub fn format_coordinates(coords: &Coordinate) -> String {
    format!("{:.6}, {:.6}", coords.latitude(), coords.longitude())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_format_to_six_places() {
        let coords = Coordinate::new(17.966667, 102.6).expect("valid coordinate");
        assert_eq!(format_coordinates(&coords), "17.966667, 102.600000");
    }
}
