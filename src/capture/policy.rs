use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::errors::AttendanceError;
use crate::models::{AttendanceRecord, AttendanceStatus, ClockAction};
use crate::settings::ShiftSettings;

/// Calendar day a clock event belongs to, in the device's zone.
pub fn attendance_date<Tz: TimeZone>(at: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

/// Status and minutes late for a clock-in at local time `at`.
pub fn lateness(at: NaiveDateTime, shift: &ShiftSettings) -> (AttendanceStatus, u32) {
    let cutoff = at.date().and_time(shift.start)
        + chrono::Duration::minutes(i64::from(shift.grace_minutes));
    if at <= cutoff {
        return (AttendanceStatus::Present, 0);
    }

    let shift_start = at.date().and_time(shift.start);
    let late_by = (at - shift_start).num_minutes();
    (
        AttendanceStatus::Late,
        u32::try_from(late_by).unwrap_or(u32::MAX),
    )
}

pub fn worked_minutes(clock_in: DateTime<Utc>, clock_out: DateTime<Utc>) -> u32 {
    let minutes = (clock_out - clock_in).num_minutes().max(0);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Re-entrancy rules: one clock-in per day, one clock-out after it.
pub fn check_precondition(
    action: ClockAction,
    today: Option<&AttendanceRecord>,
) -> Result<(), AttendanceError> {
    match (action, today) {
        (ClockAction::ClockIn, Some(_)) => Err(AttendanceError::AlreadyClockedIn),
        (ClockAction::ClockIn, None) => Ok(()),
        (ClockAction::ClockOut, None) => Err(AttendanceError::NotYetClockedIn),
        (ClockAction::ClockOut, Some(record)) if record.is_clocked_out() => {
            Err(AttendanceError::AlreadyClockedOut)
        }
        (ClockAction::ClockOut, Some(_)) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveTime};

    use super::*;

    fn shift() -> ShiftSettings {
        ShiftSettings {
            start: NaiveTime::from_hms_opt(8, 30, 0).expect("valid time"),
            grace_minutes: 15,
        }
    }

    fn local(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .expect("valid datetime")
    }

    #[test]
    fn within_grace_is_present() {
        assert_eq!(lateness(local(8, 0), &shift()), (AttendanceStatus::Present, 0));
        assert_eq!(lateness(local(8, 45), &shift()), (AttendanceStatus::Present, 0));
    }

    #[test]
    fn after_grace_counts_from_shift_start() {
        assert_eq!(lateness(local(8, 46), &shift()), (AttendanceStatus::Late, 16));
        assert_eq!(lateness(local(10, 30), &shift()), (AttendanceStatus::Late, 120));
    }

    #[test]
    fn worked_minutes_never_negative() {
        let start = Utc::now();
        assert_eq!(worked_minutes(start, start + chrono::Duration::minutes(95)), 95);
        assert_eq!(worked_minutes(start, start - chrono::Duration::minutes(5)), 0);
    }

    #[test]
    fn date_follows_local_zone() {
        let at = DateTime::parse_from_rfc3339("2024-03-04T20:00:00Z")
            .expect("valid timestamp")
            .with_timezone(&Utc);
        let vientiane = FixedOffset::east_opt(7 * 3600).expect("valid offset");
        assert_eq!(
            attendance_date(at, &vientiane),
            NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date")
        );
        assert_eq!(
            attendance_date(at, &Utc),
            NaiveDate::from_ymd_opt(2024, 3, 4).expect("valid date")
        );
    }

    #[test]
    fn preconditions() {
        assert_eq!(check_precondition(ClockAction::ClockIn, None), Ok(()));
        assert_eq!(
            check_precondition(ClockAction::ClockOut, None),
            Err(AttendanceError::NotYetClockedIn)
        );
    }

    #[test]
    fn existing_record_blocks_second_clock_in_and_out() {
        let mut record = open_record();
        assert_eq!(
            check_precondition(ClockAction::ClockIn, Some(&record)),
            Err(AttendanceError::AlreadyClockedIn)
        );
        assert_eq!(check_precondition(ClockAction::ClockOut, Some(&record)), Ok(()));

        record.clock_out = Some(record.clock_in.clone());
        record.status = AttendanceStatus::Completed;
        assert_eq!(
            check_precondition(ClockAction::ClockOut, Some(&record)),
            Err(AttendanceError::AlreadyClockedOut)
        );
        assert_eq!(
            check_precondition(ClockAction::ClockIn, Some(&record)),
            Err(AttendanceError::AlreadyClockedIn)
        );
    }

    fn open_record() -> AttendanceRecord {
        use crate::models::{ClockEvent, Coordinate, PositionReading, PositionSource};

        let now = Utc::now();
        AttendanceRecord {
            id: "att-1".into(),
            user_id: "emp-7".into(),
            date: now.date_naive(),
            clock_in: ClockEvent {
                time: now,
                position: PositionReading {
                    coords: Coordinate::new(17.966667, 102.6).expect("valid coordinate"),
                    accuracy_meters: Some(10.0),
                    source: PositionSource::Gps,
                    captured_at: now,
                },
                address: "17.966667, 102.600000".into(),
                device_fingerprint: "agent-os-1x1-24".into(),
                photo_ref: "photo-1".into(),
                token_value: "emp-7:1:00".into(),
                matched_location: None,
            },
            clock_out: None,
            status: AttendanceStatus::Present,
            late_by_minutes: 0,
            worked_minutes: None,
            created_at: now,
            updated_at: now,
        }
    }
}
