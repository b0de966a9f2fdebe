//! Failure taxonomy for the clock flow.
//!
//! Every raw capability or store failure is translated into one of these
//! before it reaches the capture state.

use serde::Serialize;
use thiserror::Error;

use crate::geo::NonCompliance;
use crate::location::LocationError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AttendanceError {
    #[error("location access was denied")]
    LocationPermissionDenied,

    #[error("no location source produced a position")]
    LocationUnavailable,

    #[error("location request timed out")]
    LocationTimeout,

    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("position is not inside an authorized location")]
    NotCompliant(NonCompliance),

    #[error("already clocked in today")]
    AlreadyClockedIn,

    #[error("already clocked out today")]
    AlreadyClockedOut,

    #[error("no clock-in recorded today")]
    NotYetClockedIn,

    #[error("failed to save attendance: {0}")]
    PersistenceFailure(String),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AttendanceErrorKind {
    LocationPermissionDenied,
    LocationUnavailable,
    LocationTimeout,
    CameraUnavailable,
    NotCompliant,
    AlreadyClockedIn,
    AlreadyClockedOut,
    NotYetClockedIn,
    PersistenceFailure,
}

impl AttendanceError {
    pub fn kind(&self) -> AttendanceErrorKind {
        match self {
            AttendanceError::LocationPermissionDenied => AttendanceErrorKind::LocationPermissionDenied,
            AttendanceError::LocationUnavailable => AttendanceErrorKind::LocationUnavailable,
            AttendanceError::LocationTimeout => AttendanceErrorKind::LocationTimeout,
            AttendanceError::CameraUnavailable(_) => AttendanceErrorKind::CameraUnavailable,
            AttendanceError::NotCompliant(_) => AttendanceErrorKind::NotCompliant,
            AttendanceError::AlreadyClockedIn => AttendanceErrorKind::AlreadyClockedIn,
            AttendanceError::AlreadyClockedOut => AttendanceErrorKind::AlreadyClockedOut,
            AttendanceError::NotYetClockedIn => AttendanceErrorKind::NotYetClockedIn,
            AttendanceError::PersistenceFailure(_) => AttendanceErrorKind::PersistenceFailure,
        }
    }

    /// Precondition violations reflect normal usage, not a malfunction.
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            AttendanceError::AlreadyClockedIn
                | AttendanceError::AlreadyClockedOut
                | AttendanceError::NotYetClockedIn
        )
    }

    /// Message shown to the employee, with what to do next. `capture_kept`
    /// is whether the photo survived for a retry.
    pub fn remediation(&self, capture_kept: bool) -> String {
        match self {
            AttendanceError::LocationPermissionDenied => {
                "Location access is turned off for this app. Enable location permission in your device settings, then try again.".into()
            }
            AttendanceError::LocationUnavailable => {
                "Your position could not be determined. Turn on GPS or connect to the office Wi-Fi, then try again.".into()
            }
            AttendanceError::LocationTimeout => {
                "Finding your position took too long. Move somewhere with a clearer view of the sky and try again.".into()
            }
            AttendanceError::CameraUnavailable(_) => {
                "The camera could not be started. Allow camera access and make sure no other app is using it.".into()
            }
            AttendanceError::NotCompliant(reason) => match reason {
                NonCompliance::NoAuthorizedLocations => {
                    "No authorized locations are configured. Contact your administrator.".into()
                }
                NonCompliance::OutsideAllZones {
                    nearest_zone,
                    distance_meters,
                } => format!(
                    "You are {:.0} meters away from {nearest_zone}. Move inside the allowed area to clock in.",
                    distance_meters
                ),
                NonCompliance::NetworkNotRecognized => {
                    "You are not connected to an authorized network.".into()
                }
            },
            AttendanceError::AlreadyClockedIn => "You have already clocked in today.".into(),
            AttendanceError::AlreadyClockedOut => "You have already clocked out today.".into(),
            AttendanceError::NotYetClockedIn => "Clock in first before clocking out.".into(),
            AttendanceError::PersistenceFailure(_) if capture_kept => {
                "Your attendance could not be saved. Your photo is kept; tap retry to submit it again.".into()
            }
            AttendanceError::PersistenceFailure(_) => {
                "Attendance records could not be reached. Check your connection and start again.".into()
            }
        }
    }
}

impl From<LocationError> for AttendanceError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::PermissionDenied => AttendanceError::LocationPermissionDenied,
            LocationError::Unavailable => AttendanceError::LocationUnavailable,
            LocationError::Timeout => AttendanceError::LocationTimeout,
        }
    }
}

/// Serializable view of an error for the UI layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorView {
    pub kind: AttendanceErrorKind,
    pub message: String,
    pub informational: bool,
    pub detail: String,
}

impl ErrorView {
    pub fn new(err: &AttendanceError, capture_kept: bool) -> Self {
        Self {
            kind: err.kind(),
            message: err.remediation(capture_kept),
            informational: err.is_informational(),
            detail: err.to_string(),
        }
    }
}

impl From<&AttendanceError> for ErrorView {
    fn from(err: &AttendanceError) -> Self {
        Self::new(err, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_precondition_kinds_are_informational() {
        assert!(AttendanceError::AlreadyClockedIn.is_informational());
        assert!(AttendanceError::AlreadyClockedOut.is_informational());
        assert!(AttendanceError::NotYetClockedIn.is_informational());
        assert!(!AttendanceError::LocationTimeout.is_informational());
        assert!(!AttendanceError::PersistenceFailure("disk full".into()).is_informational());
    }

    #[test]
    fn compliance_message_includes_distance() {
        let err = AttendanceError::NotCompliant(NonCompliance::OutsideAllZones {
            nearest_zone: "Head Office".into(),
            distance_meters: 1999.6,
        });
        assert_eq!(
            err.remediation(false),
            "You are 2000 meters away from Head Office. Move inside the allowed area to clock in."
        );
    }

    #[test]
    fn retry_is_offered_only_with_a_kept_capture() {
        let err = AttendanceError::PersistenceFailure("database is locked".into());
        assert!(ErrorView::new(&err, true).message.contains("tap retry"));

        let view = ErrorView::from(&err);
        assert!(!view.message.contains("retry"));
        assert_eq!(view.detail, "failed to save attendance: database is locked");
    }

    #[test]
    fn location_errors_map_to_taxonomy() {
        assert_eq!(
            AttendanceError::from(LocationError::PermissionDenied),
            AttendanceError::LocationPermissionDenied
        );
        assert_eq!(
            AttendanceError::from(LocationError::Timeout).kind(),
            AttendanceErrorKind::LocationTimeout
        );
    }
}
