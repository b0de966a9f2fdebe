//! Clock capture state machine.
//!
//! Pure: no I/O, no clocks. The controller performs the suspending work and
//! feeds the outcome back in as a [`CaptureEvent`].

use serde::Serialize;
use thiserror::Error;

use crate::errors::{AttendanceError, ErrorView};
use crate::geo::{ComplianceResult, NonCompliance};
use crate::models::{AttendanceRecord, ClockAction, PositionReading};

use super::camera::CapturedPhoto;

/// Reading and photo kept across a failed commit so the user can retry
/// without recapturing.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCapture {
    pub reading: PositionReading,
    pub photo: CapturedPhoto,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Locating {
        action: ClockAction,
    },
    CapturingPhoto {
        action: ClockAction,
        reading: PositionReading,
        /// Set once the camera stream is open and a frame can be taken.
        camera_ready: bool,
    },
    Confirming {
        action: ClockAction,
        capture: PendingCapture,
        compliance: Option<ComplianceResult>,
    },
    Success {
        action: ClockAction,
        record: AttendanceRecord,
        compliance: ComplianceResult,
    },
    Error {
        action: ClockAction,
        error: AttendanceError,
        retained: Option<PendingCapture>,
        compliance: Option<ComplianceResult>,
    },
    /// Informational stop for precondition violations (already clocked in,
    /// and so on). Not a failure.
    Notice {
        action: ClockAction,
        reason: AttendanceError,
    },
}

#[derive(Debug, Clone)]
pub enum CaptureEvent {
    Begin(ClockAction),
    /// The attempt stopped before locating. Informational reasons end in
    /// `Notice`, anything else in `Error`.
    Refuse(ClockAction, AttendanceError),
    Located(PositionReading),
    LocationFailed(AttendanceError),
    CameraReady,
    PhotoCaptured(CapturedPhoto),
    CameraFailed(AttendanceError),
    /// Compliance was re-checked against `reading` at commit time.
    Revalidated {
        reading: PositionReading,
        compliance: ComplianceResult,
    },
    /// Re-validation failed. The capture is dropped; the user must move and
    /// start over.
    ComplianceFailed(NonCompliance),
    Committed(AttendanceRecord),
    CommitFailed(AttendanceError),
    CommitRefused(AttendanceError),
    RetryCommit,
    Discard,
    Reset,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CapturePhase {
    Idle,
    Locating,
    CapturingPhoto,
    Confirming,
    Success,
    Error,
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply {event} while {phase:?}")]
pub struct InvalidTransition {
    pub phase: CapturePhase,
    pub event: &'static str,
}

impl CaptureEvent {
    fn name(&self) -> &'static str {
        match self {
            CaptureEvent::Begin(_) => "Begin",
            CaptureEvent::Refuse(..) => "Refuse",
            CaptureEvent::Located(_) => "Located",
            CaptureEvent::LocationFailed(_) => "LocationFailed",
            CaptureEvent::CameraReady => "CameraReady",
            CaptureEvent::PhotoCaptured(_) => "PhotoCaptured",
            CaptureEvent::CameraFailed(_) => "CameraFailed",
            CaptureEvent::Revalidated { .. } => "Revalidated",
            CaptureEvent::ComplianceFailed(_) => "ComplianceFailed",
            CaptureEvent::Committed(_) => "Committed",
            CaptureEvent::CommitFailed(_) => "CommitFailed",
            CaptureEvent::CommitRefused(_) => "CommitRefused",
            CaptureEvent::RetryCommit => "RetryCommit",
            CaptureEvent::Discard => "Discard",
            CaptureEvent::Reset => "Reset",
            CaptureEvent::Cancel => "Cancel",
        }
    }
}

impl CaptureState {
    pub fn phase(&self) -> CapturePhase {
        match self {
            CaptureState::Idle => CapturePhase::Idle,
            CaptureState::Locating { .. } => CapturePhase::Locating,
            CaptureState::CapturingPhoto { .. } => CapturePhase::CapturingPhoto,
            CaptureState::Confirming { .. } => CapturePhase::Confirming,
            CaptureState::Success { .. } => CapturePhase::Success,
            CaptureState::Error { .. } => CapturePhase::Error,
            CaptureState::Notice { .. } => CapturePhase::Notice,
        }
    }

    pub fn action(&self) -> Option<ClockAction> {
        match self {
            CaptureState::Idle => None,
            CaptureState::Locating { action }
            | CaptureState::CapturingPhoto { action, .. }
            | CaptureState::Confirming { action, .. }
            | CaptureState::Success { action, .. }
            | CaptureState::Error { action, .. }
            | CaptureState::Notice { action, .. } => Some(*action),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaptureState::Success { .. } | CaptureState::Error { .. } | CaptureState::Notice { .. }
        )
    }

    pub fn apply(self, event: CaptureEvent) -> Result<CaptureState, InvalidTransition> {
        let phase = self.phase();
        let name = event.name();

        let next = match (self, event) {
            (_, CaptureEvent::Cancel) => CaptureState::Idle,

            (CaptureState::Idle, CaptureEvent::Begin(action)) => CaptureState::Locating { action },
            (CaptureState::Idle, CaptureEvent::Refuse(action, reason)) => {
                if reason.is_informational() {
                    CaptureState::Notice { action, reason }
                } else {
                    CaptureState::Error {
                        action,
                        error: reason,
                        retained: None,
                        compliance: None,
                    }
                }
            }

            (CaptureState::Locating { action }, CaptureEvent::Located(reading)) => {
                CaptureState::CapturingPhoto {
                    action,
                    reading,
                    camera_ready: false,
                }
            }
            (CaptureState::Locating { action }, CaptureEvent::LocationFailed(error)) => {
                CaptureState::Error {
                    action,
                    error,
                    retained: None,
                    compliance: None,
                }
            }

            (
                CaptureState::CapturingPhoto {
                    action,
                    reading,
                    camera_ready: false,
                },
                CaptureEvent::CameraReady,
            ) => CaptureState::CapturingPhoto {
                action,
                reading,
                camera_ready: true,
            },
            (
                CaptureState::CapturingPhoto {
                    action,
                    reading,
                    camera_ready: true,
                },
                CaptureEvent::PhotoCaptured(photo),
            ) => {
                CaptureState::Confirming {
                    action,
                    capture: PendingCapture { reading, photo },
                    compliance: None,
                }
            }
            (CaptureState::CapturingPhoto { action, .. }, CaptureEvent::CameraFailed(error)) => {
                CaptureState::Error {
                    action,
                    error,
                    retained: None,
                    compliance: None,
                }
            }

            (
                CaptureState::Confirming {
                    action, capture, ..
                },
                CaptureEvent::Revalidated {
                    reading,
                    compliance,
                },
            ) => CaptureState::Confirming {
                action,
                capture: PendingCapture {
                    reading,
                    photo: capture.photo,
                },
                compliance: Some(compliance),
            },
            // Success needs a compliant re-validation on record.
            (
                CaptureState::Confirming {
                    action,
                    compliance: Some(compliance),
                    ..
                },
                CaptureEvent::Committed(record),
            ) if compliance.is_compliant => CaptureState::Success {
                action,
                record,
                compliance,
            },
            (
                CaptureState::Confirming {
                    action,
                    compliance,
                    ..
                },
                CaptureEvent::ComplianceFailed(reason),
            ) => CaptureState::Error {
                action,
                error: AttendanceError::NotCompliant(reason),
                retained: None,
                compliance,
            },
            (
                CaptureState::Confirming {
                    action,
                    capture,
                    compliance,
                },
                CaptureEvent::CommitFailed(error),
            ) => CaptureState::Error {
                action,
                error,
                retained: Some(capture),
                compliance,
            },
            (CaptureState::Confirming { action, .. }, CaptureEvent::CommitRefused(reason)) => {
                CaptureState::Notice { action, reason }
            }
            (CaptureState::Confirming { .. }, CaptureEvent::Discard) => CaptureState::Idle,

            (
                CaptureState::Error {
                    action,
                    retained: Some(capture),
                    ..
                },
                CaptureEvent::RetryCommit,
            ) => CaptureState::Confirming {
                action,
                capture,
                compliance: None,
            },

            (
                CaptureState::Success { .. } | CaptureState::Error { .. } | CaptureState::Notice { .. },
                CaptureEvent::Reset,
            ) => CaptureState::Idle,

            _ => return Err(InvalidTransition { phase, event: name }),
        };

        Ok(next)
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        let (reading, compliance, error, record, has_photo) = match self {
            CaptureState::Idle | CaptureState::Locating { .. } => (None, None, None, None, false),
            CaptureState::CapturingPhoto { reading, .. } => {
                (Some(reading.clone()), None, None, None, false)
            }
            CaptureState::Confirming {
                capture,
                compliance,
                ..
            } => (
                Some(capture.reading.clone()),
                compliance.clone(),
                None,
                None,
                true,
            ),
            CaptureState::Success {
                record, compliance, ..
            } => (
                None,
                Some(compliance.clone()),
                None,
                Some(record.clone()),
                false,
            ),
            CaptureState::Error {
                error,
                retained,
                compliance,
                ..
            } => (
                retained.as_ref().map(|capture| capture.reading.clone()),
                compliance.clone(),
                Some(ErrorView::new(error, retained.is_some())),
                None,
                retained.is_some(),
            ),
            CaptureState::Notice { reason, .. } => {
                (None, None, Some(ErrorView::from(reason)), None, false)
            }
        };

        CaptureSnapshot {
            phase: self.phase(),
            action: self.action(),
            reading,
            compliance,
            error,
            record,
            has_photo,
            camera_ready: matches!(
                self,
                CaptureState::CapturingPhoto {
                    camera_ready: true,
                    ..
                }
            ),
        }
    }
}

/// What the UI renders for the current attempt.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshot {
    pub phase: CapturePhase,
    pub action: Option<ClockAction>,
    pub reading: Option<PositionReading>,
    pub compliance: Option<ComplianceResult>,
    pub error: Option<ErrorView>,
    pub record: Option<AttendanceRecord>,
    pub has_photo: bool,
    pub camera_ready: bool,
}
