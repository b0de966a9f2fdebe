use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::errors::AttendanceError;
use crate::geo::{evaluate, ComplianceResult, NonCompliance};
use crate::identity::{DeviceFingerprint, TokenHandle};
use crate::location::LocationResolver;
use crate::models::{
    AttendanceRecord, AttendanceStatus, AttendanceUpdate, ClockAction, ClockEvent, Coordinate,
    NewAttendanceRecord, NewPhoto, PositionReading,
};
use crate::settings::{CaptureSettings, ShiftSettings};
use crate::store::{format_coordinates, AddressResolver, AttendanceRecordStore, LocationDirectory};

use super::camera::{Camera, CameraStream, CapturedPhoto};
use super::policy::{attendance_date, check_precondition, lateness, worked_minutes};
use super::state::{CaptureEvent, CaptureSnapshot, CaptureState, InvalidTransition, PendingCapture};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Collaborators the controller drives.
#[derive(Clone)]
pub struct CaptureDeps {
    pub records: Arc<dyn AttendanceRecordStore>,
    pub directory: Arc<dyn LocationDirectory>,
    pub resolver: LocationResolver,
    pub camera: Arc<dyn Camera>,
    pub addresses: Option<Arc<dyn AddressResolver>>,
}

struct Inner {
    state: CaptureState,
    /// Cancelled when the user abandons the attempt.
    attempt: Option<CancellationToken>,
}

enum CommitOutcome {
    Saved {
        reading: PositionReading,
        compliance: ComplianceResult,
        record: AttendanceRecord,
    },
    OutOfBounds {
        reading: PositionReading,
        compliance: ComplianceResult,
        reason: NonCompliance,
    },
    Refused(AttendanceError),
    Failed(AttendanceError),
}

/// Sequences one clock-in or clock-out attempt for a user.
///
/// All decisions live in [`CaptureState::apply`]; this type performs the
/// location, camera and store calls and feeds their outcomes back in.
#[derive(Clone)]
pub struct CaptureController {
    user_id: Arc<str>,
    inner: Arc<Mutex<Inner>>,
    stream: Arc<Mutex<Option<Box<dyn CameraStream>>>>,
    deps: CaptureDeps,
    fingerprint: DeviceFingerprint,
    token: TokenHandle,
    settings: CaptureSettings,
    shift: ShiftSettings,
}

impl CaptureController {
    pub fn new(
        user_id: impl Into<String>,
        deps: CaptureDeps,
        fingerprint: DeviceFingerprint,
        token: TokenHandle,
        settings: CaptureSettings,
        shift: ShiftSettings,
    ) -> Self {
        Self {
            user_id: Arc::from(user_id.into()),
            inner: Arc::new(Mutex::new(Inner {
                state: CaptureState::Idle,
                attempt: None,
            })),
            stream: Arc::new(Mutex::new(None)),
            deps,
            fingerprint,
            token,
            settings,
            shift,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn snapshot(&self) -> CaptureSnapshot {
        self.inner.lock().await.state.snapshot()
    }

    pub async fn state(&self) -> CaptureState {
        self.inner.lock().await.state.clone()
    }

    /// Starts an attempt: checks today's record, locates the user and opens
    /// the camera. Ends in `CapturingPhoto`, `Notice` or `Error`.
    pub async fn begin(&self, action: ClockAction) -> Result<CaptureSnapshot, InvalidTransition> {
        let attempt = {
            let mut inner = self.inner.lock().await;
            if inner.state != CaptureState::Idle || inner.attempt.is_some() {
                return Err(InvalidTransition {
                    phase: inner.state.phase(),
                    event: "Begin",
                });
            }
            let attempt = CancellationToken::new();
            inner.attempt = Some(attempt.clone());
            attempt
        };

        log_info!("{} attempt started for {}", action.as_str(), self.user_id);

        let today = match self.guarded(&attempt, self.today_record()).await {
            None => return Ok(self.snapshot().await),
            Some(Ok(today)) => today,
            Some(Err(err)) => {
                log_error!("failed to load today's attendance: {err:#}");
                return self
                    .advance(&attempt, CaptureEvent::Refuse(action, persistence(err)))
                    .await;
            }
        };

        if let Err(reason) = check_precondition(action, today.as_ref()) {
            log_info!("{} refused: {reason}", action.as_str());
            return self.advance(&attempt, CaptureEvent::Refuse(action, reason)).await;
        }

        self.advance(&attempt, CaptureEvent::Begin(action)).await?;

        let located = self
            .guarded(&attempt, self.deps.resolver.resolve(&self.settings.location))
            .await;
        let reading = match located {
            None => return Ok(self.snapshot().await),
            Some(Ok(reading)) => reading,
            Some(Err(err)) => {
                log_warn!("location failed: {err}");
                return self
                    .advance(&attempt, CaptureEvent::LocationFailed(err.into()))
                    .await;
            }
        };
        self.advance(&attempt, CaptureEvent::Located(reading)).await?;

        // Acquisition is not raced against cancellation; a stream that shows
        // up late is stopped by `install_stream` instead of leaking.
        match self.deps.camera.acquire_stream(self.settings.camera_facing).await {
            Ok(stream) => Ok(self.install_stream(&attempt, stream).await),
            Err(err) => {
                log_warn!("camera unavailable: {err}");
                self.advance(
                    &attempt,
                    CaptureEvent::CameraFailed(AttendanceError::CameraUnavailable(err.to_string())),
                )
                .await
            }
        }
    }

    /// Takes the verification frame and releases the camera. Rejected until
    /// the snapshot reports `camera_ready`.
    pub async fn capture_photo(&self) -> Result<CaptureSnapshot, InvalidTransition> {
        let attempt = self.attempt_in("PhotoCaptured", |state| {
            matches!(
                state,
                CaptureState::CapturingPhoto {
                    camera_ready: true,
                    ..
                }
            )
        })
        .await?;

        let stream = self.stream.lock().await.take();
        let Some(mut stream) = stream else {
            return self
                .advance(
                    &attempt,
                    CaptureEvent::CameraFailed(AttendanceError::CameraUnavailable(
                        "camera stream is not open".into(),
                    )),
                )
                .await;
        };

        let frame = self.guarded(&attempt, stream.capture_frame()).await;
        stream.stop().await;

        let frame = match frame {
            None => return Ok(self.snapshot().await),
            Some(frame) => frame,
        };

        let event = match frame.and_then(|bytes| CapturedPhoto::from_jpeg(bytes, Utc::now())) {
            Ok(photo) => {
                log_info!("captured {}x{} verification photo", photo.width, photo.height);
                CaptureEvent::PhotoCaptured(photo)
            }
            Err(err) => {
                log_warn!("photo capture failed: {err}");
                CaptureEvent::CameraFailed(AttendanceError::CameraUnavailable(err.to_string()))
            }
        };
        self.advance(&attempt, event).await
    }

    /// Re-validates the capture and writes the record.
    pub async fn confirm(&self) -> Result<CaptureSnapshot, InvalidTransition> {
        let (attempt, action, capture) = {
            let inner = self.inner.lock().await;
            match (&inner.state, &inner.attempt) {
                (CaptureState::Confirming { action, capture, .. }, Some(attempt)) => {
                    (attempt.clone(), *action, capture.clone())
                }
                (state, _) => {
                    return Err(InvalidTransition {
                        phase: state.phase(),
                        event: "Confirm",
                    })
                }
            }
        };

        let outcome = match self.guarded(&attempt, self.commit(action, capture)).await {
            None => return Ok(self.snapshot().await),
            Some(outcome) => outcome,
        };

        match outcome {
            CommitOutcome::Saved {
                reading,
                compliance,
                record,
            } => {
                log_info!("{} recorded as {}", action.as_str(), record.id);
                self.advance(&attempt, CaptureEvent::Revalidated { reading, compliance })
                    .await?;
                self.advance(&attempt, CaptureEvent::Committed(record)).await
            }
            CommitOutcome::OutOfBounds {
                reading,
                compliance,
                reason,
            } => {
                log_info!("{} rejected: not at an authorized location", action.as_str());
                self.advance(&attempt, CaptureEvent::Revalidated { reading, compliance })
                    .await?;
                self.advance(&attempt, CaptureEvent::ComplianceFailed(reason))
                    .await
            }
            CommitOutcome::Refused(reason) => {
                self.advance(&attempt, CaptureEvent::CommitRefused(reason))
                    .await
            }
            CommitOutcome::Failed(error) => {
                log_error!("{} not saved: {error}", action.as_str());
                self.advance(&attempt, CaptureEvent::CommitFailed(error))
                    .await
            }
        }
    }

    /// Resubmits a capture kept after a failed save.
    pub async fn retry_commit(&self) -> Result<CaptureSnapshot, InvalidTransition> {
        {
            let mut inner = self.inner.lock().await;
            let next = inner.state.clone().apply(CaptureEvent::RetryCommit)?;
            inner.state = next;
        }
        self.confirm().await
    }

    pub async fn discard(&self) -> Result<CaptureSnapshot, InvalidTransition> {
        self.finish(CaptureEvent::Discard).await
    }

    pub async fn reset(&self) -> Result<CaptureSnapshot, InvalidTransition> {
        self.finish(CaptureEvent::Reset).await
    }

    /// Abandons the attempt from any state and releases the camera.
    pub async fn cancel(&self) -> CaptureSnapshot {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            if let Some(attempt) = inner.attempt.take() {
                attempt.cancel();
            }
            inner.state = CaptureState::Idle;
            inner.state.snapshot()
        };

        self.release_camera().await;
        snapshot
    }

    /// The user's records with `date` in `[from, to]`.
    pub async fn history(&self, from: NaiveDate, to: NaiveDate) -> anyhow::Result<Vec<AttendanceRecord>> {
        self.deps
            .records
            .find_by_user_between(&self.user_id, from, to)
            .await
    }

    async fn finish(&self, event: CaptureEvent) -> Result<CaptureSnapshot, InvalidTransition> {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            let next = inner.state.clone().apply(event)?;
            inner.state = next;
            // Work still in flight for this attempt must not land afterwards.
            if let Some(attempt) = inner.attempt.take() {
                attempt.cancel();
            }
            inner.state.snapshot()
        };
        self.release_camera().await;
        Ok(snapshot)
    }

    /// Keeps `stream` only if this attempt is still waiting for it; anything
    /// else gets the stream stopped.
    async fn install_stream(
        &self,
        attempt: &CancellationToken,
        stream: Box<dyn CameraStream>,
    ) -> CaptureSnapshot {
        let mut unused = {
            let mut inner = self.inner.lock().await;
            let next = if attempt.is_cancelled() {
                None
            } else {
                inner.state.clone().apply(CaptureEvent::CameraReady).ok()
            };
            match next {
                Some(next) => {
                    inner.state = next;
                    // Lock order is inner, then stream.
                    *self.stream.lock().await = Some(stream);
                    return inner.state.snapshot();
                }
                None => stream,
            }
        };

        unused.stop().await;
        log_info!("stopped camera stream the attempt no longer needs");
        self.snapshot().await
    }

    async fn release_camera(&self) {
        if let Some(mut stream) = self.stream.lock().await.take() {
            stream.stop().await;
            log_info!("camera stream released");
        }
    }

    async fn attempt_in(
        &self,
        event: &'static str,
        allowed: impl Fn(&CaptureState) -> bool,
    ) -> Result<CancellationToken, InvalidTransition> {
        let inner = self.inner.lock().await;
        match &inner.attempt {
            Some(attempt) if allowed(&inner.state) => Ok(attempt.clone()),
            _ => Err(InvalidTransition {
                phase: inner.state.phase(),
                event,
            }),
        }
    }

    /// Applies `event` unless the attempt was cancelled in the meantime, in
    /// which case the late result is dropped.
    async fn advance(
        &self,
        attempt: &CancellationToken,
        event: CaptureEvent,
    ) -> Result<CaptureSnapshot, InvalidTransition> {
        let mut inner = self.inner.lock().await;
        if attempt.is_cancelled() {
            return Ok(inner.state.snapshot());
        }
        let next = inner.state.clone().apply(event)?;
        inner.state = next;
        Ok(inner.state.snapshot())
    }

    async fn guarded<F: std::future::Future>(
        &self,
        attempt: &CancellationToken,
        work: F,
    ) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = attempt.cancelled() => None,
            output = work => Some(output),
        }
    }

    async fn today_record(&self) -> anyhow::Result<Option<AttendanceRecord>> {
        let today = attendance_date(Utc::now(), &Local);
        let records = self
            .deps
            .records
            .find_by_user_between(&self.user_id, today, today)
            .await?;
        Ok(records.into_iter().next())
    }

    async fn commit(&self, action: ClockAction, capture: PendingCapture) -> CommitOutcome {
        let today = match self.today_record().await {
            Ok(today) => today,
            Err(err) => return CommitOutcome::Failed(persistence(err)),
        };
        // The record may have changed while the user was posing.
        if let Err(reason) = check_precondition(action, today.as_ref()) {
            return CommitOutcome::Refused(reason);
        }

        let reading = if capture
            .reading
            .is_fresh(Utc::now(), self.settings.reading_max_age())
        {
            capture.reading
        } else {
            log_info!("position reading is stale, locating again");
            match self.deps.resolver.resolve(&self.settings.location).await {
                Ok(reading) => reading,
                Err(err) => return CommitOutcome::Failed(err.into()),
            }
        };

        let compliance = match self.compliance_for(&reading).await {
            Ok(compliance) => compliance,
            Err(err) => return CommitOutcome::Failed(persistence(err)),
        };
        if !compliance.is_compliant {
            let reason = compliance
                .reason
                .clone()
                .unwrap_or(NonCompliance::NoAuthorizedLocations);
            return CommitOutcome::OutOfBounds {
                reading,
                compliance,
                reason,
            };
        }

        // Nothing is written until the slow lookups are done.
        let address = self.address_for(&reading.coords).await;

        let photo = NewPhoto {
            user_id: self.user_id.to_string(),
            content_type: "image/jpeg",
            width: capture.photo.width,
            height: capture.photo.height,
            data: capture.photo.jpeg.as_ref().clone(),
        };
        let photo_ref = match self.deps.records.save_photo(photo).await {
            Ok(photo_ref) => photo_ref,
            Err(err) => return CommitOutcome::Failed(persistence(err)),
        };

        let now = Utc::now();
        let event = ClockEvent {
            time: now,
            address,
            position: reading.clone(),
            device_fingerprint: self.fingerprint.to_string(),
            photo_ref,
            token_value: self.token.current().payload,
            matched_location: compliance.matched_location().map(str::to_owned),
        };

        let saved = match (action, today) {
            (ClockAction::ClockIn, _) => {
                let local = now.with_timezone(&Local);
                let (status, late_by_minutes) = lateness(local.naive_local(), &self.shift);
                self.deps
                    .records
                    .create(NewAttendanceRecord {
                        user_id: self.user_id.to_string(),
                        date: local.date_naive(),
                        clock_in: event,
                        status,
                        late_by_minutes,
                    })
                    .await
            }
            (ClockAction::ClockOut, Some(record)) => {
                self.deps
                    .records
                    .update(
                        &record.id,
                        AttendanceUpdate {
                            worked_minutes: worked_minutes(record.clock_in.time, now),
                            clock_out: event,
                            status: AttendanceStatus::Completed,
                        },
                    )
                    .await
            }
            (ClockAction::ClockOut, None) => {
                return CommitOutcome::Refused(AttendanceError::NotYetClockedIn)
            }
        };

        match saved {
            Ok(record) => CommitOutcome::Saved {
                reading,
                compliance,
                record,
            },
            Err(err) => CommitOutcome::Failed(persistence(err)),
        }
    }

    async fn compliance_for(&self, reading: &PositionReading) -> anyhow::Result<ComplianceResult> {
        let zones = self.deps.directory.allowed_zones().await?;
        let networks = self.deps.directory.allowed_networks().await?;
        let network = self.deps.resolver.current_network().await;
        Ok(evaluate(reading, &zones, network.as_ref(), &networks))
    }

    async fn address_for(&self, coords: &Coordinate) -> String {
        let Some(addresses) = &self.deps.addresses else {
            return format_coordinates(coords);
        };
        match addresses.reverse(coords).await {
            Ok(address) if !address.trim().is_empty() => address,
            Ok(_) => format_coordinates(coords),
            Err(err) => {
                log_warn!("reverse geocoding failed: {err:#}");
                format_coordinates(coords)
            }
        }
    }
}

fn persistence(err: anyhow::Error) -> AttendanceError {
    AttendanceError::PersistenceFailure(format!("{err:#}"))
}
