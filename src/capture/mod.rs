pub mod camera;
pub mod controller;
pub mod policy;
pub mod state;

pub use camera::{Camera, CameraError, CameraFacing, CameraStream, CapturedPhoto, MockCamera};
pub use controller::{CaptureController, CaptureDeps};
pub use state::{
    CaptureEvent, CapturePhase, CaptureSnapshot, CaptureState, InvalidTransition, PendingCapture,
};
