//! Camera capability and verification-photo decoding.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::ImageFormat;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CameraFacing {
    #[default]
    User,
    Environment,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("no camera device found")]
    NoDevice,
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera not supported on this device")]
    Unsupported,
    #[error("frame capture failed: {0}")]
    CaptureFailed(String),
    #[error("captured frame is not a valid JPEG: {0}")]
    InvalidFrame(String),
}

/// An open camera stream. Must be stopped once the frame is taken or the
/// attempt is abandoned.
#[async_trait]
pub trait CameraStream: Send {
    async fn capture_frame(&mut self) -> Result<Vec<u8>, CameraError>;

    /// Stops every track of the stream. Stopping twice is harmless.
    async fn stop(&mut self);
}

#[automock]
#[async_trait]
pub trait Camera: Send + Sync {
    async fn acquire_stream(&self, facing: CameraFacing) -> Result<Box<dyn CameraStream>, CameraError>;
}

#[derive(Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    pub jpeg: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

impl fmt::Debug for CapturedPhoto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedPhoto")
            .field("bytes", &self.jpeg.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

impl CapturedPhoto {
    /// Decodes the frame to make sure it is a usable JPEG before it is kept.
    pub fn from_jpeg(bytes: Vec<u8>, captured_at: DateTime<Utc>) -> Result<Self, CameraError> {
        let img = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
            .map_err(|err| CameraError::InvalidFrame(err.to_string()))?;

        Ok(Self {
            width: img.width(),
            height: img.height(),
            jpeg: Arc::new(bytes),
            captured_at,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};

    use image::{DynamicImage, ImageBuffer, Rgb};

    use super::*;

    pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let buffer = ImageBuffer::from_pixel(width, height, Rgb([200u8, 120, 40]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(buffer)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .expect("encode jpeg");
        bytes
    }

    /// Stream that hands out a fixed frame and records whether it was stopped.
    pub struct FakeStream {
        pub frame: Result<Vec<u8>, CameraError>,
        pub stopped: Arc<AtomicBool>,
    }

    #[async_trait]
    impl CameraStream for FakeStream {
        async fn capture_frame(&mut self) -> Result<Vec<u8>, CameraError> {
            self.frame.clone()
        }

        async fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    pub fn camera_with_frame(frame: Vec<u8>, stopped: Arc<AtomicBool>) -> MockCamera {
        let mut camera = MockCamera::new();
        camera.expect_acquire_stream().returning(move |_| {
            Ok(Box::new(FakeStream {
                frame: Ok(frame.clone()),
                stopped: Arc::clone(&stopped),
            }) as Box<dyn CameraStream>)
        });
        camera
    }
}
