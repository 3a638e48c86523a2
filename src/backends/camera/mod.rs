// SPDX-License-Identifier: MPL-2.0

//! Camera platform abstraction
//!
//! The capture core never talks to a camera API directly. It consumes the
//! [`CameraPlatform`] trait, which models the three calls a media platform
//! offers (request a stream, enumerate devices, query permission), and the
//! [`MediaStream`] trait for the handle a successful request returns.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   Capture Session   │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  Stream Controller  │  ← Owns the single live MediaStream
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraPlatform Trait│  ← Common interface
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//! ┌────────┐  ┌─────────┐
//! │PipeWire│  │ Virtual │
//! └────────┘  └─────────┘
//! ```

pub mod pipewire;
pub mod portal;
pub mod types;

pub use types::*;

use crate::backends::virtual_camera::VirtualPlatform;
use crate::config::CameraSource;
use async_trait::async_trait;
use std::sync::Arc;

/// Media platform consumed by the stream controller
#[async_trait]
pub trait CameraPlatform: Send + Sync {
    /// Whether this platform can capture video at all
    fn supports_media_devices(&self) -> bool;

    /// Whether [`enumerate_devices`](Self::enumerate_devices) is available
    fn supports_device_enumeration(&self) -> bool {
        true
    }

    /// Query the current camera permission
    ///
    /// # Returns
    /// * `Ok(Some(state))` - Permission state reported by the platform
    /// * `Ok(None)` - The platform has no permission API
    /// * `Err(BackendError)` - The query itself failed
    async fn query_permission(&self) -> BackendResult<Option<PermissionState>>;

    /// Request a live video stream satisfying `constraints`
    ///
    /// The facing mode is mandatory: a platform without a matching camera
    /// fails with [`AcquireError::Overconstrained`] or
    /// [`AcquireError::NotFound`]. The resolution is a preference.
    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, AcquireError>;

    /// Enumerate media devices known to the platform
    async fn enumerate_devices(&self) -> BackendResult<Vec<MediaDeviceInfo>>;
}

/// A live media stream
///
/// Dropping a stream must release the device; [`stop`](Self::stop) does the
/// same eagerly and is idempotent.
#[async_trait]
pub trait MediaStream: Send + Sync {
    /// Tracks carried by this stream
    fn tracks(&self) -> Vec<TrackInfo>;

    /// Receiver of the most recent decoded frame
    fn frames(&self) -> FrameReceiver;

    /// Start delivering frames to the sink
    async fn play(&mut self) -> BackendResult<()>;

    /// Stop all tracks and release the device
    fn stop(&mut self);

    /// Whether the stream still holds the device
    fn is_live(&self) -> bool;
}

/// Create the platform for a configured camera source
pub fn get_platform(source: CameraSource) -> Arc<dyn CameraPlatform> {
    match source {
        CameraSource::PipeWire => Arc::new(pipewire::PipeWirePlatform::new()),
        CameraSource::Virtual => Arc::new(VirtualPlatform::demo()),
    }
}
