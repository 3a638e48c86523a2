// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Requested camera orientation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera, facing the user
    #[default]
    User,
    /// Rear camera, facing away from the user
    Environment,
    Left,
    Right,
}

impl FacingMode {
    /// Mode used by the switch action: user and environment swap, side
    /// cameras go to environment.
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::Environment => FacingMode::User,
            FacingMode::User | FacingMode::Left | FacingMode::Right => FacingMode::Environment,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::User => "user",
            FacingMode::Environment => "environment",
            FacingMode::Left => "left",
            FacingMode::Right => "right",
        }
    }

    /// Map a reported camera location ("front", "back", "external") to a facing mode
    pub fn from_location(location: &str) -> Option<Self> {
        match location.trim().to_ascii_lowercase().as_str() {
            "front" | "user" => Some(FacingMode::User),
            "back" | "rear" | "environment" => Some(FacingMode::Environment),
            "left" => Some(FacingMode::Left),
            "right" => Some(FacingMode::Right),
            _ => None,
        }
    }
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Camera permission state as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    /// The user will be asked when a stream is requested
    Prompt,
    Denied,
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionState::Granted => write!(f, "granted"),
            PermissionState::Prompt => write!(f, "prompt"),
            PermissionState::Denied => write!(f, "denied"),
        }
    }
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Constraints passed to [`CameraPlatform::request_stream`](super::CameraPlatform::request_stream)
///
/// The facing mode is mandatory; the resolution is only a preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing_mode: FacingMode,
    pub ideal_resolution: Resolution,
}

/// Kind of a media device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    VideoInput,
}

/// Entry returned by device enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    /// Human readable label, may be empty until permission is granted
    pub label: String,
}

/// Capability metadata of a live track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackCapabilities {
    /// Facing modes this track can be constrained to
    pub facing_modes: Vec<FacingMode>,
    pub max_resolution: Option<Resolution>,
}

/// A single track of a live stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub label: String,
    pub capabilities: TrackCapabilities,
}

/// A single RGBA frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    pub data: Arc<[u8]>,
    /// Timestamp when frame was captured (for latency diagnostics)
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Wrap a tightly packed RGBA image
    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let width = image.width();
        let height = image.height();
        Self {
            width,
            height,
            stride: width * 4,
            data: Arc::from(image.into_raw().into_boxed_slice()),
            captured_at: Instant::now(),
        }
    }

    /// Check that the buffer covers the declared geometry
    pub fn is_valid(&self) -> bool {
        if self.width == 0 || self.height == 0 || self.stride < self.width * 4 {
            return false;
        }
        let required = self.stride as usize * (self.height as usize - 1) + self.width as usize * 4;
        self.data.len() >= required
    }

    /// Copy into a tightly packed RGBA image, dropping row padding
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        if !self.is_valid() {
            return None;
        }
        let row_bytes = self.width as usize * 4;
        if self.stride as usize == row_bytes {
            let len = row_bytes * self.height as usize;
            return RgbaImage::from_raw(self.width, self.height, self.data[..len].to_vec());
        }

        let mut packed = Vec::with_capacity(row_bytes * self.height as usize);
        for row in self.data.chunks(self.stride as usize).take(self.height as usize) {
            packed.extend_from_slice(&row[..row_bytes]);
        }
        RgbaImage::from_raw(self.width, self.height, packed)
    }

    /// Sample one pixel as RGB, clamping coordinates to the frame
    pub fn sample_rgb(&self, x: u32, y: u32) -> (u8, u8, u8) {
        if self.width == 0 || self.height == 0 {
            return (0, 0, 0);
        }
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        let idx = (y * self.stride + x * 4) as usize;
        if idx + 2 < self.data.len() {
            (self.data[idx], self.data[idx + 1], self.data[idx + 2])
        } else {
            (0, 0, 0)
        }
    }
}

/// Frame receiver type for preview streams (latest frame wins)
pub type FrameReceiver = tokio::sync::watch::Receiver<Option<Arc<CameraFrame>>>;

/// Frame sender type for preview streams
pub type FrameSender = tokio::sync::watch::Sender<Option<Arc<CameraFrame>>>;

/// Typed stream acquisition failure
///
/// Mirrors the failure names media platforms report when a stream request is
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    /// The user or the system refused access
    #[error("not allowed: {0}")]
    NotAllowed(String),
    /// Access is forbidden in this context
    #[error("security error: {0}")]
    Security(String),
    /// No device matched the request
    #[error("device not found: {0}")]
    NotFound(String),
    /// A mandatory constraint cannot be satisfied
    #[error("constraint '{constraint}' cannot be satisfied")]
    Overconstrained { constraint: String },
    /// The device exists but could not be opened (busy, hardware error)
    #[error("device not readable: {0}")]
    NotReadable(String),
    /// The request was interrupted
    #[error("aborted: {0}")]
    Aborted(String),
    #[error("{0}")]
    Other(String),
}

impl AcquireError {
    /// Failures that mean "this facing mode does not exist here"
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(
            self,
            AcquireError::NotFound(_) | AcquireError::Overconstrained { .. }
        )
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Backend is not available on this system
    #[error("Backend not available: {0}")]
    NotAvailable(String),
    /// Failed to initialize backend
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}
