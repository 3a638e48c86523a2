// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the photobooth

use crate::backends::camera::types::BackendError;
use crate::fl;
use crate::pipelines::photo::OverlayError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Camera-related errors
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
    /// Frame compositing errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Intake validation errors
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Storage/filesystem errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    /// Overlay artwork errors
    #[error("Overlay error: {0}")]
    Overlay(#[from] OverlayError),
    /// Platform backend errors
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    /// Terminal / stdio errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Camera failures that end a session in the error state
///
/// Every variant maps to one user-readable message and a single recovery
/// action (retry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    /// The platform has no media-device capability
    #[error("camera capture is not supported on this platform")]
    Unsupported,
    /// Permission was denied before this session asked for it
    #[error("camera permission is blocked")]
    PermissionBlocked,
    /// Permission was denied at prompt time
    #[error("camera permission was denied")]
    PermissionDenied,
    /// No camera, or no camera satisfying the constraints
    #[error("no usable camera was found")]
    NoDevice,
    /// Any other acquisition failure
    #[error("camera failed to start: {0}")]
    Unknown(String),
    /// The drawing surface could not be created or encoded
    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),
}

impl CameraError {
    /// Localized message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            CameraError::Unsupported => fl!("error-unsupported"),
            CameraError::PermissionBlocked => fl!("error-permission-blocked"),
            CameraError::PermissionDenied => fl!("error-permission-denied"),
            CameraError::NoDevice => fl!("error-no-device"),
            CameraError::Unknown(_) => fl!("error-unknown"),
            CameraError::CaptureUnavailable(_) => fl!("error-capture-unavailable"),
        }
    }
}

/// Frame compositing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The raster surface could not be allocated
    #[error("cannot create a {width}x{height} drawing surface")]
    SurfaceUnavailable { width: u32, height: u32 },
    /// The video frame buffer does not match its declared geometry
    #[error("invalid video frame: {0}")]
    InvalidFrame(String),
    /// The text layer could not be laid out
    #[error("text layout failed: {0}")]
    Text(String),
    /// PNG encoding failed
    #[error("encoding failed: {0}")]
    Encoding(String),
    /// Compositing task was cancelled or panicked
    #[error("compositing task failed: {0}")]
    Task(String),
}

impl From<CaptureError> for CameraError {
    fn from(err: CaptureError) -> Self {
        CameraError::CaptureUnavailable(err.to_string())
    }
}

/// Intake validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("name must not be empty")]
    MissingName,
    #[error("branch must not be empty")]
    MissingBranch,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value: {0}")]
    Invalid(String),
}

/// Download errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no download directory available")]
    NoDirectory,
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
