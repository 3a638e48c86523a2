// SPDX-License-Identifier: GPL-3.0-only

//! Session state types

use crate::errors::{CameraError, IdentityError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;
use std::sync::Arc;

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Preview,
    Captured,
    Error,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Preview => write!(f, "preview"),
            CaptureState::Captured => write!(f, "captured"),
            CaptureState::Error => write!(f, "error"),
        }
    }
}

/// Internal session phase
///
/// Carries the payload that only exists in its state, so a captured image
/// cannot outlive `Captured` and an error cannot outlive `Error`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    #[default]
    Preview,
    Captured(CapturedImage),
    Error(CameraError),
}

impl Phase {
    pub fn state(&self) -> CaptureState {
        match self {
            Phase::Preview => CaptureState::Preview,
            Phase::Captured(_) => CaptureState::Captured,
            Phase::Error(_) => CaptureState::Error,
        }
    }

    pub fn image(&self) -> Option<&CapturedImage> {
        match self {
            Phase::Captured(image) => Some(image),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&CameraError> {
        match self {
            Phase::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// Display identity collected by the intake step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    name: String,
    branch: String,
}

impl Identity {
    /// Trim both fields and reject blanks
    pub fn new(name: &str, branch: &str) -> Result<Self, IdentityError> {
        let name = name.trim();
        let branch = branch.trim();
        if name.is_empty() {
            return Err(IdentityError::MissingName);
        }
        if branch.is_empty() {
            return Err(IdentityError::MissingBranch);
        }
        Ok(Self {
            name: name.to_string(),
            branch: branch.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }
}

/// Capability snapshot of the current camera setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CameraSupport {
    /// An environment-facing camera is likely available
    pub has_environment: bool,
    /// More than one video input is present
    pub has_multiple_inputs: bool,
}

/// Encoded PNG produced by one capture
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedImage {
    width: u32,
    height: u32,
    png: Arc<[u8]>,
}

impl CapturedImage {
    pub fn new(width: u32, height: u32, png: Vec<u8>) -> Self {
        Self {
            width,
            height,
            png: Arc::from(png.into_boxed_slice()),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Encoded PNG bytes
    pub fn bytes(&self) -> &[u8] {
        &self.png
    }

    /// Encoded image as a `data:image/png;base64,...` URL
    pub fn to_data_url(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.png.len())
            .finish()
    }
}
