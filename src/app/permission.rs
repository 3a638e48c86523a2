// SPDX-License-Identifier: GPL-3.0-only

//! Camera permission resolution
//!
//! Decides whether a stream request is worth making. A platform without
//! camera support and a permission the user already denied both fail before
//! any request, so the user never sees a native prompt that is certain to be
//! rejected.

use crate::backends::camera::{CameraPlatform, PermissionState};
use crate::errors::CameraError;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct PermissionResolver {
    platform: Arc<dyn CameraPlatform>,
    last_observed: Option<PermissionState>,
}

impl PermissionResolver {
    pub fn new(platform: Arc<dyn CameraPlatform>) -> Self {
        Self {
            platform,
            last_observed: None,
        }
    }

    /// Best-effort permission query
    ///
    /// Returns `None` when the platform has no permission API or the query
    /// fails. A known state is cached for [`last_observed`](Self::last_observed).
    pub async fn query_permission(&mut self) -> Option<PermissionState> {
        match self.platform.query_permission().await {
            Ok(Some(state)) => {
                debug!(%state, "Camera permission queried");
                self.last_observed = Some(state);
                Some(state)
            }
            Ok(None) => {
                debug!("Platform has no permission API");
                None
            }
            Err(e) => {
                warn!(error = %e, "Permission query failed");
                None
            }
        }
    }

    /// Check whether a stream request may be issued
    pub async fn ensure_permission(&mut self) -> Result<(), CameraError> {
        if !self.platform.supports_media_devices() {
            return Err(CameraError::Unsupported);
        }
        match self.query_permission().await {
            Some(PermissionState::Denied) => Err(CameraError::PermissionBlocked),
            _ => Ok(()),
        }
    }

    /// Most recent state reported by the platform
    pub fn last_observed(&self) -> Option<PermissionState> {
        self.last_observed
    }

    /// Whether the platform ever reported the permission as denied
    pub fn observed_denied(&self) -> bool {
        self.last_observed == Some(PermissionState::Denied)
    }
}
