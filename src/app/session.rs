// SPDX-License-Identifier: GPL-3.0-only

//! Capture session state machine
//!
//! ```text
//!            mount / retake / retry
//!                     │
//!                     ▼
//!   ┌─────────── Preview ◀──── switch_camera
//!   │ capture         │
//!   ▼                 │ start failed / compositing failed
//! Captured            ▼
//!   │ retake        Error ── retry ──▶ Preview
//!   └──────────────▶ Preview
//! ```
//!
//! The session issues commands only. The stream handle belongs to the
//! [`StreamController`]; the compositor reads the latest frame from the
//! [`VideoSink`].

use crate::app::state::{CameraSupport, CaptureState, CapturedImage, Identity, Phase};
use crate::app::stream_controller::{StartOutcome, StreamController, StreamStatus, VideoSink};
use crate::backends::camera::{CameraPlatform, FacingMode};
use crate::config::Config;
use crate::errors::{CameraError, IdentityError, StorageError};
use crate::pipelines::photo::{FrameCompositor, OverlaySlot};
use crate::storage;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Point-in-time view of a session for front ends
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: CaptureState,
    pub loading: bool,
    pub streaming: bool,
    pub facing_mode: FacingMode,
    pub support: CameraSupport,
    pub error: Option<CameraError>,
    pub image: Option<CapturedImage>,
    pub identity: Option<Identity>,
    pub can_capture: bool,
    pub can_switch: bool,
    pub last_download: Option<PathBuf>,
}

pub struct CaptureSession {
    controller: StreamController,
    compositor: FrameCompositor,
    overlay: OverlaySlot,
    identity: Option<Identity>,
    phase: Phase,
    mounted: Arc<AtomicBool>,
    download_dir: Option<PathBuf>,
    last_download: Option<PathBuf>,
}

impl CaptureSession {
    pub fn new(platform: Arc<dyn CameraPlatform>, config: &Config, overlay: OverlaySlot) -> Self {
        let mounted = Arc::new(AtomicBool::new(false));
        Self {
            controller: StreamController::new(
                platform,
                Arc::clone(&mounted),
                config.ideal_resolution,
                config.metadata_timeout(),
            ),
            compositor: FrameCompositor::new(config.text.clone(), config.fallback_surface),
            overlay,
            identity: None,
            phase: Phase::Preview,
            mounted,
            download_dir: config.resolved_download_dir(),
            last_download: None,
        }
    }

    /// Flag cleared on teardown; shared with whoever may tear the session down
    pub fn mount_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.mounted)
    }

    pub fn sink(&self) -> VideoSink {
        self.controller.sink()
    }

    pub fn stream_status(&self) -> watch::Receiver<StreamStatus> {
        self.controller.subscribe()
    }

    pub fn state(&self) -> CaptureState {
        self.phase.state()
    }

    pub fn captured_image(&self) -> Option<&CapturedImage> {
        self.phase.image()
    }

    pub fn error(&self) -> Option<&CameraError> {
        self.phase.error()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn facing_mode(&self) -> FacingMode {
        self.controller.facing_mode()
    }

    pub fn is_loading(&self) -> bool {
        self.controller.status().loading
    }

    /// Capture is allowed in preview, when idle and after intake
    pub fn can_capture(&self) -> bool {
        self.phase == Phase::Preview && !self.is_loading() && self.identity.is_some()
    }

    /// Switching is offered only in preview with a rear camera available
    pub fn can_switch(&self) -> bool {
        self.phase == Phase::Preview && self.controller.can_switch()
    }

    /// Start the user-facing camera on a mounted session
    ///
    /// The mount flag is raised by [`SessionHandle::spawn`](crate::app::SessionHandle::spawn).
    pub(crate) async fn enter_preview(&mut self) {
        info!("Session mounted");
        self.start(FacingMode::User).await;
    }

    /// Accept the intake identity
    ///
    /// Only the first valid identity is kept. Returns whether it was accepted.
    pub fn submit_identity(&mut self, name: &str, branch: &str) -> Result<bool, IdentityError> {
        if self.identity.is_some() {
            debug!("Identity already set, ignoring");
            return Ok(false);
        }
        let identity = Identity::new(name, branch)?;
        info!(name = identity.name(), branch = identity.branch(), "Identity submitted");
        self.identity = Some(identity);
        Ok(true)
    }

    /// Composite the live frame and stop the stream
    ///
    /// Returns `false` without side effects when capture is not allowed.
    pub async fn capture(&mut self) -> bool {
        if !self.can_capture() {
            debug!(state = %self.state(), loading = self.is_loading(), "Capture ignored");
            return false;
        }

        let frame = self.controller.sink().latest_frame();
        if frame.is_none() {
            warn!("No frame available, capturing on the fallback surface");
        }
        let result = self
            .compositor
            .compose_blocking(frame, self.overlay.get(), self.identity.clone())
            .await;

        self.controller.stop();
        match result {
            Ok(image) => {
                info!(width = image.width(), height = image.height(), "Photo captured");
                self.phase = Phase::Captured(image);
                true
            }
            Err(e) => {
                warn!(error = %e, "Capture unavailable");
                self.phase = Phase::Error(e.into());
                false
            }
        }
    }

    /// Discard the captured image and restart the camera
    pub async fn retake(&mut self) {
        if self.state() != CaptureState::Captured {
            debug!(state = %self.state(), "Retake ignored");
            return;
        }
        self.restart().await;
    }

    /// Clear the error and restart the camera
    pub async fn retry(&mut self) {
        if self.state() != CaptureState::Error {
            debug!(state = %self.state(), "Retry ignored");
            return;
        }
        self.restart().await;
    }

    /// Toggle between the user and environment cameras
    pub async fn switch_camera(&mut self) {
        if !self.can_switch() {
            debug!("Switch ignored");
            return;
        }
        self.phase = Phase::Preview;
        if let Some(result) = self.controller.switch_camera().await {
            self.apply_start(result);
        }
    }

    /// Save the captured image into the download directory
    ///
    /// Returns `Ok(None)` without touching the filesystem when nothing was
    /// captured.
    pub async fn download(&mut self) -> Result<Option<PathBuf>, StorageError> {
        let Some(image) = self.phase.image() else {
            debug!("Nothing to download");
            return Ok(None);
        };
        let dir = self.download_dir.as_ref().ok_or(StorageError::NoDirectory)?;
        let path = storage::save_capture(image, dir).await?;
        self.last_download = Some(path.clone());
        Ok(Some(path))
    }

    /// Stop the camera regardless of state
    pub fn teardown(&mut self) {
        self.mounted.store(false, Ordering::Release);
        self.controller.stop();
        info!("Session torn down");
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let status = self.controller.status();
        SessionSnapshot {
            state: self.state(),
            loading: status.loading,
            streaming: status.streaming,
            facing_mode: status.facing_mode,
            support: status.support,
            error: self.phase.error().cloned(),
            image: self.phase.image().cloned(),
            identity: self.identity.clone(),
            can_capture: self.can_capture(),
            can_switch: self.can_switch(),
            last_download: self.last_download.clone(),
        }
    }

    async fn restart(&mut self) {
        // Image and error go before the new start is issued
        self.phase = Phase::Preview;
        let mode = self.controller.facing_mode();
        self.start(mode).await;
    }

    async fn start(&mut self, mode: FacingMode) {
        let result = self.controller.start(mode).await;
        self.apply_start(result);
    }

    fn apply_start(&mut self, result: Result<StartOutcome, CameraError>) {
        match result {
            Ok(StartOutcome::Started { .. }) => self.phase = Phase::Preview,
            Ok(StartOutcome::Discarded) => debug!("Start discarded after teardown"),
            Err(e) if self.mounted.load(Ordering::Acquire) => {
                warn!(error = %e, "Camera unavailable");
                self.phase = Phase::Error(e);
            }
            Err(e) => debug!(error = %e, "Start failed after teardown"),
        }
    }
}
