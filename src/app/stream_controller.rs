// SPDX-License-Identifier: GPL-3.0-only

//! Camera stream lifecycle
//!
//! The [`StreamController`] exclusively owns the live [`MediaStream`]. Every
//! start stops the previous stream before a new one is requested, so at most
//! one handle is alive even when starts are issued back to back. A start that
//! resolves after the owner was torn down releases its stream immediately.
//!
//! ```text
//! start(mode)
//!   ├─ loading, clear error, support = {false, false}
//!   ├─ ensure_permission()          ──▶ Err(Unsupported | PermissionBlocked)
//!   ├─ stop()
//!   ├─ request_stream(mode, 1600x900 ideal)
//!   │     └─ unsatisfiable && mode != user ──▶ one fallback to start(user),
//!   │                                             skipped once unmounted
//!   ├─ unmounted? release and return Discarded
//!   ├─ attach sink, await first frame, play (failure ignored)
//!   ├─ detect support (capabilities, device labels)
//!   └─ facing = mode, Started
//! ```

use crate::app::permission::PermissionResolver;
use crate::app::state::CameraSupport;
use crate::backends::camera::{
    AcquireError, CameraFrame, CameraPlatform, DeviceKind, FacingMode, FrameReceiver,
    MediaStream, Resolution, StreamConstraints,
};
use crate::constants::heuristics;
use crate::errors::CameraError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Stream state published to front ends
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamStatus {
    /// A start sequence is in flight
    pub loading: bool,
    /// Facing mode of the last successful start, reset to user by a
    /// terminal error
    pub facing_mode: FacingMode,
    pub support: CameraSupport,
    /// A stream handle is held
    pub streaming: bool,
    /// Failure of the last start, cleared when a new start begins
    pub error: Option<CameraError>,
}

/// Result of a start that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A stream is live in `facing_mode`
    Started {
        facing_mode: FacingMode,
        /// The requested mode was unavailable and the user camera was used
        fell_back: bool,
    },
    /// The owner was torn down while the request was pending; the stream was
    /// released and nothing changed
    Discarded,
}

#[derive(Default)]
struct SinkState {
    frames: Option<FrameReceiver>,
    playing: bool,
}

/// Where the live stream is rendered
///
/// Front ends and the compositor read the latest frame from here; only the
/// controller attaches and detaches streams.
#[derive(Clone, Default)]
pub struct VideoSink {
    inner: Arc<Mutex<SinkState>>,
}

impl VideoSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn attach(&self, frames: FrameReceiver) {
        let mut state = self.lock();
        state.frames = Some(frames);
        state.playing = false;
    }

    fn detach(&self) {
        let mut state = self.lock();
        state.frames = None;
        state.playing = false;
    }

    fn set_playing(&self, playing: bool) {
        self.lock().playing = playing;
    }

    pub fn is_attached(&self) -> bool {
        self.lock().frames.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    /// Most recent frame of the attached stream
    pub fn latest_frame(&self) -> Option<Arc<CameraFrame>> {
        self.lock()
            .frames
            .as_ref()
            .and_then(|frames| frames.borrow().clone())
    }

    /// Native dimensions of the attached stream, once known
    pub fn dimensions(&self) -> Option<Resolution> {
        self.latest_frame()
            .map(|frame| Resolution::new(frame.width, frame.height))
    }
}

/// Why a single start attempt failed
enum StartFailure {
    Permission(CameraError),
    Acquire(AcquireError),
}

pub struct StreamController {
    platform: Arc<dyn CameraPlatform>,
    permission: PermissionResolver,
    handle: Option<Box<dyn MediaStream>>,
    sink: VideoSink,
    mounted: Arc<AtomicBool>,
    ideal_resolution: Resolution,
    metadata_timeout: Duration,
    status: watch::Sender<StreamStatus>,
}

impl StreamController {
    pub fn new(
        platform: Arc<dyn CameraPlatform>,
        mounted: Arc<AtomicBool>,
        ideal_resolution: Resolution,
        metadata_timeout: Duration,
    ) -> Self {
        let (status, _) = watch::channel(StreamStatus::default());
        Self {
            permission: PermissionResolver::new(Arc::clone(&platform)),
            platform,
            handle: None,
            sink: VideoSink::new(),
            mounted,
            ideal_resolution,
            metadata_timeout,
            status,
        }
    }

    pub fn sink(&self) -> VideoSink {
        self.sink.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> StreamStatus {
        self.status.borrow().clone()
    }

    pub fn facing_mode(&self) -> FacingMode {
        self.status.borrow().facing_mode
    }

    pub fn is_streaming(&self) -> bool {
        self.handle.is_some()
    }

    /// Switching is offered while streaming, idle and with a rear camera
    pub fn can_switch(&self) -> bool {
        let status = self.status.borrow();
        status.streaming && !status.loading && status.error.is_none() && status.support.has_environment
    }

    /// Release the current stream, if any
    pub fn stop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            debug!("Stopping camera stream");
            handle.stop();
        }
        self.sink.detach();
        self.status.send_if_modified(|status| {
            let changed = status.streaming;
            status.streaming = false;
            changed
        });
    }

    /// Start a stream in `mode`
    ///
    /// A non-user mode that the platform cannot satisfy falls back to the
    /// user camera once, unless the owner was torn down meanwhile. Every other
    /// failure is terminal: it leaves the controller without a stream and
    /// resets the facing mode to user.
    pub async fn start(&mut self, mode: FacingMode) -> Result<StartOutcome, CameraError> {
        info!(facing = %mode, "Starting camera");
        let first = self.start_once(mode, true).await;

        let result = match first {
            Err(StartFailure::Acquire(err))
                if mode != FacingMode::User
                    && err.is_unsatisfiable()
                    && !self.mounted.load(Ordering::Acquire) =>
            {
                info!(facing = %mode, error = %err, "Owner torn down during acquisition, skipping fallback");
                self.status.send_modify(|status| status.loading = false);
                Ok(StartOutcome::Discarded)
            }
            Err(StartFailure::Acquire(err)) if mode != FacingMode::User && err.is_unsatisfiable() => {
                info!(facing = %mode, error = %err, "Requested camera unavailable, falling back to user camera");
                // Support is left as reset; the fallback does not re-detect it
                self.start_once(FacingMode::User, false)
                    .await
                    .map(|outcome| match outcome {
                        StartOutcome::Started { facing_mode, .. } => StartOutcome::Started {
                            facing_mode,
                            fell_back: true,
                        },
                        StartOutcome::Discarded => StartOutcome::Discarded,
                    })
            }
            other => other,
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(failure) => Err(self.fail(failure)),
        }
    }

    /// Toggle between the user and environment cameras
    ///
    /// Returns `None` when switching is not offered.
    pub async fn switch_camera(&mut self) -> Option<Result<StartOutcome, CameraError>> {
        if !self.can_switch() {
            debug!("Camera switch not available");
            return None;
        }
        let next = self.facing_mode().toggled();
        info!(facing = %next, "Switching camera");
        Some(self.start(next).await)
    }

    async fn start_once(
        &mut self,
        mode: FacingMode,
        detect_support: bool,
    ) -> Result<StartOutcome, StartFailure> {
        self.status.send_modify(|status| {
            status.loading = true;
            status.error = None;
            status.support = CameraSupport::default();
        });

        self.permission
            .ensure_permission()
            .await
            .map_err(StartFailure::Permission)?;

        self.stop();

        let constraints = StreamConstraints {
            facing_mode: mode,
            ideal_resolution: self.ideal_resolution,
        };
        let stream = self
            .platform
            .request_stream(&constraints)
            .await
            .map_err(StartFailure::Acquire)?;

        if !self.mounted.load(Ordering::Acquire) {
            info!(facing = %mode, "Owner torn down during acquisition, releasing stream");
            let mut stream = stream;
            stream.stop();
            self.status.send_modify(|status| status.loading = false);
            return Ok(StartOutcome::Discarded);
        }

        let frames = stream.frames();
        self.sink.attach(frames.clone());
        self.handle = Some(stream);
        self.wait_for_metadata(frames).await;

        if let Some(handle) = self.handle.as_mut() {
            match handle.play().await {
                Ok(()) => self.sink.set_playing(true),
                // Playback may legitimately wait for a user gesture
                Err(e) => debug!(error = %e, "Playback did not start"),
            }
        }

        let support = if detect_support {
            self.detect_support().await
        } else {
            CameraSupport::default()
        };

        self.status.send_modify(|status| {
            status.loading = false;
            status.streaming = true;
            status.support = support;
            status.facing_mode = mode;
        });
        info!(
            facing = %mode,
            has_environment = support.has_environment,
            has_multiple_inputs = support.has_multiple_inputs,
            "Camera started"
        );
        Ok(StartOutcome::Started {
            facing_mode: mode,
            fell_back: false,
        })
    }

    async fn wait_for_metadata(&self, mut frames: FrameReceiver) {
        let ready = frames.wait_for(|frame| frame.is_some());
        match tokio::time::timeout(self.metadata_timeout, ready).await {
            Ok(Ok(_)) => debug!("Stream metadata ready"),
            Ok(Err(_)) => warn!("Stream closed before delivering a frame"),
            Err(_) => warn!(
                timeout_ms = self.metadata_timeout.as_millis() as u64,
                "Timed out waiting for stream metadata"
            ),
        }
    }

    /// Best-effort capability probe
    ///
    /// Track capabilities are authoritative when they list a facing mode;
    /// device labels are vendor strings and only a hint.
    async fn detect_support(&self) -> CameraSupport {
        let mut support = CameraSupport::default();

        if let Some(handle) = self.handle.as_ref() {
            support.has_environment = handle.tracks().iter().any(|track| {
                track
                    .capabilities
                    .facing_modes
                    .contains(&FacingMode::Environment)
            });
        }

        if self.platform.supports_device_enumeration() {
            match self.platform.enumerate_devices().await {
                Ok(devices) => {
                    let inputs: Vec<_> = devices
                        .iter()
                        .filter(|device| device.kind == DeviceKind::VideoInput)
                        .collect();
                    support.has_multiple_inputs = inputs.len() > 1;
                    support.has_environment |= inputs
                        .iter()
                        .any(|device| heuristics::label_suggests_environment(&device.label));
                }
                Err(e) => warn!(error = %e, "Device enumeration failed"),
            }
        }

        support
    }

    fn fail(&mut self, failure: StartFailure) -> CameraError {
        self.stop();
        let error = match failure {
            StartFailure::Permission(error) => error,
            StartFailure::Acquire(err) => {
                error!(error = %err, "Unable to access the camera");
                if self.permission.observed_denied() {
                    CameraError::PermissionBlocked
                } else {
                    categorize(&err)
                }
            }
        };

        // A terminal error forgets the requested orientation
        let mounted = self.mounted.load(Ordering::Acquire);
        self.status.send_modify(|status| {
            status.facing_mode = FacingMode::User;
            if mounted {
                status.loading = false;
                status.error = Some(error.clone());
            }
        });
        error
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map an acquisition failure to its user-facing category
pub fn categorize(err: &AcquireError) -> CameraError {
    match err {
        AcquireError::NotAllowed(_) | AcquireError::Security(_) => CameraError::PermissionDenied,
        AcquireError::NotFound(_) | AcquireError::Overconstrained { .. } => CameraError::NoDevice,
        AcquireError::NotReadable(msg) | AcquireError::Aborted(msg) | AcquireError::Other(msg) => {
            CameraError::Unknown(msg.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_camera::{VirtualDevice, VirtualPlatform, solid_image};

    fn controller(platform: &VirtualPlatform) -> StreamController {
        StreamController::new(
            Arc::new(platform.clone()),
            Arc::new(AtomicBool::new(true)),
            Resolution::new(1600, 900),
            Duration::from_millis(200),
        )
    }

    #[test]
    fn test_categorize() {
        assert_eq!(
            categorize(&AcquireError::Security("x".into())),
            CameraError::PermissionDenied
        );
        assert_eq!(
            categorize(&AcquireError::NotFound("x".into())),
            CameraError::NoDevice
        );
        assert_eq!(
            categorize(&AcquireError::NotReadable("busy".into())),
            CameraError::Unknown("busy".into())
        );
    }

    #[tokio::test]
    async fn test_start_attaches_sink_and_detects_support() {
        let platform = VirtualPlatform::demo();
        let mut controller = controller(&platform);
        let sink = controller.sink();

        let outcome = controller.start(FacingMode::User).await.unwrap();
        assert_eq!(
            outcome,
            StartOutcome::Started {
                facing_mode: FacingMode::User,
                fell_back: false
            }
        );
        assert!(sink.is_attached());
        assert!(sink.is_playing());
        assert_eq!(sink.dimensions(), Some(Resolution::new(1600, 900)));

        let status = controller.status();
        assert!(!status.loading);
        assert!(status.streaming);
        assert!(status.support.has_environment);
        assert!(status.support.has_multiple_inputs);
        assert!(controller.can_switch());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let platform = VirtualPlatform::demo();
        let mut controller = controller(&platform);
        controller.stop();
        controller.start(FacingMode::User).await.unwrap();
        controller.stop();
        controller.stop();
        assert_eq!(platform.live_streams(), 0);
        assert!(!controller.sink().is_attached());
        assert!(!controller.status().streaming);
    }

    #[tokio::test]
    async fn test_label_heuristic_without_capabilities() {
        let platform = VirtualPlatform::new()
            .without_facing_capabilities()
            .with_device(VirtualDevice::new(
                "USB Webcam",
                Some(FacingMode::User),
                solid_image(4, 4, [0, 0, 0, 255]),
            ))
            .with_device(VirtualDevice::new(
                "Rear Camera",
                Some(FacingMode::Environment),
                solid_image(4, 4, [0, 0, 0, 255]),
            ));
        let mut controller = controller(&platform);
        controller.start(FacingMode::User).await.unwrap();
        assert!(controller.status().support.has_environment);
    }

    #[tokio::test]
    async fn test_playback_failure_is_not_an_error() {
        let platform = VirtualPlatform::demo();
        platform.set_playback_fails(true);
        let mut controller = controller(&platform);

        assert!(controller.start(FacingMode::User).await.is_ok());
        assert!(controller.is_streaming());
        assert!(!controller.sink().is_playing());
    }

    #[tokio::test]
    async fn test_switch_toggles_facing_mode() {
        let platform = VirtualPlatform::demo();
        let mut controller = controller(&platform);
        controller.start(FacingMode::User).await.unwrap();

        let outcome = controller.switch_camera().await.unwrap().unwrap();
        assert!(matches!(
            outcome,
            StartOutcome::Started {
                facing_mode: FacingMode::Environment,
                ..
            }
        ));
        assert_eq!(controller.facing_mode(), FacingMode::Environment);
        assert_eq!(platform.max_live_streams(), 1);
    }

    #[tokio::test]
    async fn test_switch_unavailable_without_rear_camera() {
        let platform = VirtualPlatform::new().with_device(VirtualDevice::new(
            "Webcam",
            None,
            solid_image(4, 4, [0, 0, 0, 255]),
        ));
        let mut controller = controller(&platform);
        controller.start(FacingMode::User).await.unwrap();

        assert!(!controller.can_switch());
        assert!(controller.switch_camera().await.is_none());
        assert_eq!(platform.request_count(), 1);
    }

    #[tokio::test]
    async fn test_terminal_error_resets_facing_mode() {
        let platform = VirtualPlatform::demo();
        let mut controller = controller(&platform);
        controller.start(FacingMode::Environment).await.unwrap();
        assert_eq!(controller.facing_mode(), FacingMode::Environment);

        platform.fail_next_request(AcquireError::NotReadable("busy".into()));
        let err = controller.start(FacingMode::Environment).await.unwrap_err();
        assert_eq!(err, CameraError::Unknown("busy".into()));
        assert_eq!(controller.facing_mode(), FacingMode::User);
        assert!(!controller.is_streaming());
    }

    #[tokio::test]
    async fn test_no_fallback_after_unmount() {
        let platform = VirtualPlatform::demo();
        let mounted = Arc::new(AtomicBool::new(true));
        let mut controller = StreamController::new(
            Arc::new(platform.clone()),
            Arc::clone(&mounted),
            Resolution::new(1600, 900),
            Duration::from_millis(200),
        );
        controller.start(FacingMode::User).await.unwrap();

        mounted.store(false, Ordering::Release);
        platform.fail_next_request(AcquireError::NotFound("unplugged".into()));
        let outcome = controller.start(FacingMode::Environment).await.unwrap();

        assert_eq!(outcome, StartOutcome::Discarded);
        assert_eq!(
            platform.requested_modes(),
            vec![FacingMode::User, FacingMode::Environment]
        );
        assert_eq!(platform.live_streams(), 0);
        assert!(!controller.status().loading);
        assert!(controller.status().error.is_none());
    }
}
