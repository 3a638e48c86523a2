// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera platform
//!
//! An in-process [`CameraPlatform`] whose cameras are still images. It backs
//! the `--source virtual` demo mode and the test-suite, so its behavior can be
//! scripted: permission state, missing capabilities, injected acquisition
//! failures, request latency and playback failures. It also keeps counters of
//! requests and live streams.
//!
//! ```text
//! request_stream(constraints)
//!        │
//!        ├─ scripted failure queued? ──▶ Err(AcquireError)
//!        ├─ denied at prompt?        ──▶ Err(NotAllowed)
//!        ├─ no devices               ──▶ Err(NotFound)
//!        ├─ no matching facing mode  ──▶ Err(Overconstrained)
//!        ▼
//!   VirtualStream (publishes the device image as frames)
//! ```

mod file_source;

pub use file_source::{gradient_image, load_image, solid_image};

use crate::backends::camera::types::*;
use crate::backends::camera::{CameraPlatform, MediaStream};
use async_trait::async_trait;
use image::RgbaImage;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// One virtual camera
#[derive(Clone)]
pub struct VirtualDevice {
    pub label: String,
    /// Facing mode this camera satisfies; `None` is an external camera that
    /// only satisfies user-facing requests
    pub facing: Option<FacingMode>,
    pub image: Arc<RgbaImage>,
}

impl VirtualDevice {
    pub fn new(label: impl Into<String>, facing: Option<FacingMode>, image: RgbaImage) -> Self {
        Self {
            label: label.into(),
            facing,
            image: Arc::new(image),
        }
    }

    fn satisfies(&self, mode: FacingMode) -> bool {
        match self.facing {
            Some(facing) => facing == mode,
            None => mode == FacingMode::User,
        }
    }
}

impl std::fmt::Debug for VirtualDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualDevice")
            .field("label", &self.label)
            .field("facing", &self.facing)
            .field(
                "image",
                &format_args!("{}x{}", self.image.width(), self.image.height()),
            )
            .finish()
    }
}

/// Outcome of a permission query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionScript {
    /// The platform reports this state
    State(PermissionState),
    /// The platform has no permission API
    Unsupported,
    /// The query fails
    Fails,
}

struct PlatformState {
    devices: Vec<VirtualDevice>,
    permission: PermissionScript,
    deny_at_prompt: bool,
    scripted_failures: VecDeque<AcquireError>,
    request_delay: Option<Duration>,
    requested_modes: Vec<FacingMode>,
}

#[derive(Default)]
struct StreamCounters {
    requests: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    stopped: AtomicUsize,
}

struct Inner {
    supports_media_devices: AtomicBool,
    supports_enumeration: AtomicBool,
    advertise_facing: AtomicBool,
    playback_fails: AtomicBool,
    state: Mutex<PlatformState>,
    counters: StreamCounters,
}

/// Scriptable in-process camera platform
///
/// Cloning shares the same devices, script and counters.
#[derive(Clone)]
pub struct VirtualPlatform {
    inner: Arc<Inner>,
}

impl VirtualPlatform {
    /// Platform with no devices and granted permission
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                supports_media_devices: AtomicBool::new(true),
                supports_enumeration: AtomicBool::new(true),
                advertise_facing: AtomicBool::new(true),
                playback_fails: AtomicBool::new(false),
                state: Mutex::new(PlatformState {
                    devices: Vec::new(),
                    permission: PermissionScript::State(PermissionState::Granted),
                    deny_at_prompt: false,
                    scripted_failures: VecDeque::new(),
                    request_delay: None,
                    requested_modes: Vec::new(),
                }),
                counters: StreamCounters::default(),
            }),
        }
    }

    /// Front and back demo cameras showing gradients
    pub fn demo() -> Self {
        Self::new()
            .with_device(VirtualDevice::new(
                "Integrated Camera",
                Some(FacingMode::User),
                gradient_image(1600, 900, [32, 64, 160], [14, 200, 160]),
            ))
            .with_device(VirtualDevice::new(
                "Back Camera",
                Some(FacingMode::Environment),
                gradient_image(1600, 900, [160, 48, 32], [240, 200, 64]),
            ))
    }

    /// Single user-facing camera showing an image file
    pub fn from_image_file(path: &Path) -> BackendResult<Self> {
        let image = load_image(path)?;
        let label = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Virtual Camera".to_string());
        Ok(Self::new().with_device(VirtualDevice::new(label, Some(FacingMode::User), image)))
    }

    /// Platform without any media-device capability
    pub fn unsupported() -> Self {
        let platform = Self::new().without_enumeration();
        platform
            .inner
            .supports_media_devices
            .store(false, Ordering::Release);
        platform
    }

    /// Disable device enumeration
    pub fn without_enumeration(self) -> Self {
        self.inner
            .supports_enumeration
            .store(false, Ordering::Release);
        self
    }

    /// Stop advertising facing modes in track capabilities
    pub fn without_facing_capabilities(self) -> Self {
        self.inner.advertise_facing.store(false, Ordering::Release);
        self
    }

    pub fn with_device(self, device: VirtualDevice) -> Self {
        self.state().devices.push(device);
        self
    }

    pub fn with_permission(self, permission: PermissionScript) -> Self {
        self.state().permission = permission;
        self
    }

    /// Reject every stream request as if the user dismissed the prompt
    pub fn deny_at_prompt(self) -> Self {
        self.state().deny_at_prompt = true;
        self
    }

    /// Fail the next stream request with `error`
    pub fn fail_next_request(&self, error: AcquireError) {
        self.state().scripted_failures.push_back(error);
    }

    /// Delay every stream request
    pub fn set_request_delay(&self, delay: Option<Duration>) {
        self.state().request_delay = delay;
    }

    /// Make `play()` fail on new streams
    pub fn set_playback_fails(&self, fails: bool) {
        self.inner.playback_fails.store(fails, Ordering::Release);
    }

    pub fn set_permission(&self, permission: PermissionScript) {
        self.state().permission = permission;
    }

    /// Number of stream requests issued so far
    pub fn request_count(&self) -> usize {
        self.inner.counters.requests.load(Ordering::Acquire)
    }

    /// Facing modes of all stream requests, in order
    pub fn requested_modes(&self) -> Vec<FacingMode> {
        self.state().requested_modes.clone()
    }

    /// Streams currently holding a device
    pub fn live_streams(&self) -> usize {
        self.inner.counters.live.load(Ordering::Acquire)
    }

    /// Highest number of simultaneously live streams ever observed
    pub fn max_live_streams(&self) -> usize {
        self.inner.counters.max_live.load(Ordering::Acquire)
    }

    /// Streams released so far
    pub fn stopped_streams(&self) -> usize {
        self.inner.counters.stopped.load(Ordering::Acquire)
    }

    fn state(&self) -> MutexGuard<'_, PlatformState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn select_device(&self, mode: FacingMode) -> Result<VirtualDevice, AcquireError> {
        let mut state = self.state();
        if let Some(error) = state.scripted_failures.pop_front() {
            return Err(error);
        }
        if state.deny_at_prompt {
            return Err(AcquireError::NotAllowed(
                "permission dismissed at prompt".to_string(),
            ));
        }
        if state.devices.is_empty() {
            return Err(AcquireError::NotFound("no video input devices".to_string()));
        }
        state
            .devices
            .iter()
            .find(|device| device.satisfies(mode))
            .cloned()
            .ok_or_else(|| AcquireError::Overconstrained {
                constraint: "facingMode".to_string(),
            })
    }
}

impl Default for VirtualPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraPlatform for VirtualPlatform {
    fn supports_media_devices(&self) -> bool {
        self.inner.supports_media_devices.load(Ordering::Acquire)
    }

    fn supports_device_enumeration(&self) -> bool {
        self.inner.supports_enumeration.load(Ordering::Acquire)
    }

    async fn query_permission(&self) -> BackendResult<Option<PermissionState>> {
        match self.state().permission.clone() {
            PermissionScript::State(state) => Ok(Some(state)),
            PermissionScript::Unsupported => Ok(None),
            PermissionScript::Fails => Err(BackendError::Other(
                "permission query rejected".to_string(),
            )),
        }
    }

    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, AcquireError> {
        self.inner.counters.requests.fetch_add(1, Ordering::AcqRel);
        let delay = {
            let mut state = self.state();
            state.requested_modes.push(constraints.facing_mode);
            state.request_delay
        };
        debug!(facing = %constraints.facing_mode, "Virtual stream requested");

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let device = self.select_device(constraints.facing_mode)?;
        info!(device = %device.label, facing = %constraints.facing_mode, "Virtual stream opened");
        Ok(Box::new(VirtualStream::open(
            device,
            Arc::clone(&self.inner),
        )))
    }

    async fn enumerate_devices(&self) -> BackendResult<Vec<MediaDeviceInfo>> {
        if !self.supports_device_enumeration() {
            return Err(BackendError::NotAvailable(
                "device enumeration disabled".to_string(),
            ));
        }
        Ok(self
            .state()
            .devices
            .iter()
            .enumerate()
            .map(|(index, device)| MediaDeviceInfo {
                device_id: format!("virtual-{index}"),
                kind: DeviceKind::VideoInput,
                label: device.label.clone(),
            })
            .collect())
    }
}

/// Live stream of a virtual device
struct VirtualStream {
    device: VirtualDevice,
    platform: Arc<Inner>,
    sender: FrameSender,
    live: bool,
}

impl VirtualStream {
    fn open(device: VirtualDevice, platform: Arc<Inner>) -> Self {
        let counters = &platform.counters;
        let live = counters.live.fetch_add(1, Ordering::AcqRel) + 1;
        counters.max_live.fetch_max(live, Ordering::AcqRel);

        // Metadata is available immediately; the first frame doubles as it
        let (sender, _) = tokio::sync::watch::channel(None);
        sender.send_replace(Some(Arc::new(Self::frame_of(&device))));

        Self {
            device,
            platform,
            sender,
            live: true,
        }
    }

    fn frame_of(device: &VirtualDevice) -> CameraFrame {
        let mut frame = CameraFrame::from_rgba_image(device.image.as_ref().clone());
        frame.captured_at = Instant::now();
        frame
    }
}

#[async_trait]
impl MediaStream for VirtualStream {
    fn tracks(&self) -> Vec<TrackInfo> {
        let facing_modes = if self.platform.advertise_facing.load(Ordering::Acquire) {
            self.device.facing.into_iter().collect()
        } else {
            Vec::new()
        };
        vec![TrackInfo {
            label: self.device.label.clone(),
            capabilities: TrackCapabilities {
                facing_modes,
                max_resolution: Some(Resolution::new(
                    self.device.image.width(),
                    self.device.image.height(),
                )),
            },
        }]
    }

    fn frames(&self) -> FrameReceiver {
        self.sender.subscribe()
    }

    async fn play(&mut self) -> BackendResult<()> {
        if self.platform.playback_fails.load(Ordering::Acquire) {
            return Err(BackendError::Other(
                "playback requires a user gesture".to_string(),
            ));
        }
        if self.live {
            self.sender
                .send_replace(Some(Arc::new(Self::frame_of(&self.device))));
        }
        Ok(())
    }

    fn stop(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        self.sender.send_replace(None);
        self.platform.counters.live.fetch_sub(1, Ordering::AcqRel);
        self.platform.counters.stopped.fetch_add(1, Ordering::AcqRel);
        debug!(device = %self.device.label, "Virtual stream stopped");
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

impl Drop for VirtualStream {
    fn drop(&mut self) {
        self.stop();
    }
}
