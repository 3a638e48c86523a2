// SPDX-License-Identifier: MPL-2.0

//! PipeWire camera backend
//!
//! Cameras are discovered with the GStreamer device monitor and opened with
//! `pipewiresrc`. Permission comes from the desktop portal.

mod enumeration;
mod pipeline;

pub use enumeration::{PipeWireCamera, closest_resolution, enumerate_cameras, is_pipewire_available};
pub use pipeline::{CameraPipeline, pipeline_description};

use super::portal;
use super::types::*;
use super::{CameraPlatform, MediaStream};
use async_trait::async_trait;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// PipeWire platform implementation
pub struct PipeWirePlatform {
    available: OnceLock<bool>,
}

impl PipeWirePlatform {
    pub fn new() -> Self {
        Self {
            available: OnceLock::new(),
        }
    }

    async fn cameras(&self) -> BackendResult<Vec<PipeWireCamera>> {
        tokio::task::spawn_blocking(enumerate_cameras)
            .await
            .map_err(|e| BackendError::Other(format!("Enumeration task failed: {}", e)))?
    }
}

impl Default for PipeWirePlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CameraPlatform for PipeWirePlatform {
    fn supports_media_devices(&self) -> bool {
        *self.available.get_or_init(is_pipewire_available)
    }

    async fn query_permission(&self) -> BackendResult<Option<PermissionState>> {
        portal::query_camera_permission().await.map(Some)
    }

    async fn request_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaStream>, AcquireError> {
        let cameras = self
            .cameras()
            .await
            .map_err(|e| AcquireError::Other(e.to_string()))?;
        if cameras.is_empty() {
            return Err(AcquireError::NotFound("no video input devices".to_string()));
        }

        let camera = cameras
            .into_iter()
            .find(|camera| camera.satisfies(constraints.facing_mode))
            .ok_or_else(|| AcquireError::Overconstrained {
                constraint: "facingMode".to_string(),
            })?;
        let size = camera.closest_resolution(constraints.ideal_resolution);
        info!(
            camera = %camera.name,
            facing = %constraints.facing_mode,
            size = ?size,
            "Opening PipeWire camera"
        );

        let (sender, receiver) = tokio::sync::watch::channel(None);
        let opened = camera.clone();
        let pipeline =
            tokio::task::spawn_blocking(move || CameraPipeline::start(&opened, size, sender))
                .await
                .map_err(|e| AcquireError::Aborted(format!("Pipeline task failed: {}", e)))??;

        Ok(Box::new(PipeWireStream {
            pipeline: Some(pipeline),
            frames: receiver,
            camera,
            size,
        }))
    }

    async fn enumerate_devices(&self) -> BackendResult<Vec<MediaDeviceInfo>> {
        Ok(self
            .cameras()
            .await?
            .iter()
            .map(|camera| MediaDeviceInfo {
                device_id: camera.device_id(),
                kind: DeviceKind::VideoInput,
                label: camera.name.clone(),
            })
            .collect())
    }
}

/// Live PipeWire camera stream
struct PipeWireStream {
    pipeline: Option<CameraPipeline>,
    frames: FrameReceiver,
    camera: PipeWireCamera,
    size: Option<Resolution>,
}

#[async_trait]
impl MediaStream for PipeWireStream {
    fn tracks(&self) -> Vec<TrackInfo> {
        vec![TrackInfo {
            label: self.camera.name.clone(),
            capabilities: TrackCapabilities {
                facing_modes: self.camera.facing.into_iter().collect(),
                max_resolution: self.camera.resolutions.last().copied().or(self.size),
            },
        }]
    }

    fn frames(&self) -> FrameReceiver {
        self.frames.clone()
    }

    async fn play(&mut self) -> BackendResult<()> {
        match &self.pipeline {
            Some(pipeline) => pipeline.play(),
            None => Err(BackendError::Other("Stream already stopped".to_string())),
        }
    }

    fn stop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            debug!(camera = %self.camera.name, "Releasing PipeWire camera");
            pipeline.stop();
        }
    }

    fn is_live(&self) -> bool {
        self.pipeline.is_some()
    }
}

impl Drop for PipeWireStream {
    fn drop(&mut self) {
        if self.pipeline.is_some() {
            warn!(camera = %self.camera.name, "Stream dropped without stop");
            self.stop();
        }
    }
}
