// SPDX-License-Identifier: GPL-3.0-only

//! Camera discovery through the GStreamer device monitor
//!
//! PipeWire exposes every camera as a `Video/Source` device. The camera
//! location (front, back, external) comes from the libcamera properties when
//! the device reports them.

use super::super::types::{BackendError, BackendResult, FacingMode, Resolution};
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

/// Device properties that may carry the camera location
const LOCATION_PROPERTIES: &[&str] = &["api.libcamera.location", "camera.location"];

/// One camera found by the device monitor
#[derive(Debug, Clone)]
pub struct PipeWireCamera {
    pub name: String,
    /// PipeWire `object.serial`, used as the `target-object` of `pipewiresrc`
    pub serial: Option<String>,
    pub facing: Option<FacingMode>,
    /// Advertised fixed frame sizes
    pub resolutions: Vec<Resolution>,
}

impl PipeWireCamera {
    /// Stable identifier for device listings
    pub fn device_id(&self) -> String {
        match &self.serial {
            Some(serial) => format!("pipewire-serial-{}", serial),
            None => format!("pipewire-{}", self.name),
        }
    }

    /// Whether a stream constrained to `mode` may use this camera
    ///
    /// Cameras without a reported location only satisfy user-facing requests.
    pub fn satisfies(&self, mode: FacingMode) -> bool {
        match self.facing {
            Some(facing) => facing == mode,
            None => mode == FacingMode::User,
        }
    }

    /// Advertised resolution closest to `ideal` by pixel count
    pub fn closest_resolution(&self, ideal: Resolution) -> Option<Resolution> {
        closest_resolution(&self.resolutions, ideal)
    }
}

/// Check that GStreamer and the PipeWire source element are usable
pub fn is_pipewire_available() -> bool {
    if gstreamer::init().is_err() {
        warn!("GStreamer init failed");
        return false;
    }
    let available = gstreamer::ElementFactory::find("pipewiresrc").is_some();
    debug!(available, "Checked pipewiresrc availability");
    available
}

/// List cameras known to PipeWire
pub fn enumerate_cameras() -> BackendResult<Vec<PipeWireCamera>> {
    gstreamer::init().map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

    let monitor = gstreamer::DeviceMonitor::new();
    monitor.add_filter(Some("Video/Source"), None);
    monitor
        .start()
        .map_err(|e| BackendError::InitializationFailed(format!("Device monitor failed: {}", e)))?;
    let devices = monitor.devices();
    monitor.stop();

    let cameras: Vec<PipeWireCamera> = devices
        .iter()
        .filter_map(|device| {
            let properties = device.properties()?;
            let serial = properties
                .get::<String>("object.serial")
                .ok()
                .or_else(|| properties.get::<u64>("object.serial").ok().map(|s| s.to_string()));

            let facing = LOCATION_PROPERTIES
                .iter()
                .filter_map(|key| properties.get::<String>(*key).ok())
                .find_map(|location| FacingMode::from_location(&location));

            let resolutions = device
                .caps()
                .map(|caps| caps_resolutions(&caps))
                .unwrap_or_default();

            let camera = PipeWireCamera {
                name: device.display_name().to_string(),
                serial,
                facing,
                resolutions,
            };
            debug!(
                name = %camera.name,
                serial = ?camera.serial,
                facing = ?camera.facing,
                sizes = camera.resolutions.len(),
                "Found video camera"
            );
            Some(camera)
        })
        .collect();

    info!(count = cameras.len(), "PipeWire cameras enumerated");
    Ok(cameras)
}

/// Fixed frame sizes listed in device caps
fn caps_resolutions(caps: &gstreamer::Caps) -> Vec<Resolution> {
    let mut sizes: Vec<Resolution> = caps
        .iter()
        .filter_map(|structure| {
            let width = structure.get::<i32>("width").ok()?;
            let height = structure.get::<i32>("height").ok()?;
            (width > 0 && height > 0).then(|| Resolution::new(width as u32, height as u32))
        })
        .collect();
    sizes.sort_by_key(|size| size.pixels());
    sizes.dedup();
    sizes
}

/// Resolution whose pixel count is closest to `ideal`
pub fn closest_resolution(sizes: &[Resolution], ideal: Resolution) -> Option<Resolution> {
    sizes
        .iter()
        .copied()
        .min_by_key(|size| size.pixels().abs_diff(ideal.pixels()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_resolution() {
        let sizes = [
            Resolution::new(640, 480),
            Resolution::new(1280, 720),
            Resolution::new(1920, 1080),
        ];
        assert_eq!(
            closest_resolution(&sizes, Resolution::new(1600, 900)),
            Some(Resolution::new(1280, 720))
        );
        assert_eq!(
            closest_resolution(&sizes, Resolution::new(1920, 1200)),
            Some(Resolution::new(1920, 1080))
        );
        assert_eq!(closest_resolution(&[], Resolution::new(1600, 900)), None);
    }

    #[test]
    fn test_unknown_location_only_satisfies_user() {
        let camera = PipeWireCamera {
            name: "USB Camera".to_string(),
            serial: Some("42".to_string()),
            facing: None,
            resolutions: Vec::new(),
        };
        assert!(camera.satisfies(FacingMode::User));
        assert!(!camera.satisfies(FacingMode::Environment));
        assert_eq!(camera.device_id(), "pipewire-serial-42");
    }
}
