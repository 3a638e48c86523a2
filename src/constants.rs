// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use crate::backends::camera::types::Resolution;

/// Preferred (not mandatory) stream resolution
pub const IDEAL_RESOLUTION: Resolution = Resolution::new(1600, 900);

/// Surface size used when a capture is requested before frame metadata arrived
pub const FALLBACK_SURFACE: Resolution = Resolution::new(1600, 900);

/// Output file naming
pub mod files {
    /// Download filename prefix
    pub const FILENAME_PREFIX: &str = "photobooth-";

    /// Download extension (lossless encoding)
    pub const EXTENSION: &str = "png";

    /// Directory name used below the user's picture/config/cache directories
    pub const APP_DIR: &str = "photobooth";

    /// Config file name inside the config directory
    pub const CONFIG_FILE: &str = "config.json";

    /// Terminal-mode log file inside the cache directory
    pub const LOG_FILE: &str = "photobooth.log";

    /// Extra fonts for the text layer, inside the config directory
    pub const FONTS_DIR: &str = "fonts";

    /// Build the download filename for a unix timestamp in milliseconds
    pub fn capture_filename(unix_millis: i64) -> String {
        format!("{}{}.{}", FILENAME_PREFIX, unix_millis, EXTENSION)
    }
}

/// Best-effort camera capability heuristics
pub mod heuristics {
    /// Label fragments that suggest an environment-facing (rear) camera
    pub const ENVIRONMENT_LABEL_KEYWORDS: &[&str] = &["back", "rear", "environment", "world"];

    /// Check whether a device label suggests a rear camera
    ///
    /// Labels are vendor strings, so this is a hint and not a capability probe.
    pub fn label_suggests_environment(label: &str) -> bool {
        let label = label.to_lowercase();
        ENVIRONMENT_LABEL_KEYWORDS
            .iter()
            .any(|keyword| label.contains(keyword))
    }
}

/// Raster surface limits
pub mod surface {
    /// Largest width or height accepted for the compositing surface
    pub const MAX_DIMENSION: u32 = 16_384;
}

/// Text overlay defaults, calibrated against the bundled frame artwork
pub mod text {
    /// Surface width at which the base font sizes apply
    pub const REFERENCE_WIDTH: f32 = 1600.0;

    /// Name anchor as fractions of surface width/height
    pub const NAME_ANCHOR: (f32, f32) = (0.20, 0.854);

    /// Branch anchor as fractions of surface width/height
    pub const BRANCH_ANCHOR: (f32, f32) = (0.20, 0.922);

    pub const NAME_BASE_FONT_PX: f32 = 48.0;
    pub const BRANCH_BASE_FONT_PX: f32 = 34.0;

    /// Font floor so text stays legible on narrow surfaces
    pub const MIN_FONT_PX: f32 = 14.0;

    pub const FONT_FAMILY: &str = "sans-serif";
    pub const FILL_COLOR: &str = "#ffffff";
    pub const SHADOW_COLOR: &str = "#000000";
    pub const SHADOW_OPACITY: f32 = 0.6;
    pub const SHADOW_OFFSET_PX: f32 = 2.0;
    pub const SHADOW_BLUR_PX: f32 = 4.0;
}

/// GStreamer pipeline constants
pub mod pipeline {
    /// Maximum buffer queue size (keep small for low latency)
    pub const MAX_BUFFERS: u32 = 2;

    /// Output pixel format for appsink
    pub const OUTPUT_FORMAT: &str = "RGBA";

    /// Get number of threads for videoconvert based on available CPU threads
    pub fn videoconvert_threads() -> u32 {
        std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(4)
    }
}

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// How long to wait for the first frame before playback is attempted anyway
    pub const METADATA_TIMEOUT: Duration = Duration::from_millis(3000);

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Pipeline playing state timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Terminal redraw interval (~30fps)
    pub const UI_TICK: Duration = Duration::from_millis(33);
}
