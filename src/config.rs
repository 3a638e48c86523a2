// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Read once at startup from `<config_dir>/photobooth/config.json` when the
//! file exists. Missing fields fall back to the defaults below.

use crate::backends::camera::types::Resolution;
use crate::constants::{self, files, text};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Which camera platform drives the session
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CameraSource {
    /// GStreamer / PipeWire cameras (Linux)
    #[default]
    #[value(name = "pipewire")]
    PipeWire,
    /// In-process virtual cameras (demo and testing)
    Virtual,
}

/// Anchor and base size of one text run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextAnchor {
    /// Horizontal anchor as a fraction of surface width
    pub x: f32,
    /// Vertical anchor as a fraction of surface height
    pub y: f32,
    /// Font size at the reference width
    pub base_font_px: f32,
}

/// Drop shadow behind the text runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowStyle {
    pub color: String,
    pub opacity: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub blur: f32,
}

impl Default for ShadowStyle {
    fn default() -> Self {
        Self {
            color: text::SHADOW_COLOR.to_string(),
            opacity: text::SHADOW_OPACITY,
            offset_x: text::SHADOW_OFFSET_PX,
            offset_y: text::SHADOW_OFFSET_PX,
            blur: text::SHADOW_BLUR_PX,
        }
    }
}

/// Placement of the identity text on the overlay artwork
///
/// The anchors are tied to one overlay image. Changing the artwork means
/// re-calibrating these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLayout {
    pub name: TextAnchor,
    pub branch: TextAnchor,
    /// Surface width at which `base_font_px` applies
    pub reference_width: f32,
    pub min_font_px: f32,
    pub font_family: String,
    pub font_weight: u16,
    pub fill_color: String,
    pub shadow: ShadowStyle,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            name: TextAnchor {
                x: text::NAME_ANCHOR.0,
                y: text::NAME_ANCHOR.1,
                base_font_px: text::NAME_BASE_FONT_PX,
            },
            branch: TextAnchor {
                x: text::BRANCH_ANCHOR.0,
                y: text::BRANCH_ANCHOR.1,
                base_font_px: text::BRANCH_BASE_FONT_PX,
            },
            reference_width: text::REFERENCE_WIDTH,
            min_font_px: text::MIN_FONT_PX,
            font_family: text::FONT_FAMILY.to_string(),
            font_weight: 600,
            fill_color: text::FILL_COLOR.to_string(),
            shadow: ShadowStyle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera platform
    pub source: CameraSource,
    /// Frame artwork drawn over every capture (PNG, JPEG or SVG)
    pub overlay_path: Option<PathBuf>,
    /// Where downloads are written (defaults to the pictures directory)
    pub download_dir: Option<PathBuf>,
    /// Preferred stream resolution
    pub ideal_resolution: Resolution,
    /// Surface size when no frame is available at capture time
    pub fallback_surface: Resolution,
    /// Upper bound on waiting for the first frame of a new stream
    pub metadata_timeout_ms: u64,
    pub text: TextLayout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: CameraSource::default(),
            overlay_path: None,
            download_dir: None,
            ideal_resolution: constants::IDEAL_RESOLUTION,
            fallback_surface: constants::FALLBACK_SURFACE,
            metadata_timeout_ms: constants::timing::METADATA_TIMEOUT.as_millis() as u64,
            text: TextLayout::default(),
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(files::APP_DIR).join(files::CONFIG_FILE))
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading config");
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        info!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Load the config at the default location, or defaults when there is none
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Reject values the compositor cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, anchor) in [("name", &self.text.name), ("branch", &self.text.branch)] {
            if !(0.0..=1.0).contains(&anchor.x) || !(0.0..=1.0).contains(&anchor.y) {
                return Err(ConfigError::Invalid(format!(
                    "{field} anchor ({}, {}) is outside the surface",
                    anchor.x, anchor.y
                )));
            }
            if anchor.base_font_px <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{field} font size must be positive"
                )));
            }
        }
        if self.text.reference_width <= 0.0 {
            return Err(ConfigError::Invalid(
                "reference width must be positive".to_string(),
            ));
        }
        if self.fallback_surface.width == 0 || self.fallback_surface.height == 0 {
            return Err(ConfigError::Invalid(
                "fallback surface must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    /// Resolved download directory
    pub fn resolved_download_dir(&self) -> Option<PathBuf> {
        self.download_dir.clone().or_else(|| {
            dirs::picture_dir()
                .or_else(dirs::download_dir)
                .map(|dir| dir.join(files::APP_DIR))
        })
    }
}
