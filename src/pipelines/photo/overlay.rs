// SPDX-License-Identifier: GPL-3.0-only

//! Frame overlay artwork
//!
//! The overlay is decoded in the background. Until decoding finishes the
//! compositor draws captures without it, the same as an image that has not
//! completed loading. Callers that must not race the loader await
//! [`OverlaySlot::wait_loaded`] first.

use crate::constants::{surface, text};
use image::RgbaImage;
use resvg::tiny_skia;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Errors while decoding overlay artwork
#[derive(Debug, Clone, thiserror::Error)]
pub enum OverlayError {
    #[error("failed to read overlay {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("failed to decode overlay: {0}")]
    Decode(String),
    #[error("overlay loader stopped before finishing")]
    Abandoned,
}

#[derive(Debug, Clone)]
enum LoadState {
    Absent,
    Pending,
    Ready(Arc<RgbaImage>),
    Failed(OverlayError),
}

/// Shared, write-once overlay image
#[derive(Clone)]
pub struct OverlaySlot {
    state: watch::Receiver<LoadState>,
}

impl OverlaySlot {
    fn with_state(state: LoadState) -> (watch::Sender<LoadState>, Self) {
        let (sender, state) = watch::channel(state);
        (sender, Self { state })
    }

    /// Slot that never receives an image
    pub fn empty() -> Self {
        Self::with_state(LoadState::Absent).1
    }

    /// Slot that is already loaded
    pub fn ready(image: RgbaImage) -> Self {
        Self::with_state(LoadState::Ready(Arc::new(image))).1
    }

    /// Start decoding `path` on the blocking pool
    pub fn spawn_load(path: PathBuf) -> Self {
        let (sender, slot) = Self::with_state(LoadState::Pending);
        tokio::task::spawn_blocking(move || {
            let state = match load_overlay(&path) {
                Ok(image) => {
                    info!(
                        path = %path.display(),
                        width = image.width(),
                        height = image.height(),
                        "Overlay loaded"
                    );
                    LoadState::Ready(Arc::new(image))
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Overlay unavailable");
                    LoadState::Failed(e)
                }
            };
            sender.send_replace(state);
        });
        slot
    }

    pub fn get(&self) -> Option<Arc<RgbaImage>> {
        match &*self.state.borrow() {
            LoadState::Ready(image) => Some(Arc::clone(image)),
            _ => None,
        }
    }

    /// Wait until the background load has finished
    ///
    /// Resolves to `None` for an empty slot.
    pub async fn wait_loaded(&self) -> Result<Option<Arc<RgbaImage>>, OverlayError> {
        let mut receiver = self.state.clone();
        let state = receiver
            .wait_for(|state| !matches!(state, LoadState::Pending))
            .await
            .map_err(|_| OverlayError::Abandoned)?;
        match &*state {
            LoadState::Ready(image) => Ok(Some(Arc::clone(image))),
            LoadState::Failed(e) => Err(e.clone()),
            LoadState::Absent | LoadState::Pending => Ok(None),
        }
    }
}

impl Default for OverlaySlot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Decode overlay artwork from PNG, JPEG or SVG
pub fn load_overlay(path: &Path) -> Result<RgbaImage, OverlayError> {
    let is_svg = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));

    if is_svg {
        let bytes = std::fs::read(path).map_err(|source| OverlayError::Read {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })?;
        rasterize_svg(&bytes)
    } else {
        image::open(path)
            .map(|img| img.to_rgba8())
            .map_err(|e| OverlayError::Decode(e.to_string()))
    }
}

/// Rasterize SVG artwork, upscaled to at least the reference width
pub fn rasterize_svg(bytes: &[u8]) -> Result<RgbaImage, OverlayError> {
    let options = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &options)
        .map_err(|e| OverlayError::Decode(e.to_string()))?;

    let size = tree.size();
    let scale = (text::REFERENCE_WIDTH / size.width()).max(1.0);
    let width = (size.width() * scale).ceil() as u32;
    let height = (size.height() * scale).ceil() as u32;
    if width > surface::MAX_DIMENSION || height > surface::MAX_DIMENSION {
        return Err(OverlayError::Decode(format!(
            "svg raster size too large: {width}x{height}"
        )));
    }

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| OverlayError::Decode("failed to allocate svg pixmap".to_string()))?;
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    let pixels = pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let c = px.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| OverlayError::Decode("svg pixmap size mismatch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="160" height="90">
        <rect x="0" y="80" width="160" height="10" fill="#ff0000"/>
    </svg>"##;

    #[test]
    fn test_svg_is_upscaled_to_reference_width() {
        let image = rasterize_svg(FRAME_SVG.as_bytes()).unwrap();
        assert_eq!(image.dimensions(), (1600, 900));
        assert_eq!(image.get_pixel(800, 890).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(800, 100).0[3], 0);
    }

    #[test]
    fn test_invalid_svg() {
        assert!(rasterize_svg(b"<svg").is_err());
    }

    #[test]
    fn test_slot_states() {
        assert!(OverlaySlot::empty().get().is_none());
        let slot = OverlaySlot::ready(RgbaImage::new(2, 2));
        assert_eq!(slot.get().unwrap().dimensions(), (2, 2));
    }

    #[tokio::test]
    async fn test_missing_file_reports_error() {
        let slot = OverlaySlot::spawn_load(PathBuf::from("/nonexistent/overlay.png"));
        assert!(slot.wait_loaded().await.is_err());
        assert!(slot.get().is_none());
    }

    #[tokio::test]
    async fn test_wait_loaded_returns_decoded_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.svg");
        std::fs::write(&path, FRAME_SVG).unwrap();

        let slot = OverlaySlot::spawn_load(path);
        let image = slot.wait_loaded().await.unwrap().unwrap();
        assert_eq!(image.dimensions(), (1600, 900));
        assert!(slot.get().is_some());
    }

    #[tokio::test]
    async fn test_empty_slot_resolves_immediately() {
        assert!(OverlaySlot::empty().wait_loaded().await.unwrap().is_none());
    }
}
