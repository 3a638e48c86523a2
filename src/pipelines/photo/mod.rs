// SPDX-License-Identifier: MPL-2.0

//! Still-photo compositing
//!
//! ```text
//! CameraFrame ──▶ surface (frame size, or fallback)
//!                   │ 1. frame stretched to fill
//!                   │ 2. overlay stretched to fill (once loaded)
//!                   │ 3. name + branch text runs with drop shadow
//!                   ▼
//!                 PNG ──▶ CapturedImage
//! ```
//!
//! Compositing is CPU-bound; [`FrameCompositor::compose_blocking`] runs it on
//! the blocking pool so the session task keeps serving commands.

pub mod encoding;
pub mod layout;
pub mod overlay;
pub mod text;

pub use encoding::encode_png;
pub use layout::{PointerSample, TextRun, anchor_point, scaled_font_px, text_runs};
pub use overlay::{OverlayError, OverlaySlot, load_overlay};
pub use text::{TextRenderer, font_faces};

use crate::app::state::{CapturedImage, Identity};
use crate::backends::camera::{CameraFrame, Resolution};
use crate::config::TextLayout;
use crate::constants::surface;
use crate::errors::CaptureError;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use std::sync::Arc;
use tracing::{debug, info};

/// Draws frame, overlay and identity into one still image
#[derive(Clone)]
pub struct FrameCompositor {
    layout: TextLayout,
    fallback_surface: Resolution,
    text: TextRenderer,
}

impl FrameCompositor {
    pub fn new(layout: TextLayout, fallback_surface: Resolution) -> Self {
        Self {
            text: TextRenderer::new(layout.clone()),
            layout,
            fallback_surface,
        }
    }

    /// Surface size for a frame, falling back when no frame has arrived
    pub fn surface_size(&self, frame: Option<&CameraFrame>) -> Resolution {
        match frame {
            Some(frame) if frame.width > 0 && frame.height > 0 => {
                Resolution::new(frame.width, frame.height)
            }
            _ => self.fallback_surface,
        }
    }

    /// Composite into a raster surface
    pub fn render(
        &self,
        frame: Option<&CameraFrame>,
        overlay: Option<&RgbaImage>,
        identity: Option<&Identity>,
    ) -> Result<RgbaImage, CaptureError> {
        let size = self.surface_size(frame);
        let mut canvas = create_surface(size)?;

        if let Some(frame) = frame {
            let pixels = frame.to_rgba_image().ok_or_else(|| {
                CaptureError::InvalidFrame(format!(
                    "{}x{} frame with stride {} and {} bytes",
                    frame.width,
                    frame.height,
                    frame.stride,
                    frame.data.len()
                ))
            })?;
            draw_stretched(&mut canvas, &pixels, false);
        }

        if let Some(overlay) = overlay {
            draw_stretched(&mut canvas, overlay, true);
        }

        if let Some(identity) = identity {
            let runs = text_runs(&self.layout, identity, size.width, size.height);
            self.text.draw(&mut canvas, &runs)?;
        }

        Ok(canvas)
    }

    /// Composite and encode
    pub fn compose(
        &self,
        frame: Option<&CameraFrame>,
        overlay: Option<&RgbaImage>,
        identity: Option<&Identity>,
    ) -> Result<CapturedImage, CaptureError> {
        let canvas = self.render(frame, overlay, identity)?;
        let png = encode_png(&canvas)?;
        info!(
            width = canvas.width(),
            height = canvas.height(),
            bytes = png.len(),
            overlay = overlay.is_some(),
            text = identity.is_some(),
            "Frame composited"
        );
        Ok(CapturedImage::new(canvas.width(), canvas.height(), png))
    }

    /// [`compose`](Self::compose) on the blocking pool
    pub async fn compose_blocking(
        &self,
        frame: Option<Arc<CameraFrame>>,
        overlay: Option<Arc<RgbaImage>>,
        identity: Option<Identity>,
    ) -> Result<CapturedImage, CaptureError> {
        let compositor = self.clone();
        tokio::task::spawn_blocking(move || {
            compositor.compose(frame.as_deref(), overlay.as_deref(), identity.as_ref())
        })
        .await
        .map_err(|e| CaptureError::Task(e.to_string()))?
    }
}

fn create_surface(size: Resolution) -> Result<RgbaImage, CaptureError> {
    if size.width == 0
        || size.height == 0
        || size.width > surface::MAX_DIMENSION
        || size.height > surface::MAX_DIMENSION
    {
        return Err(CaptureError::SurfaceUnavailable {
            width: size.width,
            height: size.height,
        });
    }
    Ok(RgbaImage::new(size.width, size.height))
}

/// Draw `source` scaled to exactly cover `canvas`
fn draw_stretched(canvas: &mut RgbaImage, source: &RgbaImage, blend: bool) {
    let (width, height) = canvas.dimensions();
    let scaled;
    let source = if source.dimensions() == (width, height) {
        source
    } else {
        debug!(
            from = ?source.dimensions(),
            to = ?(width, height),
            "Stretching layer"
        );
        scaled = imageops::resize(source, width, height, FilterType::Triangle);
        &scaled
    };

    if blend {
        imageops::overlay(canvas, source, 0, 0);
    } else {
        imageops::replace(canvas, source, 0, 0);
    }
}
