// SPDX-License-Identifier: GPL-3.0-only

//! Still-image sources for virtual cameras

use crate::backends::camera::types::{BackendError, BackendResult};
use image::{Rgba, RgbaImage};
use std::path::Path;
use tracing::info;

/// Load an image file as RGBA pixels
pub fn load_image(path: &Path) -> BackendResult<RgbaImage> {
    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    info!(
        width = rgba.width(),
        height = rgba.height(),
        "Image loaded successfully"
    );
    Ok(rgba)
}

/// Diagonal two-color gradient, used as the picture of demo cameras
pub fn gradient_image(width: u32, height: u32, from: [u8; 3], to: [u8; 3]) -> RgbaImage {
    let span = (width + height).saturating_sub(2).max(1) as f32;
    RgbaImage::from_fn(width, height, |x, y| {
        let t = (x + y) as f32 / span;
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgba([
            mix(from[0], to[0]),
            mix(from[1], to[1]),
            mix(from[2], to[2]),
            255,
        ])
    })
}

/// Uniform image
pub fn solid_image(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba(color))
}
