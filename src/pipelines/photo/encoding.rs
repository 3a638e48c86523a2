// SPDX-License-Identifier: GPL-3.0-only

//! PNG encoding of the composited surface

use crate::errors::CaptureError;
use image::RgbaImage;
use tracing::debug;

/// Encode the surface losslessly as PNG
pub fn encode_png(surface: &RgbaImage) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Vec::new();

    surface
        .write_to(
            &mut std::io::Cursor::new(&mut buffer),
            image::ImageFormat::Png,
        )
        .map_err(|e| CaptureError::Encoding(format!("PNG encoding failed: {}", e)))?;

    debug!(size = buffer.len(), "Encoding complete");
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_png_signature_and_pixels() {
        let surface = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let png = encode_png(&surface).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded, surface);
    }
}
