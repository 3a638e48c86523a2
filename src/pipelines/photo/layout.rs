// SPDX-License-Identifier: GPL-3.0-only

//! Text placement on the compositing surface
//!
//! Anchors are fractions of the surface size and font sizes scale with the
//! surface width, so a capture at any resolution puts the text at the same
//! place on the overlay artwork.

use crate::app::state::Identity;
use crate::backends::camera::Resolution;
use crate::config::{TextAnchor, TextLayout};

/// One positioned line of text
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    /// Left edge in surface pixels
    pub x: f32,
    /// Vertical center in surface pixels
    pub y: f32,
    pub font_px: f32,
}

/// Anchor position in surface pixels
pub fn anchor_point(anchor: &TextAnchor, width: u32, height: u32) -> (f32, f32) {
    (
        (width as f32 * anchor.x).round(),
        (height as f32 * anchor.y).round(),
    )
}

/// Font size for a surface width, never below `min_font_px`
pub fn scaled_font_px(base_font_px: f32, layout: &TextLayout, width: u32) -> f32 {
    (base_font_px * width as f32 / layout.reference_width).max(layout.min_font_px)
}

/// Text runs for an identity, name first
pub fn text_runs(layout: &TextLayout, identity: &Identity, width: u32, height: u32) -> Vec<TextRun> {
    [
        (identity.name(), &layout.name),
        (identity.branch(), &layout.branch),
    ]
    .into_iter()
    .map(|(text, anchor)| {
        let (x, y) = anchor_point(anchor, width, height);
        TextRun {
            text: text.to_string(),
            x,
            y,
            font_px: scaled_font_px(anchor.base_font_px, layout, width),
        }
    })
    .collect()
}

/// Pointer position mapped onto the capture surface
///
/// Used to read off anchor percentages when calibrating the text layout
/// against new overlay artwork.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub x_pixels: u32,
    pub y_pixels: u32,
    pub x_percent: f32,
    pub y_percent: f32,
}

impl PointerSample {
    /// Map a position inside a `display` area showing a `surface`-sized image
    ///
    /// Returns `None` for positions outside the display area.
    pub fn from_display(x: f32, y: f32, display: (f32, f32), surface: Resolution) -> Option<Self> {
        let (display_width, display_height) = display;
        if display_width <= 0.0 || display_height <= 0.0 {
            return None;
        }
        let fx = x / display_width;
        let fy = y / display_height;
        if !(0.0..=1.0).contains(&fx) || !(0.0..=1.0).contains(&fy) {
            return None;
        }
        Some(Self {
            x_pixels: (fx * surface.width as f32).round() as u32,
            y_pixels: (fy * surface.height as f32).round() as u32,
            x_percent: fx * 100.0,
            y_percent: fy * 100.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_scales_with_surface() {
        let layout = TextLayout::default();
        assert_eq!(anchor_point(&layout.name, 1600, 900), (320.0, 769.0));
        assert_eq!(anchor_point(&layout.name, 800, 450), (160.0, 384.0));
    }

    #[test]
    fn test_font_size_clamped_on_narrow_surface() {
        let layout = TextLayout::default();
        assert_eq!(scaled_font_px(48.0, &layout, 1600), 48.0);
        assert_eq!(scaled_font_px(48.0, &layout, 800), 24.0);
        assert_eq!(scaled_font_px(34.0, &layout, 320), layout.min_font_px);
    }

    #[test]
    fn test_two_runs_for_identity() {
        let layout = TextLayout::default();
        let identity = Identity::new("Alex", "Main St").unwrap();
        let runs = text_runs(&layout, &identity, 1600, 900);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "Alex");
        assert_eq!((runs[0].x, runs[0].y), (320.0, 769.0));
        assert_eq!(runs[1].text, "Main St");
        assert_eq!((runs[1].x, runs[1].y), (320.0, 830.0));
    }

    #[test]
    fn test_pointer_sample() {
        let sample =
            PointerSample::from_display(40.0, 10.0, (80.0, 20.0), Resolution::new(1600, 900))
                .unwrap();
        assert_eq!((sample.x_pixels, sample.y_pixels), (800, 450));
        assert_eq!((sample.x_percent, sample.y_percent), (50.0, 50.0));

        assert!(PointerSample::from_display(81.0, 1.0, (80.0, 20.0), Resolution::new(16, 9)).is_none());
        assert!(PointerSample::from_display(0.0, 0.0, (0.0, 20.0), Resolution::new(16, 9)).is_none());
    }
}
