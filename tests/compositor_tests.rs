// SPDX-License-Identifier: MPL-2.0

//! Integration tests for still-photo compositing

use image::{Rgba, RgbaImage};
use photobooth::app::Identity;
use photobooth::backends::camera::{CameraFrame, Resolution};
use photobooth::config::TextLayout;
use photobooth::pipelines::photo::{
    FrameCompositor, PointerSample, font_faces, load_overlay, scaled_font_px, text_runs,
};
use std::sync::Arc;

fn identity() -> Identity {
    Identity::new("Ada Lovelace", "Leeds").unwrap()
}

#[test]
fn test_text_anchors_at_reference_size() {
    let layout = TextLayout::default();
    let runs = text_runs(&layout, &identity(), 1600, 900);

    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].text, "Ada Lovelace");
    assert_eq!((runs[0].x, runs[0].y), (320.0, 769.0));
    assert_eq!(runs[1].text, "Leeds");
    assert_eq!((runs[1].x, runs[1].y), (320.0, 830.0));
    assert_eq!(runs[0].font_px, layout.name.base_font_px);
    assert_eq!(runs[1].font_px, layout.branch.base_font_px);
}

#[test]
fn test_font_scales_with_width_and_has_floor() {
    let layout = TextLayout::default();
    assert_eq!(scaled_font_px(48.0, &layout, 3200), 96.0);
    assert_eq!(scaled_font_px(48.0, &layout, 800), 24.0);
    assert_eq!(scaled_font_px(34.0, &layout, 320), layout.min_font_px);
}

#[test]
fn test_identity_is_trimmed_before_layout() {
    let identity = Identity::new("  Grace  ", "\tYork ").unwrap();
    let runs = text_runs(&TextLayout::default(), &identity, 1600, 900);
    assert_eq!(runs[0].text, "Grace");
    assert_eq!(runs[1].text, "York");
}

#[test]
fn test_pointer_sample_maps_display_to_surface() {
    let surface = Resolution::new(1600, 900);
    let sample = PointerSample::from_display(200.0, 427.0, (800.0, 450.0), surface).unwrap();
    assert_eq!(sample.x_pixels, 400);
    assert_eq!(sample.y_pixels, 854);
    assert!((sample.x_percent - 25.0).abs() < 1e-3);

    assert!(PointerSample::from_display(900.0, 10.0, (800.0, 450.0), surface).is_none());
}

#[test]
fn test_capture_outside_text_keeps_frame_pixels() {
    let compositor = FrameCompositor::new(TextLayout::default(), Resolution::new(1600, 900));
    let frame = CameraFrame::from_rgba_image(RgbaImage::from_pixel(160, 90, Rgba([20, 40, 60, 255])));

    let surface = compositor
        .render(Some(&frame), None, Some(&identity()))
        .unwrap();
    assert_eq!(surface.dimensions(), (160, 90));
    // Top half has no text and no overlay
    assert_eq!(surface.get_pixel(100, 10).0, [20, 40, 60, 255]);
    assert_eq!(surface.get_pixel(5, 40).0, [20, 40, 60, 255]);
}

#[test]
fn test_identity_is_drawn_at_its_anchors() {
    // Text shaping needs at least one installed font
    if font_faces() == 0 {
        return;
    }
    let background = [20, 40, 60, 255];
    let compositor = FrameCompositor::new(TextLayout::default(), Resolution::new(1600, 900));
    let frame = CameraFrame::from_rgba_image(RgbaImage::from_pixel(1600, 900, Rgba(background)));

    let surface = compositor
        .render(Some(&frame), None, Some(&identity()))
        .unwrap();

    let changed_near = |x0: u32, y0: u32| {
        (x0..x0 + 200)
            .flat_map(|x| (y0 - 15..y0 + 15).map(move |y| (x, y)))
            .filter(|&(x, y)| surface.get_pixel(x, y).0 != background)
            .count()
    };
    assert!(changed_near(320, 769) > 0, "name was not drawn");
    assert!(changed_near(320, 830) > 0, "branch was not drawn");
    assert_eq!(surface.get_pixel(1400, 100).0, background);
}

#[test]
fn test_transparent_overlay_regions_show_the_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.svg");
    std::fs::write(
        &path,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="160" height="90">
            <rect x="0" y="0" width="160" height="10" fill="#ff0000"/>
        </svg>"##,
    )
    .unwrap();

    let overlay = Arc::new(load_overlay(&path).unwrap());
    // SVG artwork is rasterized at the reference width
    assert_eq!(overlay.dimensions(), (1600, 900));

    let compositor = FrameCompositor::new(TextLayout::default(), Resolution::new(1600, 900));
    let frame = CameraFrame::from_rgba_image(RgbaImage::from_pixel(320, 180, Rgba([0, 0, 255, 255])));
    let surface = compositor
        .render(Some(&frame), Some(overlay.as_ref()), None)
        .unwrap();

    assert_eq!(surface.get_pixel(160, 5).0, [255, 0, 0, 255]);
    assert_eq!(surface.get_pixel(160, 100).0, [0, 0, 255, 255]);
}

#[tokio::test]
async fn test_capture_without_frame_uses_fallback_surface() {
    let compositor = FrameCompositor::new(TextLayout::default(), Resolution::new(1600, 900));
    let image = compositor
        .compose_blocking(None, None, Some(identity()))
        .await
        .unwrap();
    assert_eq!((image.width(), image.height()), (1600, 900));

    let decoded = image::load_from_memory(image.bytes()).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (1600, 900));
    // Nothing is drawn away from the text anchors
    assert_eq!(decoded.get_pixel(1500, 50).0[3], 0);
}
