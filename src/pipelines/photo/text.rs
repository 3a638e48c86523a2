// SPDX-License-Identifier: GPL-3.0-only

//! Text rasterization
//!
//! Text runs are laid out as an SVG document the size of the surface and
//! rendered with resvg. The drop shadow is an SVG filter on the text
//! elements, so it never affects the video or the overlay underneath.

use super::layout::TextRun;
use crate::config::TextLayout;
use crate::constants::files;
use crate::errors::CaptureError;
use image::RgbaImage;
use resvg::tiny_skia;
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

/// System fonts plus `~/.config/photobooth/fonts`, loaded once per process
static FONT_DB: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    let user_fonts = dirs::config_dir().map(|dir| dir.join(files::APP_DIR).join(files::FONTS_DIR));
    if let Some(dir) = user_fonts.filter(|dir| dir.is_dir()) {
        db.load_fonts_dir(&dir);
    }
    debug!(faces = db.len(), "Loaded fonts");
    Arc::new(db)
});

/// Font faces available to the text layer
pub fn font_faces() -> usize {
    FONT_DB.len()
}

#[derive(Clone)]
pub struct TextRenderer {
    layout: TextLayout,
}

impl TextRenderer {
    pub fn new(layout: TextLayout) -> Self {
        Self { layout }
    }

    /// Draw `runs` onto `surface`
    pub fn draw(&self, surface: &mut RgbaImage, runs: &[TextRun]) -> Result<(), CaptureError> {
        if runs.is_empty() {
            return Ok(());
        }
        let (width, height) = surface.dimensions();
        let tree = self.layout_tree(runs, width, height)?;

        let mut pixmap = tiny_skia::Pixmap::new(width, height)
            .ok_or(CaptureError::SurfaceUnavailable { width, height })?;
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

        blend_premultiplied(surface, pixmap.data());
        Ok(())
    }

    /// Parse the text runs into a render tree
    ///
    /// Runs whose text no installed font can shape are dropped by the
    /// parser, so with an empty font database the tree has no text.
    pub fn layout_tree(
        &self,
        runs: &[TextRun],
        width: u32,
        height: u32,
    ) -> Result<usvg::Tree, CaptureError> {
        if FONT_DB.is_empty() {
            warn!("No fonts available, name and branch will be missing from the photo");
        }
        let svg = self.to_svg(runs, width, height);
        let options = usvg::Options {
            fontdb: Arc::clone(&FONT_DB),
            ..Default::default()
        };
        usvg::Tree::from_str(&svg, &options).map_err(|e| CaptureError::Text(e.to_string()))
    }

    /// SVG document holding the text runs
    pub fn to_svg(&self, runs: &[TextRun], width: u32, height: u32) -> String {
        let shadow = &self.layout.shadow;
        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
        );
        let _ = write!(
            svg,
            r#"<defs><filter id="shadow" x="-20%" y="-50%" width="140%" height="200%"><feDropShadow dx="{}" dy="{}" stdDeviation="{}" flood-color="{}" flood-opacity="{}"/></filter></defs>"#,
            shadow.offset_x,
            shadow.offset_y,
            shadow.blur / 2.0,
            escape(&shadow.color),
            shadow.opacity,
        );
        for run in runs {
            let _ = write!(
                svg,
                r#"<text x="{}" y="{}" font-family="{}" font-size="{}" font-weight="{}" fill="{}" text-anchor="start" dominant-baseline="central" filter="url(#shadow)">{}</text>"#,
                run.x,
                run.y,
                escape(&self.layout.font_family),
                run.font_px,
                self.layout.font_weight,
                escape(&self.layout.fill_color),
                escape(&run.text),
            );
        }
        svg.push_str("</svg>");
        svg
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Source-over blend of premultiplied RGBA onto a straight-alpha image
pub fn blend_premultiplied(dst: &mut RgbaImage, src: &[u8]) {
    for (dst, src) in dst.pixels_mut().zip(src.chunks_exact(4)) {
        let sa = src[3] as u32;
        if sa == 0 {
            continue;
        }
        let da = dst[3] as u32;
        let inv = 255 - sa;
        // Alpha terms are scaled by 255 * 255
        let dw = da * inv;
        let out_a = sa * 255 + dw;
        if out_a == 0 {
            continue;
        }
        for c in 0..3 {
            let premul = src[c] as u32 * 255 * 255 + dst[c] as u32 * dw;
            dst[c] = ((premul + out_a / 2) / out_a).min(255) as u8;
        }
        dst[3] = ((out_a + 127) / 255).min(255) as u8;
    }
}
