// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document rendering: map analysed elements from photo pixels onto a fixed
// output page as positioned draw instructions.

use ::image::RgbaImage;
use rescan_core::config::RenderConfig;
use rescan_core::error::Result;
use rescan_core::PaperSize;
use tracing::{debug, instrument, warn};

use crate::layout::grid::LayoutGridAnalyzer;
use crate::model::{AnalyzedDocument, DocumentElement, DocumentGrid, ImagePayload, ImageZone};

/// One positioned item on the output page.
///
/// Coordinates are in points with the origin at the bottom-left of the page;
/// `(x, y)` is the bottom-left corner of the item's box.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawInstruction {
    Text {
        text: String,
        x: f32,
        y: f32,
        /// Lines wrap at this width.
        wrap_width: f32,
        /// Height of the box the text was found in.
        height: f32,
        font_size: f32,
        inverted: bool,
    },
    Image {
        pixels: RgbaImage,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

impl DrawInstruction {
    /// The instruction's box as `(x, y, width, height)` in points.
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        match self {
            Self::Text {
                x,
                y,
                wrap_width,
                height,
                ..
            } => (*x, *y, *wrap_width, *height),
            Self::Image {
                x,
                y,
                width,
                height,
                ..
            } => (*x, *y, *width, *height),
        }
    }
}

/// A fully laid-out output page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageLayout {
    pub width_pt: f32,
    pub height_pt: f32,
    /// In document reading order.
    pub instructions: Vec<DrawInstruction>,
}

/// Turns a [`PageLayout`] into an output artefact (e.g. PDF bytes).
pub trait PageWriter {
    fn write_page(&self, layout: &PageLayout) -> Result<Vec<u8>>;
}

/// Maps documents onto output pages.
#[derive(Debug, Clone, Default)]
pub struct DocumentRenderer {
    config: RenderConfig,
}

impl DocumentRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Lay `document` out on a `paper` page.
    pub fn render_page(&self, document: &AnalyzedDocument, paper: PaperSize) -> PageLayout {
        let (width_pt, height_pt) = paper.dimensions_pt();
        self.render(document, width_pt, height_pt)
    }

    /// Lay `document` out on a `width_pt` x `height_pt` page.
    ///
    /// Horizontal and vertical scales are independent
    /// (`page / document.page_width`, `page / document.page_height`).
    /// Image elements without usable pixels are skipped.
    #[instrument(skip_all, fields(elements = document.elements.len(), width_pt, height_pt))]
    pub fn render(&self, document: &AnalyzedDocument, width_pt: f32, height_pt: f32) -> PageLayout {
        let mut layout = PageLayout {
            width_pt,
            height_pt,
            instructions: Vec::with_capacity(document.elements.len()),
        };
        if document.page_width == 0 || document.page_height == 0 {
            warn!("Document has no page dimensions; nothing to render");
            return layout;
        }

        let sx = width_pt / document.page_width as f32;
        let sy = height_pt / document.page_height as f32;

        for (index, element) in document.elements.iter().enumerate() {
            let r = element.rect();
            let (x, w, h) = (r.x as f32 * sx, r.width as f32 * sx, r.height as f32 * sy);
            let y = height_pt - r.y as f32 * sy - h;

            match element {
                DocumentElement::Text(zone) => {
                    let lines = zone.text.lines().count().max(1);
                    layout.instructions.push(DrawInstruction::Text {
                        text: zone.text.clone(),
                        x,
                        y,
                        wrap_width: w,
                        height: h,
                        font_size: self.font_size(h, lines),
                        inverted: zone.inverted,
                    });
                }
                DocumentElement::Image(zone) => {
                    let Some(pixels) = load_pixels(zone, index) else {
                        continue;
                    };
                    let (draw_w, draw_h) = fit_scale(pixels.width(), pixels.height(), w, h);
                    layout.instructions.push(DrawInstruction::Image {
                        pixels,
                        x,
                        y,
                        width: draw_w,
                        height: draw_h,
                    });
                }
            }
        }

        debug!(instructions = layout.instructions.len(), "Page laid out");
        layout
    }

    /// Render a layout grid by converting it back into a document first.
    pub fn render_grid(
        &self,
        grid: &DocumentGrid,
        analyzer: &LayoutGridAnalyzer,
        page_width: u32,
        page_height: u32,
        paper: PaperSize,
    ) -> PageLayout {
        let document = analyzer.grid_to_document(grid, page_width, page_height);
        self.render_page(&document, paper)
    }

    /// Font size filling `box_height` with `lines` lines, clamped to the
    /// configured range.
    pub fn font_size(&self, box_height: f32, lines: usize) -> f32 {
        let per_line = box_height / lines.max(1) as f32;
        (per_line * self.config.font_fill_ratio)
            .clamp(self.config.min_font_size, self.config.max_font_size)
    }
}

/// Largest `(width, height)` with the image's aspect ratio fitting the box.
pub fn fit_scale(px_width: u32, px_height: u32, box_width: f32, box_height: f32) -> (f32, f32) {
    if px_width == 0 || px_height == 0 {
        return (0.0, 0.0);
    }
    let scale = (box_width / px_width as f32).min(box_height / px_height as f32);
    (px_width as f32 * scale, px_height as f32 * scale)
}

fn load_pixels(zone: &ImageZone, index: usize) -> Option<RgbaImage> {
    match &zone.payload {
        Some(ImagePayload::Pixels(pixels)) => Some(pixels.clone()),
        Some(ImagePayload::Stored { path }) => match ::image::open(path) {
            Ok(img) => Some(img.to_rgba8()),
            Err(err) => {
                warn!(index, path = %path.display(), %err, "Image payload unreadable; skipping");
                None
            }
        },
        None => {
            warn!(index, rect = ?zone.rect, "Image zone has no payload; skipping");
            None
        }
    }
}

/// Whether two page boxes overlap with positive area.
pub fn boxes_overlap(a: (f32, f32, f32, f32), b: (f32, f32, f32, f32)) -> bool {
    a.0 < b.0 + b.2 && b.0 < a.0 + a.2 && a.1 < b.1 + b.3 && b.1 < a.1 + a.3
}
