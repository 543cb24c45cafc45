// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detector collaborators: the seams where OCR and contour extraction plug
// into the pipeline.

use std::path::Path;

use image::{DynamicImage, GrayImage};
use imageproc::contours::{BorderType, find_contours};
use rescan_core::error::{RescanError, Result};
use rescan_core::{Point, Rect};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::perspective::CorrectedPage;

/// A block of recognised text and where it sits in the image it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub rect: Rect,
    pub text: String,
}

impl TextBlock {
    pub fn new(rect: Rect, text: impl Into<String>) -> Self {
        Self {
            rect,
            text: text.into(),
        }
    }
}

/// Finds text blocks in an image.
///
/// Called once for the full page and again for individual region crops, so
/// implementations must not assume they only ever see the whole page.
/// Asynchronous engines should block until their result is complete.
pub trait TextBlockDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<TextBlock>>;

    /// A detector to use on `page` instead of this one.
    ///
    /// Detectors that read pixels need nothing here. Detectors whose answers
    /// are fixed in photo coordinates return a copy moved onto the page.
    fn for_corrected_page(&self, _page: &CorrectedPage) -> Option<Box<dyn TextBlockDetector>> {
        None
    }
}

impl<F> TextBlockDetector for F
where
    F: Fn(&DynamicImage) -> Result<Vec<TextBlock>>,
{
    fn detect(&self, image: &DynamicImage) -> Result<Vec<TextBlock>> {
        self(image)
    }
}

/// A closed outline in pixel coordinates.
pub type Outline = Vec<Point>;

/// Extracts region outlines from a binary mask (non-zero = foreground).
pub trait ContourDetector {
    /// Outermost outlines only; holes and nested borders are skipped.
    fn outlines(&self, mask: &GrayImage) -> Vec<Outline>;

    /// Bounding boxes of [`outlines`](Self::outlines), skipping degenerate ones.
    fn bounding_boxes(&self, mask: &GrayImage) -> Vec<Rect> {
        self.outlines(mask)
            .iter()
            .filter_map(|outline| outline_bounds(outline))
            .collect()
    }
}

/// Half-open bounding box of an outline, or `None` if it has no area.
pub fn outline_bounds(outline: &[Point]) -> Option<Rect> {
    let first = outline.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in outline {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    // Contour points are pixel centres, so the right/bottom pixel is included.
    let rect = Rect::from_edges(
        min_x as i32,
        min_y as i32,
        max_x as i32 + 1,
        max_y as i32 + 1,
    );
    rect.is_valid().then_some(rect)
}

/// Border-following contour extraction from `imageproc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageprocContours;

impl ContourDetector for ImageprocContours {
    fn outlines(&self, mask: &GrayImage) -> Vec<Outline> {
        let contours = find_contours::<i32>(mask);
        let outlines: Vec<Outline> = contours
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| {
                c.points
                    .iter()
                    .map(|p| Point::new(p.x as f32, p.y as f32))
                    .collect()
            })
            .collect();
        debug!(outlines = outlines.len(), "External contours extracted");
        outlines
    }
}

/// Text blocks recognised ahead of time by an external OCR engine.
///
/// The blocks refer to a photograph of `page_width` x `page_height` pixels.
/// When asked about an image with the same aspect ratio (e.g. the downscaled
/// photo) the blocks are scaled to fit; any other image, such as a region
/// crop, yields no blocks. After perspective correction they are carried
/// onto the warped page through [`TextBlockDetector::for_corrected_page`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedBlocks {
    pub page_width: u32,
    pub page_height: u32,
    pub blocks: Vec<TextBlock>,
}

impl PrecomputedBlocks {
    pub fn new(page_width: u32, page_height: u32, blocks: Vec<TextBlock>) -> Self {
        Self {
            page_width,
            page_height,
            blocks,
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RescanError::SourceMissing(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

impl PrecomputedBlocks {
    /// The blocks as they fall on a `width` x `height` image. Images with a
    /// different aspect ratio get none.
    fn scaled_to(&self, width: u32, height: u32) -> Vec<TextBlock> {
        if (width, height) == (self.page_width, self.page_height) {
            return self.blocks.clone();
        }
        if self.page_width == 0 || self.page_height == 0 {
            return Vec::new();
        }

        let sx = width as f64 / self.page_width as f64;
        let sy = height as f64 / self.page_height as f64;
        if (sx - sy).abs() > 0.01 * sx.max(sy) {
            debug!(width, height, "Image does not match the recorded page; no blocks");
            return Vec::new();
        }

        self.blocks
            .iter()
            .filter_map(|block| {
                let r = block.rect;
                let rect = Rect::from_edges(
                    (r.x as f64 * sx) as i32,
                    (r.y as f64 * sy) as i32,
                    (r.right() as f64 * sx).ceil() as i32,
                    (r.bottom() as f64 * sy).ceil() as i32,
                );
                if !rect.is_valid() {
                    warn!(?r, "Block vanished when scaled; dropping it");
                    return None;
                }
                Some(TextBlock::new(rect, block.text.clone()))
            })
            .collect()
    }
}

impl TextBlockDetector for PrecomputedBlocks {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<TextBlock>> {
        Ok(self.scaled_to(image.width(), image.height()))
    }

    fn for_corrected_page(&self, page: &CorrectedPage) -> Option<Box<dyn TextBlockDetector>> {
        if !page.is_warped() {
            return None;
        }
        let (width, height) = page.source_size;
        let blocks: Vec<TextBlock> = self
            .scaled_to(width, height)
            .into_iter()
            .filter_map(|TextBlock { rect, text }| match page.map_rect(&rect) {
                Some(mapped) => Some(TextBlock::new(mapped, text)),
                None => {
                    debug!(?rect, "Block lies off the corrected page; dropping it");
                    None
                }
            })
            .collect();
        debug!(blocks = blocks.len(), "Precomputed blocks moved onto the corrected page");
        Some(Box::new(PrecomputedBlocks::new(
            page.image.width(),
            page.image.height(),
            blocks,
        )))
    }
}
