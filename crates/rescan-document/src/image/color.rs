// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour-space helpers: HSV saturation/value, saturation masks, and local
// inversion of light-on-colour regions.

use image::{GrayImage, Luma, RgbImage};
use rescan_core::Rect;

/// HSV saturation scaled to 0-255 (`(max - min) * 255 / max`).
pub fn saturation([r, g, b]: [u8; 3]) -> u8 {
    let max = r.max(g).max(b) as u32;
    let min = r.min(g).min(b) as u32;
    if max == 0 {
        0
    } else {
        ((max - min) * 255 / max) as u8
    }
}

/// HSV value (the brightest channel).
pub fn value([r, g, b]: [u8; 3]) -> u8 {
    r.max(g).max(b)
}

/// Binary mask: 255 where saturation exceeds `threshold`, 0 elsewhere.
pub fn saturation_mask(image: &RgbImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if saturation(image.get_pixel(x, y).0) > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Invert every pixel inside each rectangle (clipped to the image).
pub fn invert_regions(image: &mut RgbImage, regions: &[Rect]) {
    let (width, height) = image.dimensions();
    for region in regions {
        let Some(r) = region.clamp_to(width, height) else {
            continue;
        };
        for y in r.y as u32..r.bottom() as u32 {
            for x in r.x as u32..r.right() as u32 {
                let pixel = image.get_pixel_mut(x, y);
                for channel in pixel.0.iter_mut() {
                    *channel = 255 - *channel;
                }
            }
        }
    }
}
