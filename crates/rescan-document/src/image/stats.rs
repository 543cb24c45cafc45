// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-region pixel statistics backed by summed-area tables, so that every
// candidate rectangle is measured in constant time.

use image::RgbImage;
use rescan_core::Rect;

use super::color::value;

/// Summed-area table over one scalar per pixel.
///
/// `data[y * (width+1) + x]` holds the sum over `[0, x) x [0, y)`. The table
/// is `(width+1) x (height+1)` with a zero-padded border.
struct IntegralTable {
    stride: usize,
    data: Vec<u64>,
}

impl IntegralTable {
    fn build(width: u32, height: u32, sample: impl Fn(u32, u32) -> u64) -> Self {
        let stride = (width + 1) as usize;
        let mut data = vec![0u64; stride * (height + 1) as usize];

        for y in 0..height {
            let mut row_sum: u64 = 0;
            for x in 0..width {
                row_sum += sample(x, y);
                let idx = (y + 1) as usize * stride + (x + 1) as usize;
                let above = y as usize * stride + (x + 1) as usize;
                data[idx] = row_sum + data[above];
            }
        }

        Self { stride, data }
    }

    /// Sum over the half-open region `[x1, x2) x [y1, y2)` (already clipped).
    fn sum(&self, x1: usize, y1: usize, x2: usize, y2: usize) -> u64 {
        // S = I[y2][x2] - I[y1][x2] - I[y2][x1] + I[y1][x1]
        self.data[y2 * self.stride + x2] + self.data[y1 * self.stride + x1]
            - self.data[y1 * self.stride + x2]
            - self.data[y2 * self.stride + x1]
    }
}

/// Colour statistics for arbitrary rectangles of one RGB image.
pub struct RegionStats {
    width: u32,
    height: u32,
    sums: [IntegralTable; 3],
    squares: [IntegralTable; 3],
    value: IntegralTable,
}

impl RegionStats {
    pub fn new(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let channel = |c: usize| {
            IntegralTable::build(width, height, |x, y| image.get_pixel(x, y).0[c] as u64)
        };
        let channel_sq = |c: usize| {
            IntegralTable::build(width, height, |x, y| {
                let v = image.get_pixel(x, y).0[c] as u64;
                v * v
            })
        };

        Self {
            width,
            height,
            sums: [channel(0), channel(1), channel(2)],
            squares: [channel_sq(0), channel_sq(1), channel_sq(2)],
            value: IntegralTable::build(width, height, |x, y| {
                value(image.get_pixel(x, y).0) as u64
            }),
        }
    }

    /// Clip `rect` to the image; returns the table corners and pixel count.
    fn bounds(&self, rect: &Rect) -> Option<(usize, usize, usize, usize, f64)> {
        let r = rect.clamp_to(self.width, self.height)?;
        let (x1, y1) = (r.x as usize, r.y as usize);
        let (x2, y2) = (r.right() as usize, r.bottom() as usize);
        Some((x1, y1, x2, y2, r.area() as f64))
    }

    /// Population standard deviation of each RGB channel, or `None` if
    /// `rect` misses the image.
    pub fn channel_std_devs(&self, rect: &Rect) -> Option<[f64; 3]> {
        let (x1, y1, x2, y2, n) = self.bounds(rect)?;
        Some(std::array::from_fn(|c| {
            let mean = self.sums[c].sum(x1, y1, x2, y2) as f64 / n;
            let mean_sq = self.squares[c].sum(x1, y1, x2, y2) as f64 / n;
            (mean_sq - mean * mean).max(0.0).sqrt()
        }))
    }

    /// Mean HSV value, i.e. brightness (0-255).
    pub fn mean_brightness(&self, rect: &Rect) -> Option<f64> {
        let (x1, y1, x2, y2, n) = self.bounds(rect)?;
        Some(self.value.sum(x1, y1, x2, y2) as f64 / n)
    }
}
