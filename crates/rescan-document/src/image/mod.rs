// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: decoding, downscaling, cropping, colour masks, and
// per-region pixel statistics.

pub mod color;
pub mod processor;
pub mod stats;

pub use processor::ImageProcessor;
pub use stats::RegionStats;
