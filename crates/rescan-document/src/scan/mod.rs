// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page scanning stages: perspective correction, zone detection, and the
// detector collaborators they rely on (OCR behind the `ocr` feature).

pub mod detect;
pub mod perspective;
pub mod zones;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use detect::{ContourDetector, ImageprocContours, PrecomputedBlocks, TextBlock, TextBlockDetector};
pub use perspective::{CorrectedPage, PerspectiveCorrector};
pub use zones::{ZoneDetection, ZoneDetector};

#[cfg(feature = "ocr")]
pub use ocr::OcrEngine;
