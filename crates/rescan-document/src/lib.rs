// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// rescan-document: Page reconstruction for Rescan.
//
// Turns one photograph of a paper page into an ordered, editable document
// model: perspective correction, text/image zone detection, paragraph
// grouping and reading order, a layout grid, and rendering onto a fixed-size
// output page (PDF).

pub mod image;
pub mod layout;
pub mod model;
pub mod pdf;
pub mod persist;
pub mod pipeline;
pub mod render;
pub mod scan;

// Re-export the primary structs so callers can use `rescan_document::DocumentPipeline` etc.
pub use crate::image::processor::ImageProcessor;
pub use layout::grid::LayoutGridAnalyzer;
pub use layout::paragraph::ParagraphOrganizer;
pub use model::{AnalyzedDocument, DocumentElement, DocumentGrid, GridCell, ImagePayload, ImageZone, TextZone};
pub use pdf::writer::PdfPageWriter;
pub use pipeline::DocumentPipeline;
pub use render::{DocumentRenderer, DrawInstruction, PageLayout, PageWriter};
pub use scan::detect::{ContourDetector, ImageprocContours, PrecomputedBlocks, TextBlock, TextBlockDetector};
pub use scan::perspective::{CorrectedPage, PerspectiveCorrector};
pub use scan::zones::ZoneDetector;

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrEngine;
