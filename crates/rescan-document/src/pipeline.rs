// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document pipeline: photograph in, analysed document (and PDF page) out.

use std::path::Path;

use ::image::DynamicImage;
use rescan_core::error::{PipelineStage, Result};
use rescan_core::{AnalysisConfig, PaperSize, Rect};
use tracing::{info, instrument, warn};

use crate::image::ImageProcessor;
use crate::layout::grid::LayoutGridAnalyzer;
use crate::layout::paragraph::{ParagraphOrganizer, ReadingKey, reading_order};
use crate::model::{AnalyzedDocument, DocumentElement, DocumentGrid, ImagePayload, ImageZone};
use crate::pdf::PdfPageWriter;
use crate::render::{DocumentRenderer, PageLayout, PageWriter};
use crate::scan::detect::{ContourDetector, TextBlockDetector};
use crate::scan::perspective::PerspectiveCorrector;
use crate::scan::zones::ZoneDetector;

/// Runs every stage for one page at a time.
///
/// Stages run strictly in sequence: decode, downscale, perspective
/// correction, zone detection, paragraph organisation, assembly. Nothing is
/// carried over between documents.
pub struct DocumentPipeline {
    config: AnalysisConfig,
    text_detector: Box<dyn TextBlockDetector>,
    contour_detector: Box<dyn ContourDetector>,
}

impl DocumentPipeline {
    pub fn new(
        config: AnalysisConfig,
        text_detector: Box<dyn TextBlockDetector>,
        contour_detector: Box<dyn ContourDetector>,
    ) -> Self {
        Self {
            config,
            text_detector,
            contour_detector,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse the photograph stored at `path`.
    pub fn analyze_path(&self, path: impl AsRef<Path>) -> Result<AnalyzedDocument> {
        let page = ImageProcessor::open(path).map_err(|err| err.in_stage(PipelineStage::Decode, None))?;
        self.analyze_image(page.into_dynamic())
    }

    /// Analyse an encoded photograph (JPEG, PNG, ...).
    pub fn analyze_bytes(&self, data: &[u8]) -> Result<AnalyzedDocument> {
        let page = ImageProcessor::from_bytes(data).map_err(|err| err.in_stage(PipelineStage::Decode, None))?;
        self.analyze_image(page.into_dynamic())
    }

    /// Analyse a decoded photograph.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn analyze_image(&self, image: DynamicImage) -> Result<AnalyzedDocument> {
        let photo = ImageProcessor::from_dynamic(image).downscale(self.config.max_dimension);

        let corrector = PerspectiveCorrector::new(self.config.perspective.clone());
        let corrected = corrector.correct_page(photo.as_dynamic(), self.contour_detector.as_ref());
        let moved = self.text_detector.for_corrected_page(&corrected);
        let text_detector = moved.as_deref().unwrap_or(self.text_detector.as_ref());
        let page = ImageProcessor::from_dynamic(corrected.image);

        let zones = ZoneDetector::new(self.config.zones.clone()).detect(
            page.as_dynamic(),
            text_detector,
            self.contour_detector.as_ref(),
        );

        let organizer = ParagraphOrganizer::new(self.config.paragraphs.clone());
        let mut items: Vec<(DocumentElement, ReadingKey)> = organizer
            .paragraphs(&zones.text_zones)
            .into_iter()
            .map(|(zone, key)| (zone.into(), key))
            .collect();
        items.extend(
            zones
                .image_rects
                .iter()
                .map(|rect| (image_element(&page, rect).into(), ReadingKey::of_rect(rect))),
        );

        let elements = reading_order(items, organizer.reading_row_ratio());
        let document = AnalyzedDocument::new(elements, page.width(), page.height())
            .with_source_image(page.as_dynamic().to_rgba8());
        document
            .validate()
            .map_err(|err| err.in_stage(PipelineStage::Assemble, None))?;

        info!(
            elements = document.elements.len(),
            text_zones = document.text_zones().count(),
            page_width = document.page_width,
            page_height = document.page_height,
            "Page analysed"
        );
        Ok(document)
    }

    /// Layout grid for `document`, with unused tracks removed.
    pub fn layout_grid(&self, document: &AnalyzedDocument) -> DocumentGrid {
        let analyzer = LayoutGridAnalyzer::new(self.config.grid.clone());
        analyzer.optimize_grid(&analyzer.analyze_layout(document))
    }

    /// Lay `document` out on a `paper` page.
    pub fn render(&self, document: &AnalyzedDocument, paper: PaperSize) -> PageLayout {
        DocumentRenderer::new(self.config.render.clone()).render_page(document, paper)
    }

    /// Lay `document` out and hand the page to `writer`.
    pub fn render_with(
        &self,
        document: &AnalyzedDocument,
        paper: PaperSize,
        writer: &dyn PageWriter,
    ) -> Result<Vec<u8>> {
        writer
            .write_page(&self.render(document, paper))
            .map_err(|err| err.in_stage(PipelineStage::Write, None))
    }

    /// Render `document` as a single-page PDF.
    pub fn render_pdf(&self, document: &AnalyzedDocument, paper: PaperSize) -> Result<Vec<u8>> {
        self.render_with(document, paper, &PdfPageWriter::default())
    }
}

/// An image element holding the pixels under `rect`, or no payload if the
/// crop is empty.
fn image_element(page: &ImageProcessor, rect: &Rect) -> ImageZone {
    let payload = page
        .crop_rect(rect)
        .map(|crop| ImagePayload::Pixels(crop.into_dynamic().to_rgba8()));
    if payload.is_none() {
        warn!(?rect, "Image region lies outside the page; keeping it without pixels");
    }
    ImageZone::new(*rect, payload)
}
