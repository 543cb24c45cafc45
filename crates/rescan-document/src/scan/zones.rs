// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Zone detection: split a straightened page into raw text blocks and image
// regions.

use image::{DynamicImage, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{close, dilate};
use rescan_core::Rect;
use rescan_core::config::ZoneConfig;
use tracing::{debug, info, instrument, warn};

use super::detect::{ContourDetector, TextBlock, TextBlockDetector};
use crate::image::color::{invert_regions, saturation_mask};
use crate::image::stats::RegionStats;
use crate::model::TextZone;

/// Raw, unmerged output of zone detection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneDetection {
    /// One zone per detected text block, in detector order.
    pub text_zones: Vec<TextZone>,
    /// Image regions that survived filtering and overlap resolution.
    pub image_rects: Vec<Rect>,
}

/// Classifies regions of a page as text or image.
///
/// Detection problems never fail the page: a detector error, an empty mask or
/// a region that cannot be re-read simply contributes nothing.
#[derive(Debug, Clone, Default)]
pub struct ZoneDetector {
    config: ZoneConfig,
}

impl ZoneDetector {
    pub fn new(config: ZoneConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    /// Run every detection pass over `image`.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(
        &self,
        image: &DynamicImage,
        detector: &dyn TextBlockDetector,
        contours: &dyn ContourDetector,
    ) -> ZoneDetection {
        let rgb = image.to_rgb8();
        let stats = RegionStats::new(&rgb);

        let inverted = self.find_inverted_regions(&rgb, &stats, contours);
        let text_zones = self.detect_text_zones(&rgb, &inverted, detector);
        let image_rects = self.detect_image_rects(&rgb, &stats, &text_zones, contours);

        info!(
            text_zones = text_zones.len(),
            image_zones = image_rects.len(),
            inverted_regions = inverted.len(),
            "Zone detection complete"
        );
        ZoneDetection {
            text_zones,
            image_rects,
        }
    }

    /// Strongly saturated, bright regions: the coloured banners that carry
    /// white lettering.
    pub fn find_inverted_regions(
        &self,
        rgb: &RgbImage,
        stats: &RegionStats,
        contours: &dyn ContourDetector,
    ) -> Vec<Rect> {
        let mask = saturation_mask(rgb, self.config.inverted_saturation_threshold);
        let mask = close(&mask, Norm::LInf, self.config.closing_radius);
        let min_area = page_area(rgb) * self.config.inverted_min_area_ratio;

        let regions: Vec<Rect> = contours
            .bounding_boxes(&mask)
            .into_iter()
            .filter(|rect| rect.area() as f64 >= min_area)
            .filter(|rect| {
                stats
                    .mean_brightness(rect)
                    .is_some_and(|v| v >= self.config.inverted_min_brightness)
            })
            .collect();
        debug!(regions = regions.len(), "Inverted regions found");
        regions
    }

    /// Text blocks from the page with `inverted` regions flipped first, plus
    /// any inverted region the page pass missed but a cropped re-read finds.
    pub fn detect_text_zones(
        &self,
        rgb: &RgbImage,
        inverted: &[Rect],
        detector: &dyn TextBlockDetector,
    ) -> Vec<TextZone> {
        let (width, height) = rgb.dimensions();
        let mut working = rgb.clone();
        invert_regions(&mut working, inverted);
        let page = DynamicImage::ImageRgb8(working);

        let blocks = detector.detect(&page).unwrap_or_else(|err| {
            warn!(%err, "Text detection failed; continuing without text blocks");
            Vec::new()
        });
        debug!(blocks = blocks.len(), "Text blocks detected");

        let coverage = self.config.inverted_coverage;
        let mut zones: Vec<TextZone> = blocks
            .into_iter()
            .filter_map(|TextBlock { rect, text }| {
                let Some(rect) = rect.clamp_to(width, height) else {
                    debug!(?rect, "Dropping text block outside the page");
                    return None;
                };
                if text.trim().is_empty() {
                    return None;
                }
                let is_inverted = inverted.iter().any(|r| r.coverage_of(&rect) >= coverage);
                Some(TextZone {
                    rect,
                    text,
                    inverted: is_inverted,
                })
            })
            .collect();

        let missed: Vec<Rect> = inverted
            .iter()
            .filter(|region| !zones.iter().any(|z| z.rect.coverage_of(region) >= coverage))
            .copied()
            .collect();
        if !missed.is_empty() {
            debug!(regions = missed.len(), "Re-reading uncovered inverted regions");
            let texts = self.recognize_regions(&page, &missed, detector);
            for (rect, text) in missed.into_iter().zip(texts) {
                let text = text.trim();
                if !text.is_empty() {
                    zones.push(TextZone::inverted(rect, text));
                }
            }
        }
        zones
    }

    /// Run the text detector on each region cropped out of `image`.
    ///
    /// Always returns one string per rectangle. Rectangles that are empty or
    /// not fully inside the image, and regions whose detection fails,
    /// contribute `""`.
    #[instrument(skip_all, fields(regions = rects.len()))]
    pub fn recognize_regions(
        &self,
        image: &DynamicImage,
        rects: &[Rect],
        detector: &dyn TextBlockDetector,
    ) -> Vec<String> {
        let (width, height) = (image.width() as i32, image.height() as i32);

        rects
            .iter()
            .enumerate()
            .map(|(index, rect)| {
                if rect.x < 0
                    || rect.y < 0
                    || !rect.is_valid()
                    || rect.right() > width
                    || rect.bottom() > height
                {
                    warn!(index, ?rect, "Invalid region; skipping recognition");
                    return String::new();
                }
                let crop = image.crop_imm(
                    rect.x as u32,
                    rect.y as u32,
                    rect.width as u32,
                    rect.height as u32,
                );
                match detector.detect(&crop) {
                    Ok(blocks) => {
                        let joined = blocks
                            .iter()
                            .map(|b| b.text.as_str())
                            .collect::<Vec<_>>()
                            .join("\n");
                        debug!(index, chars = joined.len(), "Region recognised");
                        joined
                    }
                    Err(err) => {
                        warn!(index, %err, "Region recognition failed");
                        String::new()
                    }
                }
            })
            .collect()
    }

    /// Image regions from the colour mask, falling back to an edge pass when
    /// no coloured region survives.
    pub fn detect_image_rects(
        &self,
        rgb: &RgbImage,
        stats: &RegionStats,
        text_zones: &[TextZone],
        contours: &dyn ContourDetector,
    ) -> Vec<Rect> {
        let cfg = &self.config;
        let area = page_area(rgb);
        let (width, height) = rgb.dimensions();

        let mask = saturation_mask(rgb, cfg.saturation_threshold);
        let mask = close(&mask, Norm::LInf, cfg.closing_radius);

        let colour: Vec<Rect> = contours
            .bounding_boxes(&mask)
            .into_iter()
            .filter(|rect| {
                let a = rect.area() as f64;
                a >= area * cfg.min_area_ratio && a <= area * cfg.max_area_ratio
            })
            .filter(|rect| {
                !(rect.touches_border(width, height)
                    && (rect.area() as f64) < area * cfg.border_min_area_ratio)
            })
            .filter(|rect| {
                stats
                    .channel_std_devs(rect)
                    .is_some_and(|devs| devs.iter().any(|&d| d > cfg.min_channel_std_dev))
            })
            .filter(|rect| !overlaps_text(rect, text_zones, cfg.overlap_threshold))
            .collect();

        if !colour.is_empty() {
            debug!(regions = colour.len(), "Colour image regions found");
            return colour;
        }

        debug!("No colour regions; trying edge-based fallback");
        let gray = DynamicImage::ImageRgb8(rgb.clone()).to_luma8();
        let blurred = gaussian_blur_f32(&gray, cfg.blur_sigma);
        let edges = canny(&blurred, cfg.canny_low, cfg.canny_high);
        let edges = dilate(&edges, Norm::LInf, cfg.closing_radius);

        let fallback: Vec<Rect> = contours
            .bounding_boxes(&edges)
            .into_iter()
            .filter(|rect| {
                let a = rect.area() as f64;
                a > area * cfg.fallback_min_area_ratio && a <= area * cfg.max_area_ratio
            })
            .filter(|rect| !overlaps_text(rect, text_zones, cfg.overlap_threshold))
            .collect();
        debug!(regions = fallback.len(), "Edge-based image regions found");
        fallback
    }
}

/// Whether `candidate` covers at least `threshold` of any text zone's area.
/// Text wins ties.
pub fn overlaps_text(candidate: &Rect, text_zones: &[TextZone], threshold: f64) -> bool {
    text_zones.iter().any(|zone| {
        let shared = candidate.intersection_area(&zone.rect);
        shared > 0 && candidate.coverage_of(&zone.rect) >= threshold
    })
}

fn page_area(rgb: &RgbImage) -> f64 {
    rgb.width() as f64 * rgb.height() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::detect::ImageprocContours;
    use image::Rgb;
    use rescan_core::config::AnalysisConfig;
    use rescan_core::error::{RescanError, Result};

    fn white_page(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([250, 250, 250]))
    }

    /// Paints a red/blue checkerboard, i.e. a busy, saturated photograph.
    fn paint_photo(img: &mut RgbImage, rect: Rect) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                let px = if (x / 8 + y / 8) % 2 == 0 {
                    Rgb([220, 40, 40])
                } else {
                    Rgb([40, 60, 220])
                };
                img.put_pixel(x as u32, y as u32, px);
            }
        }
    }

    fn no_text(_: &DynamicImage) -> Result<Vec<TextBlock>> {
        Ok(Vec::new())
    }

    #[test]
    fn overlap_exclusion_across_threshold_presets() {
        let zones = [TextZone::new(Rect::new(100, 100, 100, 50), "caption")];
        // Covers 80% and 60% of the text zone respectively.
        let mostly = Rect::new(0, 0, 180, 400);
        let partly = Rect::new(0, 0, 160, 400);

        for threshold in [0.5, 0.7] {
            assert!(overlaps_text(&mostly, &zones, threshold), "threshold {threshold}");
        }
        assert!(!overlaps_text(&partly, &zones, 0.7));
        assert!(overlaps_text(&partly, &zones, 0.5));
        assert!(!overlaps_text(&Rect::new(300, 300, 10, 10), &zones, 0.5));
    }

    #[test]
    fn exact_threshold_coverage_goes_to_text() {
        let zones = [TextZone::new(Rect::new(0, 0, 100, 10), "heading")];
        let seventy = Rect::new(0, 0, 70, 200);
        let fifty = Rect::new(0, 0, 50, 200);

        let strict = AnalysisConfig::strict().zones.overlap_threshold;
        let relaxed = AnalysisConfig::relaxed().zones.overlap_threshold;
        assert!(overlaps_text(&seventy, &zones, strict));
        assert!(overlaps_text(&fifty, &zones, relaxed));
        assert!(!overlaps_text(&fifty, &zones, strict));
        assert!(!overlaps_text(&Rect::new(0, 0, 49, 200), &zones, relaxed));
    }

    #[test]
    fn small_photo_survives_strict_area_floor_only() {
        // 60x40 on a 400x400 page: 1.5% of the page.
        let photo = Rect::new(170, 180, 60, 40);
        let mut rgb = white_page(400, 400);
        paint_photo(&mut rgb, photo);
        let stats = RegionStats::new(&rgb);

        let strict = ZoneDetector::new(AnalysisConfig::strict().zones);
        assert_eq!(
            strict.detect_image_rects(&rgb, &stats, &[], &ImageprocContours),
            vec![photo]
        );

        // Below the 2% colour floor, and its edge outline stays under the 5%
        // fallback floor.
        let relaxed = ZoneDetector::new(AnalysisConfig::relaxed().zones);
        let rects = relaxed.detect_image_rects(&rgb, &stats, &[], &ImageprocContours);
        assert!(rects.is_empty(), "{rects:?}");
    }

    /// Paints a grey checkerboard: busy but unsaturated, so only the edge
    /// pass can see it.
    fn paint_grey_photo(img: &mut RgbImage, rect: Rect) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                let v = if (x / 6 + y / 6) % 2 == 0 { 40 } else { 200 };
                img.put_pixel(x as u32, y as u32, Rgb([v, v, v]));
            }
        }
    }

    #[test]
    fn edge_fallback_needs_five_percent_of_the_page() {
        let detector = ZoneDetector::default();

        // 60x60 on 200x200 is 9%; the dilated outline is larger still.
        let large = Rect::new(70, 70, 60, 60);
        let mut rgb = white_page(200, 200);
        paint_grey_photo(&mut rgb, large);
        let stats = RegionStats::new(&rgb);
        let rects = detector.detect_image_rects(&rgb, &stats, &[], &ImageprocContours);
        assert_eq!(rects.len(), 1, "{rects:?}");
        assert_eq!(rects[0].intersection_area(&large), large.area());

        // 20x20 is 1%; even dilated by the closing radius it stays under 5%.
        let small = Rect::new(90, 90, 20, 20);
        let mut rgb = white_page(200, 200);
        paint_grey_photo(&mut rgb, small);
        let stats = RegionStats::new(&rgb);
        let rects = detector.detect_image_rects(&rgb, &stats, &[], &ImageprocContours);
        assert!(rects.is_empty(), "{rects:?}");
    }

    #[test]
    fn saturated_photo_becomes_an_image_zone() {
        let mut page = white_page(400, 400);
        let photo = Rect::new(50, 200, 150, 120);
        paint_photo(&mut page, photo);

        // Answers for the full page only; a photo crop reads as nothing.
        let title = |img: &DynamicImage| -> Result<Vec<TextBlock>> {
            if img.width() != 400 {
                return Ok(Vec::new());
            }
            Ok(vec![TextBlock::new(Rect::new(50, 40, 300, 30), "Title")])
        };
        let found = ZoneDetector::default().detect(
            &DynamicImage::ImageRgb8(page),
            &title,
            &ImageprocContours,
        );

        assert_eq!(found.text_zones, vec![TextZone::new(Rect::new(50, 40, 300, 30), "Title")]);
        assert_eq!(found.image_rects, vec![photo]);
    }

    #[test]
    fn image_candidate_over_text_is_dropped_for_both_presets() {
        for config in [AnalysisConfig::strict(), AnalysisConfig::relaxed()] {
            let mut page = white_page(400, 400);
            paint_photo(&mut page, Rect::new(50, 200, 150, 120));
            let caption = |img: &DynamicImage| -> Result<Vec<TextBlock>> {
                if img.width() != 400 {
                    return Ok(Vec::new());
                }
                Ok(vec![TextBlock::new(Rect::new(60, 210, 100, 50), "caption")])
            };
            let found = ZoneDetector::new(config.zones).detect(
                &DynamicImage::ImageRgb8(page),
                &caption,
                &ImageprocContours,
            );
            assert_eq!(found.text_zones.len(), 1);
            assert!(found.image_rects.is_empty(), "{:?}", found.image_rects);
        }
    }

    #[test]
    fn uniform_colour_block_is_not_an_image() {
        let mut page = white_page(300, 300);
        for y in 100..200 {
            for x in 100..200 {
                page.put_pixel(x, y, Rgb([30, 160, 60]));
            }
        }
        let rgb = page;
        let stats = RegionStats::new(&rgb);
        let rects = ZoneDetector::default().detect_image_rects(&rgb, &stats, &[], &ImageprocContours);
        // The flat block fails the variance check; the edge fallback then
        // finds its outline (>5% of the page) instead.
        assert!(rects.iter().all(|r| r.area() > 300 * 300 / 20), "{rects:?}");
    }

    #[test]
    fn blank_page_has_no_zones() {
        let found = ZoneDetector::default().detect(
            &DynamicImage::ImageRgb8(white_page(200, 200)),
            &no_text,
            &ImageprocContours,
        );
        assert_eq!(found, ZoneDetection::default());
    }

    #[test]
    fn text_detector_failure_degrades_to_no_text() {
        let failing = |_: &DynamicImage| -> Result<Vec<TextBlock>> {
            Err(RescanError::OcrError("engine crashed".into()))
        };
        let found = ZoneDetector::default().detect(
            &DynamicImage::ImageRgb8(white_page(100, 100)),
            &failing,
            &ImageprocContours,
        );
        assert!(found.text_zones.is_empty());
    }

    #[test]
    fn banner_missed_by_page_pass_is_reread_cropped() {
        let mut page = white_page(300, 200);
        let banner = Rect::new(20, 20, 200, 40);
        for y in 20..60 {
            for x in 20..220 {
                // White strokes 3px wide every 10px stand in for lettering.
                let stroke = (30..50).contains(&y) && x % 10 < 3;
                let px = if stroke { Rgb([255, 255, 255]) } else { Rgb([30, 60, 200]) };
                page.put_pixel(x, y, px);
            }
        }

        // Nothing on the full page; "SALE" on the 200x40 crop.
        let detector = |img: &DynamicImage| -> Result<Vec<TextBlock>> {
            if (img.width(), img.height()) == (200, 40) {
                Ok(vec![TextBlock::new(Rect::new(5, 5, 100, 30), "SALE")])
            } else {
                Ok(Vec::new())
            }
        };
        let found = ZoneDetector::default().detect(
            &DynamicImage::ImageRgb8(page),
            &detector,
            &ImageprocContours,
        );

        assert_eq!(found.text_zones, vec![TextZone::inverted(banner, "SALE")]);
        assert!(found.image_rects.is_empty(), "{:?}", found.image_rects);
    }

    #[test]
    fn page_blocks_over_a_banner_are_flagged_inverted() {
        let rgb = white_page(100, 100);
        let banner = Rect::new(10, 10, 80, 20);
        let block = |_: &DynamicImage| -> Result<Vec<TextBlock>> {
            Ok(vec![
                TextBlock::new(Rect::new(12, 12, 76, 16), "OFFER"),
                TextBlock::new(Rect::new(10, 60, 60, 12), "body"),
            ])
        };
        let zones = ZoneDetector::default().detect_text_zones(&rgb, &[banner], &block);
        assert_eq!(zones.len(), 2);
        assert!(zones[0].inverted);
        assert!(!zones[1].inverted);
    }

    #[test]
    fn invalid_regions_and_failures_read_as_empty() {
        let image = DynamicImage::ImageRgb8(white_page(100, 100));
        let detector = |img: &DynamicImage| -> Result<Vec<TextBlock>> {
            if img.width() == 13 {
                return Err(RescanError::OcrError("bad crop".into()));
            }
            Ok(vec![
                TextBlock::new(Rect::new(0, 0, 5, 5), "one"),
                TextBlock::new(Rect::new(0, 6, 5, 5), "two"),
            ])
        };
        let texts = ZoneDetector::default().recognize_regions(
            &image,
            &[
                Rect::new(10, 10, 20, 20),
                Rect::new(-1, 0, 10, 10),
                Rect::new(90, 90, 20, 20),
                Rect::new(0, 0, 0, 10),
                Rect::new(0, 0, 13, 10),
            ],
            &detector,
        );
        assert_eq!(texts, vec!["one\ntwo", "", "", "", ""]);
    }
}
