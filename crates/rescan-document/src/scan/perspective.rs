// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective correction: find the page outline in a photograph and warp it
// to an upright rectangle.

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::morphology::dilate;
use rescan_core::config::PerspectiveConfig;
use rescan_core::geometry::{is_convex, perimeter, polygon_area, simplify_polygon, sort_quad_corners};
use rescan_core::{Point, Rect};
use tracing::{debug, info, instrument, warn};

use super::detect::ContourDetector;

/// Straightens a photographed page.
///
/// ## Pipeline
///
/// 1. Convert to grayscale
/// 2. Gaussian blur for noise reduction
/// 3. Canny edge detection, dilated so the page border forms a closed ring
/// 4. Extract outer contours through the [`ContourDetector`]
/// 5. Keep contours covering at least `min_area_ratio` of the image whose
///    simplified polygon has exactly four convex corners; take the largest
/// 6. Warp the quadrilateral onto a rectangle whose sides are the longer of
///    each pair of opposing edges
///
/// When no page outline is found the input is returned unchanged.
#[derive(Debug, Clone, Default)]
pub struct PerspectiveCorrector {
    config: PerspectiveConfig,
}

impl PerspectiveCorrector {
    pub fn new(config: PerspectiveConfig) -> Self {
        Self { config }
    }

    /// Locate the page outline as `[top_left, top_right, bottom_right, bottom_left]`.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect_page_quad(
        &self,
        image: &DynamicImage,
        contours: &dyn ContourDetector,
    ) -> Option<[Point; 4]> {
        let gray = image.to_luma8();
        let blurred = gaussian_blur_f32(&gray, self.config.blur_sigma);
        let mut edges = canny(&blurred, self.config.canny_low, self.config.canny_high);
        if self.config.dilate_radius > 0 {
            edges = dilate(&edges, Norm::LInf, self.config.dilate_radius);
        }

        let outlines = contours.outlines(&edges);
        debug!(outlines = outlines.len(), "Page outline candidates");

        let min_area = image.width() as f32 * image.height() as f32 * self.config.min_area_ratio;
        let mut best: Option<([Point; 4], f32)> = None;

        for outline in &outlines {
            let area = polygon_area(outline);
            if area < min_area {
                continue;
            }
            let epsilon = (self.config.approx_epsilon_ratio * perimeter(outline) as f64) as f32;
            let polygon = simplify_polygon(outline, epsilon);
            let Ok(corners) = <[Point; 4]>::try_from(polygon) else {
                continue;
            };
            if !is_convex(&corners) {
                continue;
            }
            if best.is_none_or(|(_, best_area)| area > best_area) {
                best = Some((corners, area));
            }
        }

        best.map(|(corners, area)| {
            debug!(area, min_area, "Page outline found");
            sort_quad_corners(corners)
        })
    }

    /// Straighten `image`. Returns an identical copy when no page is found.
    pub fn correct(&self, image: &DynamicImage, contours: &dyn ContourDetector) -> DynamicImage {
        self.correct_page(image, contours).image
    }

    /// Straighten `image`, keeping the map from photo to page coordinates.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn correct_page(&self, image: &DynamicImage, contours: &dyn ContourDetector) -> CorrectedPage {
        let source_size = (image.width(), image.height());
        let unchanged = || CorrectedPage {
            image: image.clone(),
            source_size,
            projection: None,
        };

        let Some(quad) = self.detect_page_quad(image, contours) else {
            warn!("No page outline found; skipping perspective correction");
            return unchanged();
        };
        let Some((projection, out_w, out_h)) = page_projection(quad) else {
            warn!(?quad, "Failed to compute projective transform; returning unchanged");
            return unchanged();
        };

        let rgba_input = image.to_rgba8();
        let mut output = RgbaImage::new(out_w, out_h);
        warp_into(
            &rgba_input,
            &projection,
            Interpolation::Bilinear,
            Rgba([255u8, 255, 255, 255]),
            &mut output,
        );

        info!(out_w, out_h, "Perspective correction applied");
        CorrectedPage {
            image: DynamicImage::ImageRgba8(output),
            source_size,
            projection: Some(projection),
        }
    }
}

/// A straightened page and how photo coordinates land on it.
#[derive(Clone)]
pub struct CorrectedPage {
    pub image: DynamicImage,
    /// Size of the photograph the page was cut from.
    pub source_size: (u32, u32),
    projection: Option<Projection>,
}

impl CorrectedPage {
    /// Whether the page was actually warped.
    pub fn is_warped(&self) -> bool {
        self.projection.is_some()
    }

    /// Where `rect`, given in photo coordinates, lies on the page: the
    /// bounding box of its warped corners, clipped to the page. `None` when
    /// it falls outside.
    pub fn map_rect(&self, rect: &Rect) -> Option<Rect> {
        let (width, height) = (self.image.width(), self.image.height());
        let Some(projection) = self.projection else {
            return rect.clamp_to(width, height);
        };

        let (left, top) = (rect.x as f32, rect.y as f32);
        let (right, bottom) = (rect.right() as f32, rect.bottom() as f32);
        let corners = [(left, top), (right, top), (right, bottom), (left, bottom)].map(|p| projection * p);

        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }

        Rect::from_edges(
            min_x.round() as i32,
            min_y.round() as i32,
            max_x.round() as i32,
            max_y.round() as i32,
        )
        .clamp_to(width, height)
    }
}

/// Target size for a quad: the longer of each pair of opposing edges, truncated.
pub fn quad_output_size([tl, tr, br, bl]: [Point; 4]) -> (u32, u32) {
    let width = tl.distance(&tr).max(bl.distance(&br));
    let height = tl.distance(&bl).max(tr.distance(&br));
    (width as u32, height as u32)
}

/// Projection taking the quadrilateral onto an upright rectangle, with the
/// rectangle's size.
fn page_projection(quad: [Point; 4]) -> Option<(Projection, u32, u32)> {
    let (out_w, out_h) = quad_output_size(quad);
    if out_w == 0 || out_h == 0 {
        return None;
    }

    let src = quad.map(|p| (p.x, p.y));
    let dest = [
        (0.0, 0.0),
        (out_w as f32, 0.0),
        (out_w as f32, out_h as f32),
        (0.0, out_h as f32),
    ];
    let projection = Projection::from_control_points(src, dest)?;
    Some((projection, out_w, out_h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::detect::{ImageprocContours, Outline};
    use image::{GrayImage, Luma};

    /// Returns the same outlines whatever the mask.
    struct FixedOutlines(Vec<Outline>);

    impl ContourDetector for FixedOutlines {
        fn outlines(&self, _mask: &GrayImage) -> Vec<Outline> {
            self.0.clone()
        }
    }

    fn quad(points: [(f32, f32); 4]) -> Outline {
        points.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn blank_image_is_returned_unchanged() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 300, Luma([200u8])));
        let out = PerspectiveCorrector::default().correct(&img, &ImageprocContours);
        assert_eq!(out, img);
    }

    #[test]
    fn small_contours_are_ignored() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 100, Rgba([90, 90, 90, 255])));
        // 20x20 = 4% of the image, below the 10% floor.
        let detector = FixedOutlines(vec![quad([(10.0, 10.0), (30.0, 10.0), (30.0, 30.0), (10.0, 30.0)])]);
        let out = PerspectiveCorrector::default().correct(&img, &detector);
        assert_eq!(out, img);
    }

    #[test]
    fn concave_outline_is_ignored() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(100, 100));
        let dart = quad([(0.0, 0.0), (90.0, 45.0), (0.0, 90.0), (40.0, 45.0)]);
        let corrector = PerspectiveCorrector::default();
        assert!(corrector.detect_page_quad(&img, &FixedOutlines(vec![dart])).is_none());
    }

    #[test]
    fn largest_quad_wins_and_sets_output_size() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(400, 400, Rgba([240, 240, 240, 255])));
        let small = quad([(10.0, 10.0), (160.0, 10.0), (160.0, 160.0), (10.0, 160.0)]);
        let large = quad([(20.0, 30.0), (330.0, 20.0), (350.0, 380.0), (10.0, 370.0)]);
        let detector = FixedOutlines(vec![small, large]);

        let corrector = PerspectiveCorrector::default();
        let corners = corrector.detect_page_quad(&img, &detector).expect("quad");
        assert_eq!(corners[0], Point::new(20.0, 30.0));
        assert_eq!(corners[2], Point::new(350.0, 380.0));

        let (w, h) = quad_output_size(corners);
        let out = corrector.correct(&img, &detector);
        assert_eq!((out.width(), out.height()), (w, h));
    }

    #[test]
    fn photo_rects_follow_the_page_onto_the_corrected_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(400, 500, Rgba([240, 240, 240, 255])));
        let page = quad([(50.0, 60.0), (350.0, 60.0), (350.0, 440.0), (50.0, 440.0)]);
        let corrected = PerspectiveCorrector::default().correct_page(&img, &FixedOutlines(vec![page]));

        assert!(corrected.is_warped());
        assert_eq!(corrected.source_size, (400, 500));
        assert_eq!((corrected.image.width(), corrected.image.height()), (300, 380));
        assert_eq!(
            corrected.map_rect(&Rect::new(100, 100, 50, 20)),
            Some(Rect::new(50, 40, 50, 20))
        );
        // Straddling the page edge: clipped to the page.
        assert_eq!(
            corrected.map_rect(&Rect::new(20, 70, 60, 10)),
            Some(Rect::new(0, 10, 30, 10))
        );
        assert_eq!(corrected.map_rect(&Rect::new(0, 0, 40, 40)), None);
    }

    #[test]
    fn unwarped_pages_map_rects_unchanged() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(120, 80, Luma([200u8])));
        let corrected = PerspectiveCorrector::default().correct_page(&img, &ImageprocContours);
        assert!(!corrected.is_warped());
        assert_eq!(corrected.map_rect(&Rect::new(10, 10, 30, 20)), Some(Rect::new(10, 10, 30, 20)));
        assert_eq!(corrected.map_rect(&Rect::new(100, 70, 30, 20)), Some(Rect::new(100, 70, 20, 10)));
    }

    #[test]
    fn output_size_takes_longer_edges() {
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(110.5, 50.0),
            Point::new(0.0, 60.0),
        ];
        let (w, h) = quad_output_size(corners);
        assert_eq!(w, 110);
        assert_eq!(h, 60);
    }

    #[test]
    fn synthetic_page_on_dark_background() {
        let (w, h) = (400u32, 500u32);
        let mut img = GrayImage::from_pixel(w, h, Luma([30u8]));
        for y in 60..440 {
            for x in 50..350 {
                img.put_pixel(x, y, Luma([240u8]));
            }
        }
        let dyn_img = DynamicImage::ImageLuma8(img);
        let out = PerspectiveCorrector::default().correct(&dyn_img, &ImageprocContours);

        // The page is ~300x380; edge thickness shifts the outline by a few pixels.
        assert!((280..=320).contains(&out.width()), "width {}", out.width());
        assert!((360..=400).contains(&out.height()), "height {}", out.height());
    }
}
