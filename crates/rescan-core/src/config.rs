// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analysis configuration. Every heuristic threshold used by the pipeline lives
// here so that the historical parameter sets can be selected rather than
// hard-coded.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RescanError, Result};

/// Settings for the whole page reconstruction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Photographs larger than this on either side are downscaled first.
    pub max_dimension: u32,
    pub perspective: PerspectiveConfig,
    pub zones: ZoneConfig,
    pub paragraphs: ParagraphConfig,
    pub grid: GridConfig,
    pub render: RenderConfig,
}

/// Page quadrilateral detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerspectiveConfig {
    /// Minimum contour area as a fraction of the image area.
    pub min_area_ratio: f32,
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Polygon approximation tolerance as a fraction of the contour perimeter.
    pub approx_epsilon_ratio: f64,
    /// Dilation radius used to close gaps in the edge map.
    pub dilate_radius: u8,
}

/// Text/image region classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// HSV saturation (0-255) above which a pixel counts as coloured.
    pub saturation_threshold: u8,
    /// Radius of the square closing kernel (radius 7 is a 15x15 kernel).
    pub closing_radius: u8,
    /// Image candidates must cover at least this fraction of the page.
    pub min_area_ratio: f64,
    /// Image candidates larger than this fraction of the page are rejected.
    pub max_area_ratio: f64,
    /// Minimum area for the edge-based fallback pass.
    pub fallback_min_area_ratio: f64,
    /// Contours touching the border are rejected below this area fraction.
    pub border_min_area_ratio: f64,
    /// At least one RGB channel must vary more than this (standard deviation).
    pub min_channel_std_dev: f64,
    /// Image candidates covering more than this fraction of a text zone are dropped.
    pub overlap_threshold: f64,
    /// Saturation (0-255) marking a coloured banner that may hold light text.
    pub inverted_saturation_threshold: u8,
    /// Mean brightness (HSV value, 0-255) an inverted region must exceed.
    pub inverted_min_brightness: f64,
    pub inverted_min_area_ratio: f64,
    /// An inverted region already covered this much by a text block is not re-checked.
    pub inverted_coverage: f64,
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
}

/// Paragraph grouping and reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParagraphConfig {
    /// Fragments whose heights differ by more than this factor never merge.
    pub max_height_ratio: f32,
    /// Vertical overlap (over the smaller height) that makes two fragments share a line.
    pub min_vertical_overlap: f32,
    /// Top edges closer than this fraction of the smaller height share a line.
    pub same_line_offset_ratio: f32,
    /// Largest gap in pixels between same-line fragments.
    pub max_horizontal_gap: i32,
    /// A wrapped line must start within `[h, h * wrap_gap_ratio]` of the
    /// previous line's top, where `h` is the previous line's height.
    pub wrap_gap_ratio: f32,
    /// Horizontal overlap (over the smaller width) required for a line wrap.
    pub min_horizontal_overlap: f32,
    /// Line bucket height as a fraction of the mean fragment height.
    pub line_bucket_ratio: f32,
    /// Paragraphs whose mean top differs by less than this fraction of their
    /// line height are read as one row.
    pub reading_row_ratio: f32,
}

/// Layout grid construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Track coordinates closer than this are treated as the same track.
    pub tolerance: i32,
    /// Merge jittered tracks before assigning cells.
    pub snap_tracks: bool,
}

/// Target-page rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub min_font_size: f32,
    pub max_font_size: f32,
    /// Font size as a fraction of the scaled line height.
    pub font_fill_ratio: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::strict()
    }
}

impl AnalysisConfig {
    /// The original parameter set: overlap 0.7, image areas from 1%,
    /// edge fallback from 5%.
    pub fn strict() -> Self {
        Self {
            max_dimension: 1080,
            perspective: PerspectiveConfig::default(),
            zones: ZoneConfig::default(),
            paragraphs: ParagraphConfig::default(),
            grid: GridConfig::default(),
            render: RenderConfig::default(),
        }
    }

    /// The richer pipeline's parameter set: overlap relaxed to 0.5 and image
    /// candidates from 2% of the page.
    pub fn relaxed() -> Self {
        let mut config = Self::strict();
        config.zones.overlap_threshold = 0.5;
        config.zones.min_area_ratio = 0.02;
        config
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "strict" | "default" => Some(Self::strict()),
            "relaxed" => Some(Self::relaxed()),
            _ => None,
        }
    }

    /// Load a (possibly partial) configuration from a JSON file. Missing
    /// fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|err| {
            RescanError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every threshold lies in its meaningful range.
    pub fn validate(&self) -> Result<()> {
        let z = &self.zones;
        let p = &self.paragraphs;

        if self.max_dimension == 0 {
            return Err(RescanError::Config("max_dimension must be positive".into()));
        }
        check_fraction("perspective.min_area_ratio", self.perspective.min_area_ratio as f64)?;
        check_fraction("zones.min_area_ratio", z.min_area_ratio)?;
        check_fraction("zones.max_area_ratio", z.max_area_ratio)?;
        check_fraction("zones.fallback_min_area_ratio", z.fallback_min_area_ratio)?;
        check_fraction("zones.overlap_threshold", z.overlap_threshold)?;
        check_fraction("zones.inverted_coverage", z.inverted_coverage)?;
        if z.min_area_ratio >= z.max_area_ratio {
            return Err(RescanError::Config(format!(
                "zones.min_area_ratio ({}) must be below zones.max_area_ratio ({})",
                z.min_area_ratio, z.max_area_ratio
            )));
        }
        if p.max_height_ratio < 1.0 {
            return Err(RescanError::Config(
                "paragraphs.max_height_ratio must be at least 1.0".into(),
            ));
        }
        if p.wrap_gap_ratio < 1.0 {
            return Err(RescanError::Config(
                "paragraphs.wrap_gap_ratio must be at least 1.0".into(),
            ));
        }
        if p.max_horizontal_gap < 0 || self.grid.tolerance < 0 {
            return Err(RescanError::Config(
                "pixel thresholds must not be negative".into(),
            ));
        }
        if self.render.min_font_size <= 0.0 || self.render.min_font_size > self.render.max_font_size {
            return Err(RescanError::Config(
                "render font size bounds are inverted or not positive".into(),
            ));
        }
        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RescanError::Config(format!(
            "{name} must lie in 0.0..=1.0, got {value}"
        )))
    }
}

impl Default for PerspectiveConfig {
    fn default() -> Self {
        Self {
            min_area_ratio: 0.10,
            blur_sigma: 1.5,
            canny_low: 50.0,
            canny_high: 150.0,
            approx_epsilon_ratio: 0.02,
            dilate_radius: 1,
        }
    }
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            saturation_threshold: 40,
            closing_radius: 7,
            min_area_ratio: 0.01,
            max_area_ratio: 0.9,
            fallback_min_area_ratio: 0.05,
            border_min_area_ratio: 0.05,
            min_channel_std_dev: 20.0,
            overlap_threshold: 0.7,
            inverted_saturation_threshold: 100,
            inverted_min_brightness: 120.0,
            inverted_min_area_ratio: 0.002,
            inverted_coverage: 0.7,
            blur_sigma: 1.1,
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

impl Default for ParagraphConfig {
    fn default() -> Self {
        Self {
            max_height_ratio: 1.5,
            min_vertical_overlap: 0.3,
            same_line_offset_ratio: 0.3,
            max_horizontal_gap: 50,
            wrap_gap_ratio: 1.2,
            min_horizontal_overlap: 0.3,
            line_bucket_ratio: 0.8,
            reading_row_ratio: 0.5,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            tolerance: 5,
            snap_tracks: true,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_font_size: 6.0,
            max_font_size: 24.0,
            font_fill_ratio: 0.8,
        }
    }
}
