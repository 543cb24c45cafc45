// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR adapter for Rescan.
//
// Finds and reads text lines in page photographs using the `ocrs` crate, a
// pure-Rust OCR engine backed by neural network models executed via `rten`.
//
// # Feature Gate
//
// This module is only available when the `ocr` feature is enabled:
//
// ```toml
// rescan-document = { path = "crates/rescan-document", features = ["ocr"] }
// ```
//
// # Model Setup
//
// The OCR engine requires two model files:
//
// - **Detection model** (`text-detection.rten`): locates words in the image.
// - **Recognition model** (`text-recognition.rten`): decodes each text line.
//
// Running the `ocrs-cli` tool once downloads both into the default cache
// directory, `$XDG_CACHE_HOME/ocrs` (typically `~/.cache/ocrs`):
//   ```sh
//   cargo install ocrs-cli
//   ocrs some-image.png
//   ```

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams, TextItem};
use rescan_core::Rect;
use rescan_core::error::RescanError;
use rten::Model;
use tracing::{debug, info, instrument};

use super::detect::{TextBlock, TextBlockDetector};

/// Default directory for cached OCR model files.
///
/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs` when
/// `XDG_CACHE_HOME` is unset.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Where to find the two model files.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Expects `dir` to contain `text-detection.rten` and `text-recognition.rten`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    pub fn validate(&self) -> Result<(), RescanError> {
        for (kind, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(RescanError::OcrError(format!(
                    "{kind} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Text-line detector backed by `ocrs`.
///
/// Model loading is the expensive step, so build one engine and reuse it for
/// the page pass and every region re-read.
///
/// **Important:** `ocrs` and `rten` must be compiled in release mode; debug
/// builds are 10-100x slower.
pub struct OcrEngine {
    engine: OcrsEngine,
}

impl OcrEngine {
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: OcrConfig) -> Result<Self, RescanError> {
        config.validate()?;

        info!("Loading OCR models");
        let load = |path: &Path| {
            Model::load_file(path).map_err(|err| {
                RescanError::OcrError(format!("failed to load model from {}: {}", path.display(), err))
            })
        };
        let detection_model = load(&config.detection_model_path)?;
        let recognition_model = load(&config.recognition_model_path)?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| RescanError::OcrError(format!("failed to initialise OCR engine: {}", err)))?;

        info!("OCR engine initialised");
        Ok(Self { engine })
    }

    pub fn with_defaults() -> Result<Self, RescanError> {
        Self::new(OcrConfig::default())
    }

    pub fn from_model_dir(dir: impl AsRef<Path>) -> Result<Self, RescanError> {
        Self::new(OcrConfig::from_dir(dir))
    }

    /// Detect words, group them into lines, and read each line.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn read_lines(&self, image: &DynamicImage) -> Result<Vec<TextBlock>, RescanError> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            RescanError::OcrError(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| RescanError::OcrError(format!("OCR preprocessing failed: {}", err)))?;

        let words = self
            .engine
            .detect_words(&input)
            .map_err(|err| RescanError::OcrError(format!("word detection failed: {}", err)))?;
        let lines = self.engine.find_text_lines(&input, &words);
        debug!(words = words.len(), lines = lines.len(), "Text lines found");

        let recognised = self
            .engine
            .recognize_text(&input, &lines)
            .map_err(|err| RescanError::OcrError(format!("line recognition failed: {}", err)))?;

        let blocks: Vec<TextBlock> = recognised
            .iter()
            .flatten()
            .filter_map(|line| {
                let text = line.to_string();
                if text.trim().is_empty() {
                    return None;
                }
                let r = line.bounding_rect();
                let rect = Rect::from_edges(
                    r.left() as i32,
                    r.top() as i32,
                    r.right() as i32,
                    r.bottom() as i32,
                );
                rect.is_valid().then(|| TextBlock::new(rect, text.trim()))
            })
            .collect();

        debug!(blocks = blocks.len(), "OCR complete");
        Ok(blocks)
    }
}

impl TextBlockDetector for OcrEngine {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<TextBlock>, RescanError> {
        self.read_lines(image)
    }
}
