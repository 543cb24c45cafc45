// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Payload persistence: move in-memory image payloads out to content-addressed
// PNG files so the document model can be serialised.

use std::path::{Path, PathBuf};

use ::image::{DynamicImage, RgbaImage};
use rescan_core::error::{PipelineStage, Result};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::image::ImageProcessor;
use crate::model::{AnalyzedDocument, DocumentElement, ImagePayload};

/// Lowercase hex SHA-256 of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Encode `pixels` as PNG and write them to `<dir>/<sha256>.png`.
///
/// Identical pixels map to the same file, so rewriting is harmless.
pub fn store_png(pixels: &RgbaImage, dir: &Path) -> Result<PathBuf> {
    let png = ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(pixels.clone())).to_png_bytes()?;
    let path = dir.join(format!("{}.png", hash_bytes(&png)));
    if !path.exists() {
        std::fs::write(&path, &png)?;
    }
    Ok(path)
}

/// Replace every in-memory image payload with a stored path reference.
///
/// A payload that cannot be written is dropped (set to `None`) and its element
/// index is returned; the rest of the document is unaffected.
#[instrument(skip(document), fields(dir = %dir.as_ref().display(), elements = document.elements.len()))]
pub fn persist_payloads(document: &mut AnalyzedDocument, dir: impl AsRef<Path>) -> Vec<usize> {
    let dir = dir.as_ref();
    if let Err(err) = std::fs::create_dir_all(dir) {
        warn!(%err, "Cannot create payload directory");
    }

    let mut failed = Vec::new();
    let mut stored = 0usize;
    for (index, element) in document.elements.iter_mut().enumerate() {
        let DocumentElement::Image(zone) = element else {
            continue;
        };
        let Some(ImagePayload::Pixels(pixels)) = &zone.payload else {
            continue;
        };
        match store_png(pixels, dir) {
            Ok(path) => {
                zone.payload = Some(ImagePayload::Stored { path });
                stored += 1;
            }
            Err(err) => {
                let err = err.in_stage(PipelineStage::Persist, Some(index));
                warn!(%err, "Image payload dropped");
                zone.payload = None;
                failed.push(index);
            }
        }
    }

    info!(stored, failed = failed.len(), "Image payloads persisted");
    failed
}
