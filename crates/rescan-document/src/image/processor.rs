// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decoding, bounded downscaling, region cropping, and PNG
// encoding for page photographs. Operates on in-memory images using the
// `image` crate.

use image::{DynamicImage, ImageFormat};
use rescan_core::Rect;
use rescan_core::error::RescanError;
use tracing::{debug, info, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping the
/// transformed image, enabling method chaining.
///
/// ```ignore
/// let page = ImageProcessor::open("photo.jpg")?
///     .downscale(1080)
///     .into_dynamic();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, RescanError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RescanError::SourceMissing(path.display().to_string()));
        }
        let img = image::open(path).map_err(|err| {
            RescanError::ImageError(format!("failed to open {}: {}", path.display(), err))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, RescanError> {
        let img = image::load_from_memory(data).map_err(|err| {
            RescanError::ImageError(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Shrink the image so neither side exceeds `max_dimension`, preserving
    /// aspect ratio. Images already within bounds are returned untouched.
    ///
    /// New dimensions are `side * max_dimension / max(width, height)`,
    /// truncated.
    #[instrument(skip(self), fields(max_dimension))]
    pub fn downscale(self, max_dimension: u32) -> Self {
        let (width, height) = (self.image.width(), self.image.height());
        if width <= max_dimension && height <= max_dimension {
            return self;
        }

        let scale = max_dimension as f32 / width.max(height) as f32;
        let new_w = ((width as f32 * scale) as u32).max(1);
        let new_h = ((height as f32 * scale) as u32).max(1);
        info!(width, height, new_w, new_h, "Downscaling photograph");

        let resized =
            self.image
                .resize_exact(new_w, new_h, image::imageops::FilterType::Triangle);
        Self { image: resized }
    }

    /// Crop the region covered by `rect`, clipped to the image bounds.
    ///
    /// Returns `None` when the rectangle lies entirely outside the image.
    pub fn crop_rect(&self, rect: &Rect) -> Option<Self> {
        let clipped = rect.clamp_to(self.image.width(), self.image.height())?;
        debug!(
            x = clipped.x,
            y = clipped.y,
            width = clipped.width,
            height = clipped.height,
            "Cropping image"
        );
        let cropped = self.image.crop_imm(
            clipped.x as u32,
            clipped.y as u32,
            clipped.width as u32,
            clipped.height as u32,
        );
        Some(Self { image: cropped })
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, RescanError> {
        encode_to_format(&self.image, ImageFormat::Png)
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(
    image: &DynamicImage,
    format: ImageFormat,
) -> Result<Vec<u8>, RescanError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image.write_to(&mut cursor, format).map_err(|err| {
        RescanError::ImageError(format!("image encoding failed: {}", err))
    })?;
    Ok(buffer)
}
