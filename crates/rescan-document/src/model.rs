// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document model: zones, elements, the analysed document, and its layout grid.

use std::path::PathBuf;

use ::image::RgbaImage;
use rescan_core::Rect;
use rescan_core::error::{RescanError, Result};
use serde::{Deserialize, Serialize};

/// A rectangular region of recognised text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextZone {
    pub rect: Rect,
    pub text: String,
    /// Light text on a dark or coloured background.
    #[serde(default)]
    pub inverted: bool,
}

impl TextZone {
    pub fn new(rect: Rect, text: impl Into<String>) -> Self {
        Self {
            rect,
            text: text.into(),
            inverted: false,
        }
    }

    pub fn inverted(rect: Rect, text: impl Into<String>) -> Self {
        Self {
            rect,
            text: text.into(),
            inverted: true,
        }
    }
}

/// Where an image zone's pixels live.
///
/// In memory during analysis; a path reference once the document has been
/// prepared for serialisation (see [`crate::persist`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImagePayload {
    /// Decoded pixels. Never serialised; persist the payload first.
    #[serde(skip)]
    Pixels(RgbaImage),
    /// A PNG written to a content-addressed file.
    Stored { path: PathBuf },
}

/// A rectangular region holding a photograph or illustration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageZone {
    pub rect: Rect,
    /// `None` when the pixels could not be extracted or written.
    pub payload: Option<ImagePayload>,
}

impl ImageZone {
    pub fn new(rect: Rect, payload: Option<ImagePayload>) -> Self {
        Self { rect, payload }
    }
}

/// One positioned piece of page content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentElement {
    Text(TextZone),
    Image(ImageZone),
}

impl DocumentElement {
    pub fn rect(&self) -> Rect {
        match self {
            Self::Text(zone) => zone.rect,
            Self::Image(zone) => zone.rect,
        }
    }

    /// The same element moved to `rect`.
    pub fn with_rect(&self, rect: Rect) -> Self {
        match self {
            Self::Text(zone) => Self::Text(TextZone {
                rect,
                ..zone.clone()
            }),
            Self::Image(zone) => Self::Image(ImageZone {
                rect,
                payload: zone.payload.clone(),
            }),
        }
    }
}

impl From<TextZone> for DocumentElement {
    fn from(zone: TextZone) -> Self {
        Self::Text(zone)
    }
}

impl From<ImageZone> for DocumentElement {
    fn from(zone: ImageZone) -> Self {
        Self::Image(zone)
    }
}

/// The structured result of analysing one photograph.
///
/// `elements` is in reading order. `page_width`/`page_height` are the pixel
/// dimensions of the corrected page that element rectangles refer to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedDocument {
    pub elements: Vec<DocumentElement>,
    pub page_width: u32,
    pub page_height: u32,
    /// The corrected page the elements were extracted from. Analysis-time only.
    #[serde(skip)]
    pub source_image: Option<RgbaImage>,
}

impl AnalyzedDocument {
    pub fn new(elements: Vec<DocumentElement>, page_width: u32, page_height: u32) -> Self {
        Self {
            elements,
            page_width,
            page_height,
            source_image: None,
        }
    }

    pub fn with_source_image(mut self, image: RgbaImage) -> Self {
        self.source_image = Some(image);
        self
    }

    pub fn text_zones(&self) -> impl Iterator<Item = &TextZone> {
        self.elements.iter().filter_map(|e| match e {
            DocumentElement::Text(zone) => Some(zone),
            DocumentElement::Image(_) => None,
        })
    }

    /// Reject any element whose rectangle has no area.
    pub fn validate(&self) -> Result<()> {
        for element in &self.elements {
            let r = element.rect();
            Rect::try_new(r.x, r.y, r.width, r.height)?;
        }
        Ok(())
    }

    /// Serialise to JSON. In-memory image payloads must have been persisted
    /// beforehand, otherwise this fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let doc: Self = serde_json::from_str(data)?;
        doc.validate()?;
        Ok(doc)
    }
}

/// A cell of the layout grid: the element plus the track span it occupies.
///
/// The element's left edge lies on column line `col_start` and its right edge
/// on column line `col_end - 1`; rows likewise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
    pub element: DocumentElement,
}

/// Row/column track coordinates plus the cells placed on them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentGrid {
    /// Strictly increasing y coordinates.
    pub rows: Vec<i32>,
    /// Strictly increasing x coordinates.
    pub columns: Vec<i32>,
    pub cells: Vec<GridCell>,
}

impl DocumentGrid {
    /// Check track ordering and that every cell span is non-empty and in bounds.
    pub fn validate(&self) -> Result<()> {
        if !self.rows.windows(2).all(|w| w[0] < w[1]) {
            return Err(RescanError::InvalidGrid("rows are not strictly increasing".into()));
        }
        if !self.columns.windows(2).all(|w| w[0] < w[1]) {
            return Err(RescanError::InvalidGrid(
                "columns are not strictly increasing".into(),
            ));
        }
        for (index, cell) in self.cells.iter().enumerate() {
            let rows_ok = cell.row_start < cell.row_end && cell.row_end <= self.rows.len();
            let cols_ok = cell.col_start < cell.col_end && cell.col_end <= self.columns.len();
            if !rows_ok || !cols_ok {
                return Err(RescanError::InvalidGrid(format!(
                    "cell {index} spans rows {}..{} and columns {}..{} outside a {}x{} grid",
                    cell.row_start,
                    cell.row_end,
                    cell.col_start,
                    cell.col_end,
                    self.rows.len(),
                    self.columns.len()
                )));
            }
        }
        Ok(())
    }
}
