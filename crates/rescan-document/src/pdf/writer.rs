// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF page writer: serialise a laid-out page using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use ::image::{DynamicImage, RgbaImage};
use printpdf::{
    BuiltinFont, Color, LinePoint, Mm, Op, PaintMode, PdfDocument, PdfPage, PdfSaveOptions,
    PdfWarnMsg, Point, Polygon, PolygonRing, Pt, RawImage, RawImageData, RawImageFormat, Rgb,
    TextItem, WindingOrder, XObjectTransform,
};
use rescan_core::error::{RescanError, Result};
use tracing::{debug, info, instrument, warn};

use crate::render::{DrawInstruction, PageLayout, PageWriter};

/// Average Helvetica glyph width as a fraction of the font size.
const AVG_CHAR_WIDTH: f32 = 0.5;
const LINE_SPACING: f32 = 1.2;
const PT_TO_MM: f32 = 25.4 / 72.0;

const INK: f32 = 0.0;
const PAPER: f32 = 1.0;
/// Grey level of the box behind inverted text.
const BANNER: f32 = 0.2;

/// Writes one [`PageLayout`] as a single-page PDF.
///
/// Text is set in the built-in Helvetica font and wrapped at the width of
/// its box; inverted text is set in white on a dark box. Images are embedded
/// as RGB XObjects scaled to their box.
#[derive(Debug, Clone)]
pub struct PdfPageWriter {
    /// Title metadata embedded in the PDF /Info dictionary.
    title: String,
}

impl Default for PdfPageWriter {
    fn default() -> Self {
        Self::new("Rescanned Page")
    }
}

impl PdfPageWriter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    fn text_ops(ops: &mut Vec<Op>, text: &str, x: f32, top: f32, wrap_width: f32, font_size: f32) {
        let char_width = AVG_CHAR_WIDTH * font_size;
        let max_chars = ((wrap_width / char_width) as usize).max(1);
        let line_height = LINE_SPACING * font_size;

        for (i, line) in wrap_text(text, max_chars).into_iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let baseline = top - font_size - i as f32 * line_height;
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(x),
                    y: Pt(baseline),
                },
            });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(font_size),
                font: BuiltinFont::Helvetica,
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(line)],
                font: BuiltinFont::Helvetica,
            });
            ops.push(Op::EndTextSection);
        }
    }

    fn fill_colour(ops: &mut Vec<Op>, level: f32) {
        ops.push(Op::SetFillColor {
            col: Color::Rgb(Rgb {
                r: level,
                g: level,
                b: level,
                icc_profile: None,
            }),
        });
    }

    /// Filled rectangle with its lower-left corner at (`x`, `y`).
    fn box_op(x: f32, y: f32, width: f32, height: f32) -> Op {
        let corners = [(x, y), (x + width, y), (x + width, y + height), (x, y + height)];
        let points = corners
            .into_iter()
            .map(|(x, y)| LinePoint {
                p: Point { x: Pt(x), y: Pt(y) },
                bezier: false,
            })
            .collect();
        Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing { points }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        }
    }

    fn image_op(doc: &mut PdfDocument, pixels: &RgbaImage, x: f32, y: f32, width: f32, height: f32) -> Option<Op> {
        let (px_w, px_h) = pixels.dimensions();
        if px_w == 0 || px_h == 0 || width <= 0.0 || height <= 0.0 {
            return None;
        }
        let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb.into_raw()),
            width: px_w as usize,
            height: px_h as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let id = doc.add_image(&raw);

        // At 72 dpi one pixel is one point before scaling.
        Some(Op::UseXobject {
            id,
            transform: XObjectTransform {
                translate_x: Some(Pt(x)),
                translate_y: Some(Pt(y)),
                scale_x: Some(width / px_w as f32),
                scale_y: Some(height / px_h as f32),
                dpi: Some(72.0),
                rotate: None,
            },
        })
    }
}

impl PageWriter for PdfPageWriter {
    #[instrument(skip_all, fields(title = %self.title, instructions = layout.instructions.len()))]
    fn write_page(&self, layout: &PageLayout) -> Result<Vec<u8>> {
        if !(layout.width_pt > 0.0 && layout.height_pt > 0.0) {
            return Err(RescanError::PdfError(format!(
                "page size must be positive, got {}x{} pt",
                layout.width_pt, layout.height_pt
            )));
        }

        let mut doc = PdfDocument::new(&self.title);
        let mut ops: Vec<Op> = Vec::new();

        for (index, instruction) in layout.instructions.iter().enumerate() {
            match instruction {
                DrawInstruction::Text {
                    text,
                    x,
                    y,
                    wrap_width,
                    height,
                    font_size,
                    inverted,
                } => {
                    if *inverted {
                        Self::fill_colour(&mut ops, BANNER);
                        ops.push(Self::box_op(*x, *y, *wrap_width, *height));
                        Self::fill_colour(&mut ops, PAPER);
                    } else {
                        Self::fill_colour(&mut ops, INK);
                    }
                    Self::text_ops(&mut ops, text, *x, y + height, *wrap_width, *font_size);
                }
                DrawInstruction::Image {
                    pixels,
                    x,
                    y,
                    width,
                    height,
                } => match Self::image_op(&mut doc, pixels, *x, *y, *width, *height) {
                    Some(op) => ops.push(op),
                    None => warn!(index, "Empty image instruction; skipping"),
                },
            }
        }

        let page = PdfPage::new(
            Mm(layout.width_pt * PT_TO_MM),
            Mm(layout.height_pt * PT_TO_MM),
            ops,
        );
        doc.with_pages(vec![page]);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(warnings = warnings.len(), "printpdf reported warnings");
        }

        info!(bytes = output.len(), "PDF page written");
        Ok(output)
    }
}

// -- Text wrapping helper -----------------------------------------------------

/// Wrap a multi-line string so that no line exceeds `max_width` characters.
///
/// Splits on existing newlines first, then performs simple word-wrap within each
/// paragraph. Words longer than `max_width` are force-broken on character
/// boundaries.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(1);
    let mut result = Vec::new();

    for paragraph in text.split('\n') {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            result.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        let mut current_len = 0;

        for word in words {
            let word_len = word.chars().count();
            if word_len > max_width {
                if !current_line.is_empty() {
                    result.push(std::mem::take(&mut current_line));
                }
                let chars: Vec<char> = word.chars().collect();
                let mut chunks = chars.chunks(max_width).peekable();
                while let Some(chunk) = chunks.next() {
                    let piece: String = chunk.iter().collect();
                    if chunks.peek().is_some() {
                        result.push(piece);
                    } else {
                        current_len = chunk.len();
                        current_line = piece;
                    }
                }
            } else if current_line.is_empty() {
                current_line.push_str(word);
                current_len = word_len;
            } else if current_len + 1 + word_len <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
                current_len += 1 + word_len;
            } else {
                result.push(std::mem::replace(&mut current_line, word.to_string()));
                current_len = word_len;
            }
        }

        if !current_line.is_empty() {
            result.push(current_line);
        }
    }

    result
}
