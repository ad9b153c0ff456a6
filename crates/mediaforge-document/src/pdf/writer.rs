// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: build new documents from images, HTML tables and plain text
// using `printpdf` 0.8.
//
// printpdf 0.8 is data-oriented: each page is a `PdfPage` holding a `Vec<Op>`
// and the whole document is serialised once by `PdfDocument::save()`.

use image::DynamicImage;
use mediaforge_core::{Color, MediaError, Orientation, PaperSize, Result};
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage,
    RawImageData, RawImageFormat, TextItem, XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

use crate::image::processor::ImageProcessor;

/// Placing images at 72 DPI makes one pixel one point before scaling.
const IMAGE_DPI: f32 = 72.0;

/// Average Helvetica advance as a fraction of the font size.
const HELVETICA_AVG_ADVANCE: f32 = 0.5;

// Table layout, in millimetres.
const TABLE_MARGIN_MM: f32 = 10.0;
const TABLE_TOP_MM: f32 = 20.0;
const TABLE_ROW_MM: f32 = 7.0;
const TABLE_BOTTOM_MM: f32 = 20.0;
const TABLE_CELL_GAP_MM: f32 = 2.0;
const HEADER_FONT_PT: f32 = 10.0;
const BODY_FONT_PT: f32 = 9.0;

// Plain text layout, in millimetres.
const TEXT_MARGIN_MM: f32 = 20.0;
const TEXT_HEADING_Y_MM: f32 = 20.0;
const TEXT_BODY_Y_MM: f32 = 30.0;
const TEXT_FONT_PT: f32 = 12.0;
const TEXT_LINE_FACTOR: f32 = 1.15;

/// Creates new PDF documents.
pub struct PdfWriter {
    /// Title metadata embedded in the document.
    title: String,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new("Mediaforge Document")
    }
}

impl PdfWriter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    // -- Images ---------------------------------------------------------------

    /// One A4 portrait page per image. Each image is scaled to fit the page
    /// (upscaling included), centred, and flattened onto white.
    #[instrument(skip(self, images), fields(images = images.len()))]
    pub fn images_to_pdf(&self, images: &[DynamicImage]) -> Result<Vec<u8>> {
        if images.is_empty() {
            return Err(MediaError::invalid("No files provided"));
        }

        let (page_w, page_h) = page_size(PaperSize::A4, Orientation::Portrait);
        let (page_w_pt, page_h_pt) = (page_w.into_pt().0, page_h.into_pt().0);

        let mut doc = PdfDocument::new(&self.title);
        let mut pages = Vec::with_capacity(images.len());

        for (index, image) in images.iter().enumerate() {
            let rgb = ImageProcessor::from_dynamic(image.clone())
                .flatten(Color::WHITE)
                .into_dynamic()
                .to_rgb8();
            let (img_w, img_h) = rgb.dimensions();
            if img_w == 0 || img_h == 0 {
                return Err(MediaError::Image(format!("image {} has no pixels", index + 1)));
            }

            let raw = RawImage {
                pixels: RawImageData::U8(rgb.into_raw()),
                width: img_w as usize,
                height: img_h as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);

            let scale = (page_w_pt / img_w as f32).min(page_h_pt / img_h as f32);
            let rendered_w = img_w as f32 * scale;
            let rendered_h = img_h as f32 * scale;

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt((page_w_pt - rendered_w) / 2.0)),
                    translate_y: Some(Pt((page_h_pt - rendered_h) / 2.0)),
                    scale_x: Some(scale),
                    scale_y: Some(scale),
                    dpi: Some(IMAGE_DPI),
                    rotate: None,
                },
            }];
            debug!(page = index + 1, img_w, img_h, scale, "Image placed");
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        doc.with_pages(pages);
        info!(pages = images.len(), "Image PDF created");
        Ok(save(&doc))
    }

    // -- Tables ---------------------------------------------------------------

    /// Lay out `rows` on landscape A4. The first row is the header and is set
    /// in bold. Each row divides the printable width equally among its own
    /// cells; text that does not fit its cell is truncated.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub fn table_to_pdf(&self, rows: &[Vec<String>]) -> Result<Vec<u8>> {
        let (page_w, page_h) = page_size(PaperSize::A4, Orientation::Landscape);
        let printable_mm = page_w.0 - 2.0 * TABLE_MARGIN_MM;

        let mut pages = Vec::new();
        let mut ops: Vec<Op> = Vec::new();
        let mut y_mm = TABLE_TOP_MM;

        for (row_index, row) in rows.iter().enumerate() {
            let (font, size) = if row_index == 0 {
                (BuiltinFont::HelveticaBold, HEADER_FONT_PT)
            } else {
                (BuiltinFont::Helvetica, BODY_FONT_PT)
            };

            if !row.is_empty() {
                let cell_mm = printable_mm / row.len() as f32;
                let max_chars = chars_that_fit(cell_mm - TABLE_CELL_GAP_MM, size);
                for (col, cell) in row.iter().enumerate() {
                    let text: String = cell.chars().take(max_chars).collect();
                    if text.is_empty() {
                        continue;
                    }
                    let x_mm = TABLE_MARGIN_MM + col as f32 * cell_mm;
                    push_text(&mut ops, &text, x_mm, page_h.0 - y_mm, font, size);
                }
            }

            y_mm += TABLE_ROW_MM;
            if y_mm > page_h.0 - TABLE_BOTTOM_MM {
                pages.push(PdfPage::new(page_w, page_h, std::mem::take(&mut ops)));
                y_mm = TABLE_TOP_MM;
            }
        }

        if !ops.is_empty() || pages.is_empty() {
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        let page_count = pages.len();
        let mut doc = PdfDocument::new(&self.title);
        doc.with_pages(pages);
        info!(page_count, "Table PDF created");
        Ok(save(&doc))
    }

    // -- Plain text -----------------------------------------------------------

    /// A 12pt heading followed by word-wrapped body text on landscape A4,
    /// continuing onto further pages as needed.
    #[instrument(skip(self, body), fields(body_len = body.len()))]
    pub fn text_to_pdf(&self, heading: &str, body: &str) -> Result<Vec<u8>> {
        let (page_w, page_h) = page_size(PaperSize::A4, Orientation::Landscape);
        let max_chars = chars_that_fit(page_w.0 - 2.0 * TEXT_MARGIN_MM, TEXT_FONT_PT);
        let line_mm = Mm::from(Pt(TEXT_FONT_PT * TEXT_LINE_FACTOR)).0;

        let mut pages = Vec::new();
        let mut ops = Vec::new();
        push_text(
            &mut ops,
            heading,
            TEXT_MARGIN_MM,
            page_h.0 - TEXT_HEADING_Y_MM,
            BuiltinFont::Helvetica,
            TEXT_FONT_PT,
        );

        let mut y_mm = TEXT_BODY_Y_MM;
        for line in wrap_text(body, max_chars) {
            if y_mm > page_h.0 - TEXT_MARGIN_MM {
                pages.push(PdfPage::new(page_w, page_h, std::mem::take(&mut ops)));
                y_mm = TEXT_MARGIN_MM;
            }
            if !line.is_empty() {
                push_text(
                    &mut ops,
                    &line,
                    TEXT_MARGIN_MM,
                    page_h.0 - y_mm,
                    BuiltinFont::Helvetica,
                    TEXT_FONT_PT,
                );
            }
            y_mm += line_mm;
        }
        pages.push(PdfPage::new(page_w, page_h, ops));

        let page_count = pages.len();
        let mut doc = PdfDocument::new(&self.title);
        doc.with_pages(pages);
        info!(page_count, "Text PDF created");
        Ok(save(&doc))
    }
}

fn page_size(paper: PaperSize, orientation: Orientation) -> (Mm, Mm) {
    let (w, h) = paper.oriented_mm(orientation);
    (Mm(w as f32), Mm(h as f32))
}

/// Builtin fonts only cover WinAnsi; anything outside Latin-1 becomes `?`.
fn latin1(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c } else { '?' })
        .collect()
}

fn push_text(ops: &mut Vec<Op>, text: &str, x_mm: f32, y_mm: f32, font: BuiltinFont, size: f32) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Mm(x_mm).into_pt(),
            y: Mm(y_mm).into_pt(),
        },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font,
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(latin1(text))],
        font,
    });
    ops.push(Op::EndTextSection);
}

/// Estimated number of Helvetica characters at `size_pt` that fit `width_mm`.
fn chars_that_fit(width_mm: f32, size_pt: f32) -> usize {
    let advance_mm = Mm::from(Pt(HELVETICA_AVG_ADVANCE * size_pt)).0;
    if advance_mm <= 0.0 || width_mm <= 0.0 {
        return 0;
    }
    (width_mm / advance_mm).floor() as usize
}

fn save(doc: &PdfDocument) -> Vec<u8> {
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        warn!(count = warnings.len(), "printpdf reported warnings while saving");
    }
    output
}

/// Word-wrap `text` so no line exceeds `max_chars`. Existing newlines start
/// new lines; words longer than a line are split.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_len = 0usize;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if line_len > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            if word.is_empty() {
                continue;
            }
            if line_len > 0 && line_len + 1 + word.len() > max_chars {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line_len += word.len();
            line.extend(word);
        }

        lines.push(line);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::reader::PdfReader;
    use image::{Rgba, RgbaImage};

    fn image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([10, 120, 200, 255])))
    }

    #[test]
    fn one_page_per_image() {
        let bytes = PdfWriter::default()
            .images_to_pdf(&[image(40, 30), image(10, 80), image(5, 5)])
            .unwrap();
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.page_count(), 3);
        let (w, h) = reader.page_size(1).unwrap();
        assert!(h > w, "image pages are portrait");
    }

    #[test]
    fn no_images_is_rejected() {
        let err = PdfWriter::default().images_to_pdf(&[]).unwrap_err();
        assert_eq!(err.to_string(), "No files provided");
    }

    #[test]
    fn short_table_fits_one_landscape_page() {
        let rows = vec![
            vec!["Name".to_string(), "Qty".to_string()],
            vec!["Widget".to_string(), "3".to_string()],
        ];
        let bytes = PdfWriter::default().table_to_pdf(&rows).unwrap();
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.page_count(), 1);
        let (w, h) = reader.page_size(1).unwrap();
        assert!(w > h, "table pages are landscape");
    }

    #[test]
    fn long_table_breaks_pages() {
        // 210mm page: rows advance 7mm from 20mm and break past 190mm,
        // giving 25 rows per page.
        let rows: Vec<Vec<String>> = (0..60).map(|i| vec![format!("row {i}")]).collect();
        let bytes = PdfWriter::default().table_to_pdf(&rows).unwrap();
        assert_eq!(PdfReader::from_bytes(&bytes).unwrap().page_count(), 3);
    }

    #[test]
    fn text_document_has_a_page() {
        let bytes = PdfWriter::default()
            .text_to_pdf("Excel Data", "just some words")
            .unwrap();
        assert_eq!(PdfReader::from_bytes(&bytes).unwrap().page_count(), 1);
    }

    #[test]
    fn wrap_respects_width_and_newlines() {
        let lines = wrap_text("aaa bbb ccc\nd", 7);
        assert_eq!(lines, vec!["aaa bbb", "ccc", "d"]);
        let lines = wrap_text("abcdefghij", 4);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn cell_capacity_grows_with_width() {
        assert!(chars_that_fit(50.0, 9.0) > chars_that_fit(20.0, 9.0));
        assert_eq!(chars_that_fit(0.0, 9.0), 0);
    }

    #[test]
    fn non_latin_text_is_replaced() {
        assert_eq!(latin1("café ✓"), "café ?");
    }
}
