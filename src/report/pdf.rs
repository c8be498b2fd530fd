//! Print-style copy of the combined layout, A4 landscape, paginated.

use std::io::BufWriter;

use anyhow::{anyhow, Result};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use super::combined::CombinedRow;
use super::{ReportHeader, ROLL_LABEL};

const PAGE_W: f32 = 297.0;
const PAGE_H: f32 = 210.0;
const TOP: f32 = 195.0;
const BOTTOM: f32 = 15.0;
const LINE: f32 = 5.5;

/// Left edge of each column, in mm.
const COLUMNS: [f32; 7] = [12.0, 42.0, 56.0, 104.0, 168.0, 200.0, 230.0];
/// Characters per column before truncation.
const WIDTHS: [usize; 7] = [12, 5, 22, 30, 14, 12, 16];

const PHOTO_ATTACHED: &str = "attached";
const PHOTO_MISSING: &str = "No Image";

struct Writer {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl Writer {
    fn new(title: &str) -> Result<Self> {
        let (doc, page1, layer1) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let layer = doc.get_page(page1).get_layer(layer1);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("PDF font error: {e}"))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("PDF font error: {e}"))?;
        Ok(Self {
            doc,
            layer,
            font,
            bold,
            y: TOP,
            pages: 1,
        })
    }

    fn ensure_room(&mut self) {
        if self.y >= BOTTOM {
            return;
        }
        self.pages += 1;
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_W), Mm(PAGE_H), format!("Layer {}", self.pages));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = TOP;
    }

    fn text(&mut self, text: &str, size: f32, bold: bool) {
        self.ensure_room();
        let font = if bold { &self.bold } else { &self.font };
        self.layer.use_text(text, size, Mm(COLUMNS[0]), Mm(self.y), font);
        self.y -= LINE;
    }

    fn columns(&mut self, cells: &[String; 7], bold: bool) {
        self.ensure_room();
        let font = if bold { &self.bold } else { &self.font };
        for ((x, width), cell) in COLUMNS.iter().zip(WIDTHS).zip(cells) {
            if !cell.is_empty() {
                self.layer.use_text(truncate(cell, width), 8.0, Mm(*x), Mm(self.y), font);
            }
        }
        self.y -= LINE;
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc.save(&mut buf).map_err(|e| anyhow!("PDF save error: {e}"))?;
        buf.into_inner().map_err(|e| anyhow!("PDF buffer error: {e}"))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

pub fn render(header: &ReportHeader, labels: &[String; 5], rows: &[CombinedRow]) -> Result<Vec<u8>> {
    let mut w = Writer::new("Attendance with images")?;

    for line in header.lines() {
        w.text(&line, 10.0, true);
    }
    w.y -= LINE;

    let heading = |labels: &[String; 5]| -> [String; 7] {
        let [a, b, c, d, e] = labels.clone();
        [ROLL_LABEL.to_string(), a, b, c, d, e, "Photo".to_string()]
    };
    w.columns(&heading(labels), true);

    for row in rows {
        let starts_page = w.y < BOTTOM;
        if starts_page {
            w.ensure_room();
            w.columns(&heading(labels), true);
        }
        let photo = match (&row.roll, &row.photo) {
            (Some(_), Some(_)) => PHOTO_ATTACHED,
            (Some(_), None) => PHOTO_MISSING,
            (None, _) => "",
        };
        let [a, b, c, d, e] = row.values.clone();
        w.columns(&[row.roll.clone().unwrap_or_default(), a, b, c, d, e, photo.to_string()], false);
    }

    w.finish()
}
