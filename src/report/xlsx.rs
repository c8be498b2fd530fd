use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, FormatAlign, Image, Workbook, Worksheet};
use tracing::warn;

use super::gallery::NO_IMAGE;
use super::{SheetPlan, Style};

const SCREEN_DPI: f64 = 96.0;

struct Formats {
    plain: Format,
    bold: Format,
    roll: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            plain: Format::new(),
            bold: Format::new().set_bold(),
            roll: Format::new()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
        }
    }

    fn get(&self, style: Style) -> &Format {
        match style {
            Style::Plain => &self.plain,
            Style::Bold => &self.bold,
            Style::RollNumber => &self.roll,
        }
    }
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, text: &str, style: Style, formats: &Formats) -> Result<()> {
    let format = formats.get(style);
    match (style, text.parse::<u64>()) {
        (Style::RollNumber, Ok(n)) if !text.starts_with('0') => {
            sheet.write_number_with_format(row, col, n as f64, format)?;
        }
        _ => {
            sheet.write_string_with_format(row, col, text, format)?;
        }
    }
    Ok(())
}

/// Excel draws images at `pixels * 96 / dpi`. Undo that so the drawn
/// height is the pixel height the gallery reserved rows for.
fn at_pixel_size(image: Image) -> Image {
    let (sx, sy) = (dpi_scale(image.width_dpi()), dpi_scale(image.height_dpi()));
    image.set_scale_width(sx).set_scale_height(sy)
}

fn dpi_scale(dpi: f64) -> f64 {
    if dpi > 0.0 {
        dpi / SCREEN_DPI
    } else {
        1.0
    }
}

/// Render one planned sheet as a standalone workbook.
pub fn render(plan: &SheetPlan) -> Result<Vec<u8>> {
    let formats = Formats::new();
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(plan.name)?;

    for &(col, width) in &plan.column_widths {
        sheet.set_column_width(col, width)?;
    }
    for &(row, height) in &plan.row_heights {
        sheet.set_row_height(row, height)?;
    }

    for cell in &plan.cells {
        write_cell(sheet, cell.row, cell.col, &cell.text, cell.style, &formats)?;
    }

    for merge in &plan.merges {
        // Single-cell ranges are rejected by the writer.
        if merge.last_row > merge.first_row {
            sheet
                .merge_range(merge.first_row, merge.col, merge.last_row, merge.col, &merge.text, formats.get(merge.style))
                .with_context(|| format!("Failed to merge rows {}..={}", merge.first_row, merge.last_row))?;
        }
        // Overwrite the anchor cell so roll numbers keep their numeric type.
        write_cell(sheet, merge.first_row, merge.col, &merge.text, merge.style, &formats)?;
    }

    for placed in &plan.images {
        let inserted = Image::new_from_buffer(placed.photo.bytes()).and_then(|image| {
            let result = if placed.fit_to_cell {
                sheet.insert_image_fit_to_cell(placed.row, placed.col, &image, true)
            } else {
                sheet.insert_image(placed.row, placed.col, &at_pixel_size(image))
            };
            result.map(|_| ())
        });
        if let Err(e) = inserted {
            warn!(row = placed.row, "Could not embed photo: {}", e);
            sheet.write_string(placed.row, placed.col, NO_IMAGE)?;
        }
    }

    workbook
        .save_to_buffer()
        .with_context(|| format!("Failed to serialise {} workbook", plan.name))
}
