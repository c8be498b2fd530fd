use super::{ReportHeader, SheetPlan, Style};
use crate::model::{Photo, ReportEntry};

pub const SHEET_NAME: &str = "Images";

/// Rows reserved when the photo's height is unknown.
pub const DEFAULT_IMAGE_ROWS: u32 = 20;
/// Spacer rows after a photo region.
const PHOTO_GAP: u32 = 2;
/// Rows taken by an entry without a photo.
const NO_PHOTO_ROWS: u32 = 3;

const DEFAULT_ROW_HEIGHT_PT: f64 = 15.0;
const POINTS_PER_PIXEL: f64 = 0.75;

pub const NO_IMAGE: &str = "No Image";

/// Default-height rows the photo covers at its natural size.
pub fn image_rows(photo: &Photo) -> u32 {
    match photo.dimensions() {
        Some((_, height)) => {
            let points = f64::from(height) * POINTS_PER_PIXEL;
            ((points / DEFAULT_ROW_HEIGHT_PT).ceil() as u32).max(1)
        }
        None => DEFAULT_IMAGE_ROWS,
    }
}

/// One entry per reference: a merged region in column A holding the roll
/// number, with the photo anchored at the top of column B.
pub fn build(header: &ReportHeader, entries: &[ReportEntry]) -> SheetPlan {
    let mut sheet = SheetPlan::new(SHEET_NAME);
    let mut cursor = sheet.write_header(header);
    let labels = cursor.advance(1);
    sheet.put(labels, 0, "Muster Roll No.", Style::Bold);
    sheet.put(labels, 1, "Image", Style::Bold);
    let roll_label = |e: &ReportEntry| e.reference.roll_number.clone();

    for entry in entries {
        match &entry.record.photo {
            Some(photo) => {
                let rows = image_rows(photo);
                let row = cursor.advance(rows + PHOTO_GAP);
                sheet.merge(row, row + rows - 1, 0, roll_label(entry), Style::RollNumber);
                sheet.image(row, 1, photo, false);
            }
            None => {
                let row = cursor.advance(NO_PHOTO_ROWS);
                sheet.put(row, 0, roll_label(entry), Style::RollNumber);
                sheet.put(row, 1, NO_IMAGE, Style::Plain);
            }
        }
    }

    sheet.column_widths = vec![(0, 16.0), (1, 20.0)];
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::{entry, header};
    use crate::report::HEADER_ROWS;
    use crate::testing::{jpeg, png};

    #[test]
    fn rows_from_pixel_height() {
        // 400px * 0.75 = 300pt = 20 rows.
        assert_eq!(image_rows(&Photo::new(png(10, 400))), 20);
        assert_eq!(image_rows(&Photo::new(png(10, 401))), 21);
        assert_eq!(image_rows(&Photo::new(png(10, 1))), 1);
        assert_eq!(image_rows(&Photo::new(b"not an image".to_vec())), DEFAULT_IMAGE_ROWS);
    }

    #[test]
    fn cursor_advances_by_image_rows_plus_two_or_three() {
        let entries = vec![
            entry("101", vec![], Some(Photo::new(png(10, 400)))),
            entry("102", vec![], None),
            entry("103", vec![], Some(Photo::new(png(10, 40)))),
        ];
        let sheet = build(&header(), &entries);

        assert_eq!(sheet.text_at(HEADER_ROWS, 0), Some("Muster Roll No."));
        assert_eq!(sheet.text_at(HEADER_ROWS, 1), Some("Image"));

        let first = HEADER_ROWS + 1;
        assert_eq!(sheet.merges[0].first_row, first);
        assert_eq!(sheet.merges[0].last_row, first + 19);
        assert_eq!(sheet.images[0].row, first);
        assert_eq!(sheet.images[0].col, 1);

        let second = first + 22;
        assert_eq!(sheet.text_at(second, 0), Some("102"));
        assert_eq!(sheet.text_at(second, 1), Some(NO_IMAGE));

        let third = second + 3;
        assert_eq!(sheet.merges[1].first_row, third);
        // 40px rounds up to two rows.
        assert_eq!(sheet.merges[1].last_row, third + 1);
        assert_eq!(sheet.images[1].row, third);
    }

    #[test]
    fn declared_dpi_does_not_change_reserved_rows() {
        let entries = vec![
            entry("101", vec![], Some(Photo::new(jpeg(100, 400, 72)))),
            entry("102", vec![], None),
        ];
        let sheet = build(&header(), &entries);
        let first = HEADER_ROWS + 1;
        assert_eq!(sheet.merges[0].last_row, first + 19);
        assert_eq!(sheet.text_at(first + 22, 0), Some("102"));
    }

    #[test]
    fn every_reference_gets_an_entry() {
        let entries: Vec<_> = (0..4).map(|i| entry(&format!("{i}"), vec![], None)).collect();
        let sheet = build(&header(), &entries);
        let rolls = sheet.cells.iter().filter(|c| c.style == Style::RollNumber).count();
        assert_eq!(rolls, 4);
    }
}
