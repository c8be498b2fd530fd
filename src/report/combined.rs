use super::{ReportHeader, SheetPlan, Style, ROLL_LABEL};
use crate::model::{Photo, ReportEntry};
use crate::parser::AttendanceRow;

pub const SHEET_NAME: &str = "Attendance with Images";

/// Column G.
pub const PHOTO_COL: u16 = 6;
const PHOTO_ROW_HEIGHT: f64 = 100.0;
const PHOTO_COL_WIDTH: f64 = 20.0;
const PHOTO_LABEL: &str = "Photo";

/// One output row. Only the first row of a roll carries the roll number and photo.
#[derive(Debug, Clone)]
pub struct CombinedRow {
    pub roll: Option<String>,
    pub values: [String; 5],
    pub photo: Option<Photo>,
}

fn values(row: &AttendanceRow) -> [String; 5] {
    [
        row.serial_no.clone(),
        row.job_card_no.clone(),
        row.worker_label(),
        row.short_date(),
        row.status.clone(),
    ]
}

/// Flatten entries into rows. A roll with no attendance still yields one row.
pub fn rows(entries: &[ReportEntry]) -> Vec<CombinedRow> {
    let mut out = Vec::new();
    for entry in entries {
        let roll = &entry.reference.roll_number;
        let photo = entry.record.photo.clone();
        if entry.record.attendance.is_empty() {
            out.push(CombinedRow {
                roll: Some(roll.clone()),
                values: Default::default(),
                photo,
            });
            continue;
        }
        for (i, attendance) in entry.record.attendance.iter().enumerate() {
            let first = i == 0;
            out.push(CombinedRow {
                roll: first.then(|| roll.clone()),
                values: values(attendance),
                photo: if first { photo.clone() } else { None },
            });
        }
    }
    out
}

pub fn build(header: &ReportHeader, rows: &[CombinedRow], labels: &[String; 5]) -> SheetPlan {
    let mut sheet = SheetPlan::new(SHEET_NAME);
    let mut cursor = sheet.write_header(header);

    let label_row = cursor.advance(1);
    sheet.put(label_row, 0, ROLL_LABEL, Style::Bold);
    sheet.put_row(label_row, 1, labels.iter().cloned(), Style::Bold);
    sheet.put(label_row, PHOTO_COL, PHOTO_LABEL, Style::Bold);

    for row in rows {
        let at = cursor.advance(1);
        if let Some(roll) = &row.roll {
            sheet.put(at, 0, roll.as_str(), Style::RollNumber);
        }
        for (col, value) in (1u16..).zip(&row.values) {
            if !value.is_empty() {
                sheet.put(at, col, value.as_str(), Style::Plain);
            }
        }
        if let Some(photo) = &row.photo {
            sheet.image(at, PHOTO_COL, photo, true);
            sheet.row_heights.push((at, PHOTO_ROW_HEIGHT));
        }
    }

    sheet.column_widths = vec![(0, 16.0), (2, 22.0), (3, 30.0), (4, 14.0), (PHOTO_COL, PHOTO_COL_WIDTH)];
    sheet
}
