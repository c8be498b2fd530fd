use super::{ReportHeader, SheetPlan, Style, ROLL_LABEL};
use crate::model::ReportEntry;
use crate::parser::AttendanceRow;

pub const SHEET_NAME: &str = "Attendance";

pub(crate) fn row_values(row: &AttendanceRow) -> [String; 5] {
    [
        row.serial_no.clone(),
        row.job_card_no.clone(),
        row.worker_label(),
        row.attendance_date.clone(),
        row.status.clone(),
    ]
}

/// Header block, a label row, then one row per worker-day prefixed by its
/// muster roll number. Rolls without attendance contribute nothing.
pub fn build(header: &ReportHeader, entries: &[ReportEntry], labels: &[String; 5]) -> SheetPlan {
    let mut sheet = SheetPlan::new(SHEET_NAME);
    let mut cursor = sheet.write_header(header);

    let label_row = cursor.advance(1);
    sheet.put(label_row, 0, ROLL_LABEL, Style::Bold);
    sheet.put_row(label_row, 1, labels.iter().cloned(), Style::Bold);

    for entry in entries {
        for attendance in &entry.record.attendance {
            let row = cursor.advance(1);
            sheet.put(row, 0, entry.reference.roll_number.as_str(), Style::RollNumber);
            sheet.put_row(row, 1, row_values(attendance), Style::Plain);
        }
    }

    sheet.column_widths = vec![(0, 16.0), (1, 8.0), (2, 22.0), (3, 30.0), (4, 22.0), (5, 14.0)];
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::detail::canonical_labels;
    use crate::report::tests::{attendance, entry, header};
    use crate::report::HEADER_ROWS;

    #[test]
    fn one_row_per_attendance_with_roll_prefix() {
        let entries = vec![
            entry("101", vec![attendance("1", "Hanumanthappa"), attendance("2", "Gangamma")], None),
            entry("102", vec![], None),
            entry("103", vec![attendance("1", "Eramma")], None),
        ];
        let sheet = build(&header(), &entries, &canonical_labels());

        let labels = HEADER_ROWS;
        assert_eq!(sheet.text_at(labels, 0), Some(ROLL_LABEL));
        assert_eq!(sheet.text_at(labels, 3), Some("Worker Name (Gender)"));

        assert_eq!(sheet.text_at(labels + 1, 0), Some("101"));
        assert_eq!(sheet.text_at(labels + 1, 3), Some("Hanumanthappa (Female)"));
        assert_eq!(sheet.text_at(labels + 2, 0), Some("101"));
        assert_eq!(sheet.text_at(labels + 3, 0), Some("103"));
        // Full timestamp is kept in this layout.
        assert_eq!(sheet.text_at(labels + 3, 4), Some("18 Jul 2025 09:14:02"));
        assert_eq!(sheet.text_at(labels + 4, 0), None);
    }
}
