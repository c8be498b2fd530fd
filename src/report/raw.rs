use super::{ReportHeader, SheetPlan, Style};
use crate::model::ReportEntry;

pub const SHEET_NAME: &str = "Muster Rolls";

pub const RAW_COLUMNS: [&str; 9] = [
    "Taluk",
    "Panchayath",
    "Work Code",
    "Muster Roll No",
    "Job Card No",
    "Worker Name",
    "Gender",
    "Attendance",
    "Attendance Date",
];

/// Flat export: no header block, one row per worker-day, name and gender split.
pub fn build(header: &ReportHeader, entries: &[ReportEntry]) -> SheetPlan {
    let mut sheet = SheetPlan::new(SHEET_NAME);
    sheet.put_row(0, 0, RAW_COLUMNS, Style::Bold);

    let mut row = 1;
    for entry in entries {
        let work_code = if entry.reference.work_code.is_empty() {
            header.work_code.as_str()
        } else {
            entry.reference.work_code.as_str()
        };
        for a in &entry.record.attendance {
            sheet.put_row(
                row,
                0,
                [
                    header.block.as_str(),
                    header.council.as_str(),
                    work_code,
                    entry.reference.roll_number.as_str(),
                    a.job_card_no.as_str(),
                    a.worker_name.as_str(),
                    a.gender.as_str(),
                    a.status.as_str(),
                    a.attendance_date.as_str(),
                ],
                Style::Plain,
            );
            row += 1;
        }
    }
    sheet
}
