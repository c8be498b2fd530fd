//! Report layouts.
//!
//! Each layout is planned as a [`SheetPlan`] (cells, merged regions, image
//! anchors, row heights) with its own [`ReportCursor`], then rendered to
//! bytes by [`xlsx`]. Planning is pure so positions can be tested without
//! decoding a workbook.

pub mod combined;
pub mod gallery;
pub mod pdf;
pub mod raw;
pub mod tabular;
pub mod xlsx;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::AttendanceDate;
use crate::model::{Photo, ReportEntry};
use crate::parser::detail::canonical_labels;

/// Header block rows: five metadata lines and one blank spacer.
pub const HEADER_ROWS: u32 = 6;

pub const ROLL_LABEL: &str = "Muster Roll No";

/// Metadata printed above every spreadsheet layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportHeader {
    pub work_code: String,
    pub work_name: String,
    pub district: String,
    pub block: String,
    pub council: String,
}

impl ReportHeader {
    pub fn lines(&self) -> [String; 5] {
        [
            format!("Work Code: {}", self.work_code),
            format!("Work Name: {}", self.work_name),
            format!("District: {}", self.district),
            format!("Taluk/Block: {}", self.block),
            format!("Panchayath Name: {}", self.council),
        ]
    }
}

/// Next free row of one layout. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportCursor {
    next_row: u32,
}

impl ReportCursor {
    pub fn at(row: u32) -> Self {
        Self { next_row: row }
    }

    pub fn row(&self) -> u32 {
        self.next_row
    }

    /// Claim `rows` rows and return the first of them.
    pub fn advance(&mut self, rows: u32) -> u32 {
        let row = self.next_row;
        self.next_row += rows;
        row
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Plain,
    Bold,
    /// Centered; written as a number when it parses as one.
    RollNumber,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellPlan {
    pub row: u32,
    pub col: u16,
    pub text: String,
    pub style: Style,
}

/// A vertical merged region in one column.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub first_row: u32,
    pub last_row: u32,
    pub col: u16,
    pub text: String,
    pub style: Style,
}

#[derive(Debug, Clone)]
pub struct ImagePlan {
    pub row: u32,
    pub col: u16,
    pub photo: Photo,
    /// Scale into the anchor cell instead of inserting at natural size.
    pub fit_to_cell: bool,
}

#[derive(Debug, Clone)]
pub struct SheetPlan {
    pub name: &'static str,
    pub cells: Vec<CellPlan>,
    pub merges: Vec<MergePlan>,
    pub images: Vec<ImagePlan>,
    pub row_heights: Vec<(u32, f64)>,
    pub column_widths: Vec<(u16, f64)>,
}

impl SheetPlan {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cells: Vec::new(),
            merges: Vec::new(),
            images: Vec::new(),
            row_heights: Vec::new(),
            column_widths: Vec::new(),
        }
    }

    pub fn put(&mut self, row: u32, col: u16, text: impl Into<String>, style: Style) {
        self.cells.push(CellPlan {
            row,
            col,
            text: text.into(),
            style,
        });
    }

    /// Write consecutive cells starting at `first_col`.
    pub fn put_row<I, S>(&mut self, row: u32, first_col: u16, values: I, style: Style)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (col, value) in (first_col..).zip(values) {
            self.put(row, col, value, style);
        }
    }

    pub fn merge(&mut self, first_row: u32, last_row: u32, col: u16, text: impl Into<String>, style: Style) {
        self.merges.push(MergePlan {
            first_row,
            last_row,
            col,
            text: text.into(),
            style,
        });
    }

    pub fn image(&mut self, row: u32, col: u16, photo: &Photo, fit_to_cell: bool) {
        self.images.push(ImagePlan {
            row,
            col,
            photo: photo.clone(),
            fit_to_cell,
        });
    }

    /// Write the metadata block and return a cursor just below it.
    pub fn write_header(&mut self, header: &ReportHeader) -> ReportCursor {
        for (row, line) in (0u32..).zip(header.lines()) {
            self.put(row, 0, line, Style::Bold);
        }
        ReportCursor::at(HEADER_ROWS)
    }

    pub fn text_at(&self, row: u32, col: u16) -> Option<&str> {
        self.cells
            .iter()
            .rev()
            .find(|c| c.row == row && c.col == col)
            .map(|c| c.text.as_str())
            .or_else(|| {
                self.merges
                    .iter()
                    .find(|m| m.first_row == row && m.col == col)
                    .map(|m| m.text.as_str())
            })
    }
}

/// Column labels from the first record that has attendance rows. Records
/// that saw different labels are still written in canonical column order.
pub fn column_labels(entries: &[ReportEntry]) -> [String; 5] {
    let mut with_rows = entries.iter().filter(|e| !e.record.attendance.is_empty());
    let Some(first) = with_rows.next() else {
        return canonical_labels();
    };
    let labels = first.record.column_labels.clone();
    for entry in with_rows {
        if entry.record.column_labels != labels {
            warn!(
                roll = %entry.reference.roll_number,
                "Column labels differ from {:?}: {:?}", labels, entry.record.column_labels
            );
        }
    }
    labels
}

/// The four spreadsheet layouts planned over the same entries.
#[derive(Debug, Clone)]
pub struct ReportSet {
    pub tabular: SheetPlan,
    pub gallery: SheetPlan,
    pub combined: SheetPlan,
    pub raw: SheetPlan,
    /// Combined rows, reused by the print document.
    pub print_rows: Vec<combined::CombinedRow>,
    pub labels: [String; 5],
}

impl ReportSet {
    pub fn build(header: &ReportHeader, entries: &[ReportEntry]) -> Self {
        let labels = column_labels(entries);
        let print_rows = combined::rows(entries);
        Self {
            tabular: tabular::build(header, entries, &labels),
            gallery: gallery::build(header, entries),
            combined: combined::build(header, &print_rows, &labels),
            raw: raw::build(header, entries),
            print_rows,
            labels,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Tabular,
    Gallery,
    Combined,
    Raw,
    Print,
}

impl ArtifactKind {
    pub fn file_name(self, base: &str) -> String {
        match self {
            ArtifactKind::Tabular => format!("attendance_data_{base}.xlsx"),
            ArtifactKind::Gallery => format!("attendance_images_{base}.xlsx"),
            ArtifactKind::Combined => format!("attendance_with_images_{base}.xlsx"),
            ArtifactKind::Raw => format!("muster_rolls_raw_{base}.xlsx"),
            ArtifactKind::Print => format!("attendance_with_images_{base}.pdf"),
        }
    }
}

/// A finished file, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// `{label}_{date}` with every `/` replaced so it is safe as a file name.
pub fn file_base(label: &str, date: &AttendanceDate) -> String {
    format!("{}_{}", label.trim().replace('/', "_"), date.file_stem())
}

/// Render every layout. The print document is best-effort: a failure is
/// logged and the spreadsheets are still returned.
pub fn render_all(set: &ReportSet, header: &ReportHeader, base: &str, with_pdf: bool) -> Result<Vec<Artifact>> {
    let sheets = [
        (ArtifactKind::Tabular, &set.tabular),
        (ArtifactKind::Gallery, &set.gallery),
        (ArtifactKind::Combined, &set.combined),
        (ArtifactKind::Raw, &set.raw),
    ];

    let mut artifacts = Vec::with_capacity(sheets.len() + 1);
    for (kind, plan) in sheets {
        let bytes = xlsx::render(plan).with_context(|| format!("Failed to render {} sheet", plan.name))?;
        artifacts.push(Artifact {
            kind,
            file_name: kind.file_name(base),
            bytes,
        });
    }

    if with_pdf {
        match pdf::render(header, &set.labels, &set.print_rows) {
            Ok(bytes) => artifacts.push(Artifact {
                kind: ArtifactKind::Print,
                file_name: ArtifactKind::Print.file_name(base),
                bytes,
            }),
            Err(e) => warn!("Skipping print document: {:#}", e),
        }
    }

    info!("Rendered {} artifacts for {}", artifacts.len(), base);
    Ok(artifacts)
}
