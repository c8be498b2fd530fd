use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::table::{locate, own_rows, row_cells, TableLocator, ANCHOR_SEL};
use super::text::{clean, element_text, normalize_label};

static BOLD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("b").unwrap());
static SPAN_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span[id]").unwrap());
static WORK_NAME_FALLBACK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#ContentPlaceHolder1_lbl_dtl").unwrap());

const WORK_NAME_MARKER: &str = "Work Name";
const WORKER_SPAN_ID: &str = "lbl_workerName_";
const PHOTO_LINK_TEXT: &str = "Click here for large image";

/// Attendance columns in canonical order.
pub const ATTENDANCE_COLUMNS: [&str; 5] = [
    "S.No",
    "Job Card No",
    "Worker Name (Gender)",
    "Attendance Date",
    "Present/Absent",
];

const COL_SERIAL: usize = 0;
const COL_JOB_CARD: usize = 1;
const COL_WORKER: usize = 2;
const COL_DATE: usize = 3;
const COL_STATUS: usize = 4;

/// Without these the last table is not an attendance table.
const REQUIRED_COLS: [usize; 2] = [COL_SERIAL, COL_WORKER];

/// One worker-day. Fields missing on the page are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceRow {
    pub serial_no: String,
    pub job_card_no: String,
    pub worker_name: String,
    pub gender: String,
    pub attendance_date: String,
    pub status: String,
}

impl AttendanceRow {
    /// The combined "Name (Gender)" form the portal shows.
    pub fn worker_label(&self) -> String {
        if self.gender.is_empty() {
            self.worker_name.clone()
        } else {
            format!("{} ({})", self.worker_name, self.gender)
        }
    }

    /// The portal appends a time; keep `DD Mon YYYY`.
    pub fn short_date(&self) -> String {
        self.attendance_date
            .split_whitespace()
            .take(3)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What a detail page yields before its photo is downloaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailPage {
    pub work_name: Option<String>,
    /// Header text found for each canonical column, canonical name if absent.
    pub column_labels: [String; 5],
    pub attendance: Vec<AttendanceRow>,
    pub photo_href: Option<String>,
}

impl DetailPage {
    pub fn has_attendance(&self) -> bool {
        !self.attendance.is_empty()
    }
}

pub fn canonical_labels() -> [String; 5] {
    ATTENDANCE_COLUMNS.map(String::from)
}

/// Split "Name (Gender)" on the last parenthesis pair. Without a trailing
/// pair the whole field is the name and gender is empty.
pub fn split_worker_name(raw: &str) -> (String, String) {
    if raw.ends_with(')') {
        if let Some(open) = raw.rfind('(') {
            let name = raw[..open].trim().to_string();
            let gender = raw[open + 1..raw.len() - 1].trim().to_string();
            return (name, gender);
        }
    }
    (raw.to_string(), String::new())
}

pub fn parse_detail(html: &str) -> DetailPage {
    let doc = Html::parse_document(html);

    let mut page = DetailPage {
        work_name: work_name(&doc),
        column_labels: canonical_labels(),
        attendance: Vec::new(),
        photo_href: photo_href(&doc),
    };

    if let Some(table) = locate(&doc, TableLocator::LastOnPage) {
        read_attendance(table, &mut page);
    }
    page
}

fn work_name(doc: &Html) -> Option<String> {
    let marked = doc
        .select(&BOLD_SEL)
        .find(|b| element_text(*b).starts_with(WORK_NAME_MARKER))
        .and_then(|b| {
            let next = b.next_sibling()?;
            let raw = match next.value().as_text() {
                Some(text) => text.trim().to_string(),
                None => ElementRef::wrap(next).map(element_text)?,
            };
            let trimmed = clean(raw.trim_matches(|c: char| c.is_whitespace() || c == ':' || c == '-'));
            (!trimmed.is_empty()).then_some(trimmed)
        });

    marked.or_else(|| {
        doc.select(&WORK_NAME_FALLBACK_SEL)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
    })
}

fn photo_href(doc: &Html) -> Option<String> {
    doc.select(&ANCHOR_SEL)
        .find(|a| a.text().collect::<String>().trim() == PHOTO_LINK_TEXT)
        .and_then(|a| a.value().attr("href"))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

fn read_attendance(table: ElementRef<'_>, page: &mut DetailPage) {
    let mut rows = own_rows(table);
    let Some(header) = rows.next() else {
        return;
    };

    // Header text → canonical slot, built once before any row is read.
    let header_cells: Vec<String> = row_cells(header).map(element_text).collect();
    let mut col_map: [Option<usize>; 5] = [None; 5];
    for (slot, wanted) in ATTENDANCE_COLUMNS.iter().enumerate() {
        let wanted = normalize_label(wanted);
        if let Some(idx) = header_cells.iter().position(|h| normalize_label(h) == wanted) {
            col_map[slot] = Some(idx);
            page.column_labels[slot] = header_cells[idx].clone();
        }
    }

    let missing: Vec<&str> = REQUIRED_COLS
        .iter()
        .filter(|&&slot| col_map[slot].is_none())
        .map(|&slot| ATTENDANCE_COLUMNS[slot])
        .collect();
    if !missing.is_empty() {
        warn!(?missing, found = ?header_cells, "Last table is not an attendance table");
        page.column_labels = canonical_labels();
        return;
    }

    for tr in rows {
        let cells: Vec<ElementRef<'_>> = row_cells(tr).collect();
        let texts: Vec<String> = cells.iter().map(|c| element_text(*c)).collect();
        if texts.iter().all(|t| t.is_empty()) {
            continue;
        }

        let at = |slot: usize| -> String {
            col_map[slot]
                .and_then(|i| texts.get(i))
                .cloned()
                .unwrap_or_default()
        };

        // The site sometimes repeats the label outside the span; prefer the span.
        let worker = cells
            .iter()
            .flat_map(|c| c.select(&SPAN_SEL))
            .find(|s| s.value().id().is_some_and(|id| id.contains(WORKER_SPAN_ID)))
            .map(element_text)
            .unwrap_or_else(|| at(COL_WORKER));
        let (worker_name, gender) = split_worker_name(&worker);

        page.attendance.push(AttendanceRow {
            serial_no: at(COL_SERIAL),
            job_card_no: at(COL_JOB_CARD),
            worker_name,
            gender,
            attendance_date: at(COL_DATE),
            status: at(COL_STATUS),
        });
    }
}
