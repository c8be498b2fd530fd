use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use url::Url;

use crate::client::PageSource;
use crate::config::{AttendanceDate, Settings};
use crate::fetcher::{download_photos, fetch_all, DetailRequest};
use crate::model::{MusterRollReference, RecordCache, ReportEntry};
use crate::navigator::Navigator;
use crate::report::{file_base, render_all, Artifact, ReportHeader, ReportSet};
use crate::selection::{select, Selection};

/// Header label when a listing run spans several works.
const MIXED_WORKS: &str = "All works";

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub date: AttendanceDate,
    pub selection: Selection,
}

/// Direct muster-roll range, skipping the hierarchy.
#[derive(Debug, Clone)]
pub struct RangeRequest {
    pub date: AttendanceDate,
    pub work_code: String,
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub references: usize,
    pub pages_fetched: usize,
    pub with_attendance: usize,
    pub attendance_rows: usize,
    pub photos: usize,
}

/// Everything needed to render a run's artifacts.
#[derive(Debug, Clone)]
pub struct RunData {
    pub header: ReportHeader,
    pub entries: Vec<ReportEntry>,
    pub summary: RunSummary,
    pub file_base: String,
}

impl RunData {
    pub fn artifacts(&self, with_pdf: bool) -> Result<Vec<Artifact>> {
        let set = ReportSet::build(&self.header, &self.entries);
        render_all(&set, &self.header, &self.file_base, with_pdf)
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Nothing matched the selection; no artifacts are produced.
    Empty,
    Ready(RunData),
}

pub struct Pipeline {
    source: Arc<dyn PageSource>,
    settings: Settings,
}

impl Pipeline {
    pub fn new(source: Arc<dyn PageSource>, settings: Settings) -> Self {
        Self { source, settings }
    }

    /// Navigate the hierarchy, select rows from the listing and fetch them.
    pub async fn run_listing(&self, request: &RunRequest) -> Result<RunOutcome> {
        let navigator = Navigator::new(Arc::clone(&self.source), &self.settings);
        let listing = navigator.navigate(&request.date).await?;

        let references = select(&listing, &request.selection);
        if references.is_empty() {
            info!(selection = ?request.selection, "No muster rolls matched");
            return Ok(RunOutcome::Empty);
        }
        info!("Selected {} muster rolls", references.len());

        let mut targets = Vec::with_capacity(references.len());
        for reference in references {
            let url = listing
                .url
                .join(&reference.detail_href)
                .with_context(|| format!("Bad detail link {:?}", reference.detail_href))?;
            targets.push((reference, DetailRequest::new(url)));
        }

        let entries = self.collect(targets).await?;
        let work_code = match &request.selection {
            Selection::ByWorkCode(code) => code.clone(),
            Selection::All => common_work_code(&entries),
        };
        let label = match &request.selection {
            Selection::ByWorkCode(code) => code.clone(),
            Selection::All => self.settings.region.council.clone().unwrap_or_default(),
        };
        Ok(RunOutcome::Ready(self.finish(entries, work_code, &label, &request.date)))
    }

    /// Fetch `from..=to` directly from the detail endpoint.
    pub async fn run_range(&self, request: &RangeRequest) -> Result<RunOutcome> {
        if request.from > request.to {
            bail!("Invalid roll range {}..={}: start is after end", request.from, request.to);
        }
        let work_code = request.work_code.trim();
        if work_code.is_empty() {
            bail!("Range mode needs a work code");
        }

        let mut targets = Vec::new();
        for (i, msr_no) in (request.from..=request.to).enumerate() {
            let url = range_url(&self.settings, work_code, msr_no, &request.date)?;
            let reference = MusterRollReference {
                serial: (i + 1).to_string(),
                work_code: work_code.to_string(),
                roll_number: msr_no.to_string(),
                detail_href: url.to_string(),
            };
            targets.push((reference, DetailRequest::new(url)));
        }
        info!("Fetching muster rolls {}..={} of {}", request.from, request.to, work_code);

        let entries = self.collect(targets).await?;
        Ok(RunOutcome::Ready(self.finish(entries, work_code.to_string(), work_code, &request.date)))
    }

    /// Fetch each distinct detail URL once and pair every reference with its record.
    async fn collect(&self, targets: Vec<(MusterRollReference, DetailRequest)>) -> Result<Vec<ReportEntry>> {
        let mut seen = HashSet::new();
        let unique: Vec<DetailRequest> = targets
            .iter()
            .filter(|(_, req)| seen.insert(req.url.clone()))
            .map(|(_, req)| req.clone())
            .collect();
        if unique.len() < targets.len() {
            info!("{} duplicate detail links collapsed", targets.len() - unique.len());
        }

        let fetched = fetch_all(Arc::clone(&self.source), &unique, self.settings.portal.concurrency).await?;
        let records = download_photos(self.source.as_ref(), fetched).await;

        let mut cache = RecordCache::default();
        for (request, record) in unique.into_iter().zip(records) {
            cache.insert(request.url, record);
        }

        let mut entries = Vec::with_capacity(targets.len());
        for (reference, request) in targets {
            let record = cache
                .get(&request.url)
                .with_context(|| format!("No record cached for {}", request.url))?;
            entries.push(ReportEntry { reference, record });
        }
        Ok(entries)
    }

    fn finish(&self, entries: Vec<ReportEntry>, work_code: String, label: &str, date: &AttendanceDate) -> RunData {
        let region = &self.settings.region;
        let work_name = entries
            .iter()
            .find_map(|e| e.record.work_name.clone())
            .unwrap_or_default();
        if work_name.is_empty() {
            warn!("No work name found on any detail page");
        }

        let header = ReportHeader {
            work_code,
            work_name,
            district: region.district.clone(),
            block: region.block.clone(),
            council: region.council.clone().unwrap_or_default(),
        };
        let summary = summarize(&entries);
        info!(
            references = summary.references,
            with_attendance = summary.with_attendance,
            rows = summary.attendance_rows,
            photos = summary.photos,
            "Run collected"
        );
        RunData {
            header,
            summary,
            file_base: file_base(label, date),
            entries,
        }
    }
}

fn common_work_code(entries: &[ReportEntry]) -> String {
    let mut codes = entries.iter().map(|e| e.reference.work_code.as_str());
    match codes.next() {
        Some(first) if codes.all(|c| c == first) => first.to_string(),
        _ => MIXED_WORKS.to_string(),
    }
}

fn summarize(entries: &[ReportEntry]) -> RunSummary {
    let mut seen = HashSet::new();
    let mut summary = RunSummary {
        references: entries.len(),
        ..Default::default()
    };
    for entry in entries {
        if !seen.insert(Arc::as_ptr(&entry.record)) {
            continue;
        }
        summary.pages_fetched += 1;
        summary.attendance_rows += entry.record.attendance.len();
        summary.with_attendance += usize::from(!entry.record.attendance.is_empty());
        summary.photos += usize::from(entry.record.photo.is_some());
    }
    summary
}

/// Detail URL for one roll in range mode, with the query in the portal's order.
pub fn range_url(settings: &Settings, work_code: &str, msr_no: u32, date: &AttendanceDate) -> Result<Url> {
    let region = &settings.region;
    let need = |value: &Option<String>, key: &str| -> Result<String> {
        value
            .clone()
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("Range mode needs region.{key}"))
    };
    let short_name = need(&region.state_short_name, "state_short_name")?;
    let district_code = need(&region.district_code, "district_code")?;
    let block_code = need(&region.block_code, "block_code")?;
    let council = need(&region.council, "council")?;
    let council_code = region.full_council_code(&need(&region.council_code, "council_code")?);

    let mut url = Url::parse(&settings.portal.detail_url)
        .with_context(|| format!("Invalid detail URL {:?}", settings.portal.detail_url))?;
    url.query_pairs_mut()
        .append_pair("page", "")
        .append_pair("short_name", &short_name)
        .append_pair("state_name", &region.state_name.to_uppercase())
        .append_pair("state_code", &region.state_code)
        .append_pair("district_name", &region.district.to_uppercase())
        .append_pair("district_code", &district_code)
        .append_pair("block_name", &region.block.to_uppercase())
        .append_pair("block_code", &block_code)
        .append_pair("panchayat_name", &council.to_uppercase())
        .append_pair("panchayat_code", &council_code)
        .append_pair("fin_year", &region.fin_year)
        .append_pair("source", "")
        .append_pair("work_code", work_code)
        .append_pair("msr_no", &msr_no.to_string())
        .append_pair("AttendanceDate", &date.portal_value())
        .append_pair("Digest", &settings.portal.digest);
    Ok(url)
}
