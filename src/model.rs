use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use url::Url;

use crate::parser::detail::{canonical_labels, AttendanceRow, DetailPage};

/// One row of the muster roll listing, as selected for fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusterRollReference {
    pub serial: String,
    pub work_code: String,
    pub roll_number: String,
    pub detail_href: String,
}

/// Downloaded site photo. The buffer is shared read-only by every report.
#[derive(Debug, Clone)]
pub struct Photo {
    bytes: Arc<[u8]>,
    dimensions: Option<(u32, u32)>,
}

impl Photo {
    pub fn new(bytes: Vec<u8>) -> Self {
        let dimensions = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .ok()
            .and_then(|r| r.into_dimensions().ok());
        Self {
            bytes: bytes.into(),
            dimensions,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Pixel `(width, height)` when the bytes decode as an image header.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }
}

/// Everything fetched for one muster roll. Produced once per detail URL.
#[derive(Debug, Clone)]
pub struct FetchedRecord {
    pub work_name: Option<String>,
    pub column_labels: [String; 5],
    pub attendance: Vec<AttendanceRow>,
    pub photo: Option<Photo>,
}

impl FetchedRecord {
    pub fn empty() -> Self {
        Self {
            work_name: None,
            column_labels: canonical_labels(),
            attendance: Vec::new(),
            photo: None,
        }
    }

    pub fn from_page(page: DetailPage, photo: Option<Photo>) -> Self {
        Self {
            work_name: page.work_name,
            column_labels: page.column_labels,
            attendance: page.attendance,
            photo,
        }
    }
}

impl Default for FetchedRecord {
    fn default() -> Self {
        Self::empty()
    }
}

/// Run-scoped records keyed by detail URL. First writer wins.
#[derive(Debug, Default)]
pub struct RecordCache {
    records: HashMap<Url, Arc<FetchedRecord>>,
}

impl RecordCache {
    pub fn insert(&mut self, url: Url, record: FetchedRecord) -> Arc<FetchedRecord> {
        Arc::clone(self.records.entry(url).or_insert_with(|| Arc::new(record)))
    }

    pub fn get(&self, url: &Url) -> Option<Arc<FetchedRecord>> {
        self.records.get(url).cloned()
    }
}

/// A listing row paired with its fetched record, in listing order.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub reference: MusterRollReference,
    pub record: Arc<FetchedRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::png;

    #[test]
    fn photo_reads_dimensions() {
        let photo = Photo::new(png(30, 120));
        assert_eq!(photo.dimensions(), Some((30, 120)));
        assert!(!photo.bytes().is_empty());
    }

    #[test]
    fn undecodable_photo_keeps_bytes() {
        let photo = Photo::new(b"<html>not an image</html>".to_vec());
        assert_eq!(photo.dimensions(), None);
        assert_eq!(photo.bytes().len(), 25);
    }

    #[test]
    fn cache_first_writer_wins() {
        let url = Url::parse("https://portal.test/dtl.aspx?msr_no=1").unwrap();
        let mut cache = RecordCache::default();
        let mut first = FetchedRecord::empty();
        first.work_name = Some("first".into());
        let mut second = FetchedRecord::empty();
        second.work_name = Some("second".into());

        cache.insert(url.clone(), first);
        let kept = cache.insert(url.clone(), second);
        assert_eq!(kept.work_name.as_deref(), Some("first"));
        assert_eq!(cache.get(&url).unwrap().work_name.as_deref(), Some("first"));
    }
}
