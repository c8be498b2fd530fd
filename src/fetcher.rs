use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::PageSource;
use crate::model::{FetchedRecord, Photo};
use crate::parser::{parse_detail, DetailPage};

/// Query parameter the portal sometimes rejects; dropped on the fallback attempt.
const WORK_CODE_PARAM: &str = "work_code";

/// One detail page to fetch, with at most one alternate URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRequest {
    pub url: Url,
    pub fallback: Option<Url>,
}

impl DetailRequest {
    /// The fallback is the same URL without `work_code`, when it carried one.
    pub fn new(url: Url) -> Self {
        let fallback = without_param(&url, WORK_CODE_PARAM);
        Self { url, fallback }
    }
}

fn without_param(url: &Url, name: &str) -> Option<Url> {
    if !url.query_pairs().any(|(k, _)| k == name) {
        return None;
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != name)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut stripped = url.clone();
    stripped.set_query(None);
    if !kept.is_empty() {
        stripped.query_pairs_mut().extend_pairs(kept);
    }
    Some(stripped)
}

/// A parsed detail page before its photo is downloaded.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub page: DetailPage,
    /// URL the page was actually served from; photo links resolve against it.
    pub page_url: Url,
    pub failed: bool,
}

impl Fetched {
    fn failed(url: Url) -> Self {
        Self {
            page: DetailPage::default(),
            page_url: url,
            failed: true,
        }
    }
}

async fn fetch_page(source: &dyn PageSource, url: &Url) -> Result<DetailPage> {
    let body = source.get_text(url).await?;
    Ok(parse_detail(&body))
}

/// Fetch one detail page, trying the fallback once when the first attempt
/// fails or shows no attendance. Never errors: failures degrade to empty.
pub async fn fetch_record(source: &dyn PageSource, request: &DetailRequest) -> Fetched {
    let first = match fetch_page(source, &request.url).await {
        Ok(page) => Some(page),
        Err(e) => {
            warn!("Detail fetch failed for {}: {:#}", request.url, e);
            None
        }
    };

    let first = match first {
        Some(page) if page.has_attendance() => {
            return Fetched {
                page,
                page_url: request.url.clone(),
                failed: false,
            }
        }
        other => other,
    };

    let Some(fallback) = &request.fallback else {
        return match first {
            Some(page) => Fetched {
                page,
                page_url: request.url.clone(),
                failed: false,
            },
            None => Fetched::failed(request.url.clone()),
        };
    };

    debug!("Retrying without {}: {}", WORK_CODE_PARAM, fallback);
    match (first, fetch_page(source, fallback).await) {
        (Some(first), Ok(second)) if !second.has_attendance() => Fetched {
            page: first,
            page_url: request.url.clone(),
            failed: false,
        },
        (_, Ok(second)) => Fetched {
            page: second,
            page_url: fallback.clone(),
            failed: false,
        },
        (Some(first), Err(e)) => {
            warn!("Fallback fetch failed for {}: {:#}", fallback, e);
            Fetched {
                page: first,
                page_url: request.url.clone(),
                failed: false,
            }
        }
        (None, Err(e)) => {
            warn!("Fallback fetch failed for {}: {:#}", fallback, e);
            Fetched::failed(request.url.clone())
        }
    }
}

/// Fetch every request on at most `concurrency` tasks. Results come back in
/// request order regardless of completion order.
pub async fn fetch_all(
    source: Arc<dyn PageSource>,
    requests: &[DetailRequest],
    concurrency: usize,
) -> Result<Vec<Fetched>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let total = requests.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut handles = Vec::with_capacity(total);
    for request in requests.iter().cloned() {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .context("Fetch pool closed")?;
        let source = Arc::clone(&source);
        let pb = pb.clone();
        handles.push(tokio::spawn(async move {
            let fetched = fetch_record(source.as_ref(), &request).await;
            drop(permit);
            pb.inc(1);
            fetched
        }));
    }

    let mut results = Vec::with_capacity(total);
    for handle in handles {
        results.push(handle.await.context("Detail fetch task panicked")?);
    }
    pb.finish_and_clear();

    let failed = results.iter().filter(|f| f.failed).count();
    info!("Fetched {} detail pages ({} ok, {} failed)", total, total - failed, failed);
    Ok(results)
}

/// Download photos one at a time, after every detail page is in.
pub async fn download_photos(source: &dyn PageSource, fetched: Vec<Fetched>) -> Vec<FetchedRecord> {
    let mut records = Vec::with_capacity(fetched.len());
    for item in fetched {
        let photo = match &item.page.photo_href {
            Some(href) => download_photo(source, &item.page_url, href).await,
            None => None,
        };
        records.push(FetchedRecord::from_page(item.page, photo));
    }
    records
}

async fn download_photo(source: &dyn PageSource, base: &Url, href: &str) -> Option<Photo> {
    let url = match base.join(href) {
        Ok(url) => url,
        Err(e) => {
            warn!("Bad photo link {:?} on {}: {}", href, base, e);
            return None;
        }
    };
    match source.get_bytes(&url).await {
        Ok(bytes) if bytes.is_empty() => {
            warn!("Empty photo at {}", url);
            None
        }
        Ok(bytes) => Some(Photo::new(bytes)),
        Err(e) => {
            warn!("Photo download failed for {}: {:#}", url, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixture, png, FakeSource};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const DTL: &str = "https://portal.test/nregaarch/View_NMMS_atten_date_dtl_rpt.aspx";

    fn url(query: &str) -> Url {
        Url::parse(&format!("{DTL}?{query}")).unwrap()
    }

    fn detail_with(name: &str) -> String {
        fixture("detail").replace("Desilting of Kere at Balakundhi", name)
    }

    #[test]
    fn fallback_drops_work_code_only() {
        let req = DetailRequest::new(url("msr_no=5&work_code=27%2FWC%2F1&Digest=d"));
        let fallback = req.fallback.unwrap();
        assert_eq!(fallback.query(), Some("msr_no=5&Digest=d"));

        assert_eq!(DetailRequest::new(url("msr_no=5&Digest=d")).fallback, None);
    }

    #[tokio::test]
    async fn order_preserved_under_uneven_latency() {
        let mut source = FakeSource::new();
        let mut requests = Vec::new();
        for i in 0..6u64 {
            let u = url(&format!("msr_no={i}"));
            source = source
                .page(u.as_str(), detail_with(&format!("Work {i}")))
                .delay(u.as_str(), Duration::from_millis(60 - i * 10));
            requests.push(DetailRequest::new(u));
        }
        let source = Arc::new(source);

        let results = fetch_all(source.clone(), &requests, 3).await.unwrap();
        let names: Vec<String> = results.iter().map(|f| f.page.work_name.clone().unwrap()).collect();
        assert_eq!(names, (0..6).map(|i| format!("Work {i}")).collect::<Vec<_>>());
        assert!(source.max_in_flight.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn concurrency_one_is_sequential() {
        let mut source = FakeSource::new();
        let mut requests = Vec::new();
        for i in 0..4 {
            let u = url(&format!("msr_no={i}"));
            source = source.page(u.as_str(), fixture("detail")).delay(u.as_str(), Duration::from_millis(5));
            requests.push(DetailRequest::new(u));
        }
        let source = Arc::new(source);
        fetch_all(source.clone(), &requests, 1).await.unwrap();
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_degrades_to_empty_record() {
        let ok = url("msr_no=1");
        let missing = url("msr_no=2");
        let source = Arc::new(FakeSource::new().page(ok.as_str(), fixture("detail")));
        let requests = vec![DetailRequest::new(ok), DetailRequest::new(missing)];

        let results = fetch_all(source, &requests, 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results[0].failed);
        assert_eq!(results[0].page.attendance.len(), 2);
        assert!(results[1].failed);
        assert!(results[1].page.attendance.is_empty());
        assert_eq!(results[1].page.work_name, None);
    }

    #[tokio::test]
    async fn falls_back_when_first_attempt_is_empty() {
        let primary = url("msr_no=7&work_code=WC1");
        let fallback = url("msr_no=7");
        let empty = "<html><body><table><tr><th>S.No</th></tr></table></body></html>";
        let source = FakeSource::new()
            .page(primary.as_str(), empty)
            .page(fallback.as_str(), fixture("detail"));

        let fetched = fetch_record(&source, &DetailRequest::new(primary)).await;
        assert_eq!(fetched.page_url, fallback);
        assert_eq!(fetched.page.attendance.len(), 2);
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn footer_table_on_primary_triggers_fallback() {
        let primary = url("msr_no=11&work_code=WC1");
        let fallback = url("msr_no=11");
        let footer = r#"<html><body>
            <b>Work Name</b> : Desilting of Kere
            <table><tr><td>Disclaimer</td></tr><tr><td>Figures are provisional.</td></tr></table>
        </body></html>"#;
        let source = FakeSource::new()
            .page(primary.as_str(), footer)
            .page(fallback.as_str(), fixture("detail"));

        let fetched = fetch_record(&source, &DetailRequest::new(primary)).await;
        assert_eq!(fetched.page_url, fallback);
        assert_eq!(fetched.page.attendance.len(), 2);
        assert!(fetched.page.attendance.iter().all(|a| !a.worker_name.is_empty()));
    }

    #[tokio::test]
    async fn keeps_first_page_when_fallback_is_also_empty() {
        let primary = url("msr_no=8&work_code=WC1");
        let fallback = url("msr_no=8");
        let source = FakeSource::new()
            .page(primary.as_str(), r#"<span id="ContentPlaceHolder1_lbl_dtl">Pond</span>"#)
            .page(fallback.as_str(), "<html></html>");

        let fetched = fetch_record(&source, &DetailRequest::new(primary.clone())).await;
        assert_eq!(fetched.page_url, primary);
        assert_eq!(fetched.page.work_name.as_deref(), Some("Pond"));
        assert!(!fetched.failed);
    }

    #[tokio::test]
    async fn no_second_attempt_when_first_has_rows() {
        let primary = url("msr_no=9&work_code=WC1");
        let source = FakeSource::new().page(primary.as_str(), fixture("detail"));
        fetch_record(&source, &DetailRequest::new(primary)).await;
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn photos_resolve_against_page_url() {
        let page = url("msr_no=1");
        let photo_url = "https://portal.test/nregaarch/photos/msr_101.jpg";
        let source = FakeSource::new()
            .page(page.as_str(), fixture("detail"))
            .bytes(photo_url, png(40, 80));

        let fetched = vec![fetch_record(&source, &DetailRequest::new(page)).await];
        let records = download_photos(&source, fetched).await;
        let photo = records[0].photo.as_ref().unwrap();
        assert_eq!(photo.dimensions(), Some((40, 80)));
        assert_eq!(records[0].work_name.as_deref(), Some("Desilting of Kere at Balakundhi"));
    }

    #[tokio::test]
    async fn photo_failure_means_no_photo() {
        let page = url("msr_no=1");
        let source = FakeSource::new().page(page.as_str(), fixture("detail"));

        let fetched = vec![fetch_record(&source, &DetailRequest::new(page)).await];
        let records = download_photos(&source, fetched).await;
        assert!(records[0].photo.is_none());
        assert_eq!(records[0].attendance.len(), 2);
    }
}
