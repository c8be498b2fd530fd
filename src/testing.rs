//! In-memory `PageSource` for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use crate::client::PageSource;
use crate::config::{PortalSettings, RegionPath, Settings};

#[derive(Default)]
pub struct FakeSource {
    pages: HashMap<String, String>,
    posts: HashMap<String, String>,
    bytes: HashMap<String, Vec<u8>>,
    delays: HashMap<String, Duration>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub requested: Mutex<Vec<String>>,
    pub posted_forms: Mutex<Vec<Vec<(String, String)>>>,
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    pub fn post(mut self, url: &str, body: impl Into<String>) -> Self {
        self.posts.insert(url.to_string(), body.into());
        self
    }

    pub fn bytes(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bytes.insert(url.to_string(), body);
        self
    }

    pub fn delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    async fn enter(&self, url: &Url) {
        self.requested.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(d) = self.delays.get(url.as_str()) {
            tokio::time::sleep(*d).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PageSource for FakeSource {
    async fn get_text(&self, url: &Url) -> Result<String> {
        self.enter(url).await;
        self.pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP 404 Not Found for {}", url))
    }

    async fn post_form(&self, url: &Url, form: &[(String, String)], _referer: &Url) -> Result<String> {
        self.enter(url).await;
        self.posted_forms.lock().unwrap().push(form.to_vec());
        self.posts
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP 500 for POST {}", url))
    }

    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>> {
        self.enter(url).await;
        self.bytes
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("HTTP 404 Not Found for {}", url))
    }
}

/// A small valid PNG of the given size.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// A baseline JPEG whose JFIF header declares `dpi`.
pub fn jpeg(width: u32, height: u32, dpi: u16) -> Vec<u8> {
    use image::codecs::jpeg::{JpegEncoder, PixelDensity};
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([90, 140, 60]));
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new(&mut buf);
    encoder.set_pixel_density(PixelDensity::dpi(dpi));
    encoder.encode_image(&img).unwrap();
    buf
}

pub const LANDING: &str =
    "https://portal.test/nregaarch/View_NMMS_atten_date_new.aspx?fin_year=2024-2025&Digest=d1g3st";
pub const STATE_URL: &str =
    "https://portal.test/nregaarch/View_NMMS_atten_date_new.aspx?state_code=15&lflag=dist&Digest=d1g3st";
pub const DISTRICT_URL: &str =
    "https://portal.test/nregaarch/View_NMMS_atten_date_new.aspx?district_code=1505&lflag=blk&Digest=d1g3st";
pub const BLOCK_URL: &str =
    "https://portal.test/nregaarch/View_NMMS_atten_date_new.aspx?block_code=1505007&lflag=panch";
pub const COUNCIL_URL: &str =
    "https://portal.test/nregaarch/View_NMMS_atten_date_new.aspx?panchayat_code=1505007016&lflag=msr";

pub fn settings() -> Settings {
    Settings {
        portal: PortalSettings {
            landing_url: "https://portal.test/nregaarch/View_NMMS_atten_date_new.aspx".into(),
            detail_url: "https://portal.test/nregaarch/View_NMMS_atten_date_dtl_rpt.aspx".into(),
            digest: "d1g3st".into(),
            user_agent: "test".into(),
            timeout_secs: 5,
            concurrency: 2,
        },
        region: RegionPath {
            fin_year: "2024-2025".into(),
            state_code: "15".into(),
            state_name: "Karnataka".into(),
            district: "BALLARI".into(),
            block: "siruguppa".into(),
            council: Some("Balakundhi".into()),
            council_code: None,
            state_short_name: Some("KN".into()),
            district_code: Some("1505".into()),
            block_code: Some("1505007".into()),
        },
        output_dir: ".".into(),
    }
}

/// Every page of the chain up to and including the muster listing.
pub fn portal() -> FakeSource {
    FakeSource::new()
        .page(LANDING, fixture("landing"))
        .post(LANDING, fixture("states"))
        .page(STATE_URL, fixture("districts"))
        .page(DISTRICT_URL, fixture("blocks"))
        .page(BLOCK_URL, fixture("councils"))
        .page(COUNCIL_URL, fixture("muster_list"))
}
