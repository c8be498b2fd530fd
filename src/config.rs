use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use config::{Config, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "muster.toml";
const ENV_PREFIX: &str = "MUSTER";

const LANDING_URL: &str = "https://mnregaweb4.nic.in/nregaarch/View_NMMS_atten_date_new.aspx";
const DETAIL_URL: &str = "https://mnregaweb4.nic.in/nregaarch/View_NMMS_atten_date_dtl_rpt.aspx";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Everything a run needs to know, resolved once at startup and never mutated.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub portal: PortalSettings,
    pub region: RegionPath,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSettings {
    /// Page holding the financial-year/date selection form.
    pub landing_url: String,
    /// Detail endpoint used by direct range mode.
    pub detail_url: String,
    pub digest: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub concurrency: usize,
}

impl PortalSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Administrative path from state down to council.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionPath {
    pub fin_year: String,
    pub state_code: String,
    pub state_name: String,
    pub district: String,
    pub block: String,
    #[serde(default)]
    pub council: Option<String>,
    #[serde(default)]
    pub council_code: Option<String>,
    // Only the direct range mode needs these.
    #[serde(default)]
    pub state_short_name: Option<String>,
    #[serde(default)]
    pub district_code: Option<String>,
    #[serde(default)]
    pub block_code: Option<String>,
}

impl RegionPath {
    /// Portal council codes embed the block code; a bare 3-digit suffix is expanded.
    pub fn full_council_code(&self, code: &str) -> String {
        match &self.block_code {
            Some(block) if !code.starts_with(block.as_str()) => format!("{block}{code}"),
            _ => code.to_string(),
        }
    }
}

/// Values given on the command line; `None` leaves the layered value alone.
#[derive(Debug, Default)]
pub struct Overrides {
    pub digest: Option<String>,
    pub fin_year: Option<String>,
    pub council: Option<String>,
    pub council_code: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub output_dir: Option<PathBuf>,
}

/// Layer defaults, the optional config file, `MUSTER__*` env vars and CLI overrides.
pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Settings> {
    let file = match path {
        Some(p) => File::from(p).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let settings = Config::builder()
        .set_default("portal.landing_url", LANDING_URL)?
        .set_default("portal.detail_url", DETAIL_URL)?
        .set_default("portal.digest", "")?
        .set_default("portal.user_agent", USER_AGENT)?
        .set_default("portal.timeout_secs", 30)?
        .set_default("portal.concurrency", 8)?
        .set_default("output_dir", ".")?
        .add_source(file)
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .set_override_option("portal.digest", overrides.digest)?
        .set_override_option("region.fin_year", overrides.fin_year)?
        .set_override_option("region.council", overrides.council)?
        .set_override_option("region.council_code", overrides.council_code)?
        .set_override_option("portal.concurrency", overrides.concurrency.map(|c| c as u64))?
        .set_override_option("portal.timeout_secs", overrides.timeout_secs)?
        .set_override_option(
            "output_dir",
            overrides.output_dir.map(|p| p.to_string_lossy().into_owned()),
        )?
        .build()
        .context("Failed to assemble configuration")?;

    let settings: Settings = settings
        .try_deserialize()
        .context("Configuration is incomplete (see [region] in muster.toml)")?;

    if settings.portal.concurrency == 0 {
        anyhow::bail!("portal.concurrency must be at least 1");
    }
    Ok(settings)
}

/// Attendance date as the portal's selection form spells it (`dd/mm/yyyy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceDate(NaiveDate);

impl AttendanceDate {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        NaiveDate::parse_from_str(raw, "%d/%m/%Y")
            .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
            .map(Self)
            .with_context(|| format!("Attendance date {raw:?} is not dd/mm/yyyy"))
    }

    pub fn portal_value(&self) -> String {
        self.0.format("%d/%m/%Y").to_string()
    }

    /// Filesystem-safe form used in artifact names.
    pub fn file_stem(&self) -> String {
        self.0.format("%d_%m_%Y").to_string()
    }
}

impl std::str::FromStr for AttendanceDate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
