use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::config::AttendanceDate;
use crate::error::{Hop, NavigationError};

static INPUT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("input").unwrap());
static SELECT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("select").unwrap());
static OPTION_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());

pub const VIEWSTATE: &str = "__VIEWSTATE";
pub const VIEWSTATE_GENERATOR: &str = "__VIEWSTATEGENERATOR";
pub const EVENT_VALIDATION: &str = "__EVENTVALIDATION";

pub const FIELD_STATE: &str = "ctl00$ContentPlaceHolder1$ddlstate";
pub const FIELD_ATTENDANCE: &str = "ctl00$ContentPlaceHolder1$ddl_attendance";
pub const FIELD_SUBMIT: &str = "ctl00$ContentPlaceHolder1$btn_showreport";
const SUBMIT_LABEL: &str = "Show Attendance";

/// Postback state and choices scraped from the landing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingForm {
    pub viewstate: String,
    pub viewstate_generator: String,
    pub event_validation: String,
    pub date_options: Vec<String>,
}

impl LandingForm {
    pub fn parse(html: &str) -> Result<Self, NavigationError> {
        let doc = Html::parse_document(html);

        let token = |field: &'static str| {
            doc.select(&INPUT_SEL)
                .find(|i| i.value().id() == Some(field) || i.value().attr("name") == Some(field))
                .and_then(|i| i.value().attr("value"))
                .map(str::to_string)
                .ok_or(NavigationError::MissingFormToken {
                    hop: Hop::SelectFinancialYear,
                    field,
                })
        };

        let date_options = doc
            .select(&SELECT_SEL)
            .find(|s| s.value().attr("name") == Some(FIELD_ATTENDANCE))
            .map(|s| {
                s.select(&OPTION_SEL)
                    .filter_map(|o| o.value().attr("value"))
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            viewstate: token(VIEWSTATE)?,
            viewstate_generator: token(VIEWSTATE_GENERATOR)?,
            event_validation: token(EVENT_VALIDATION)?,
            date_options,
        })
    }

    /// The option value, as the portal spells it, for `date`. Options are
    /// compared as dates so `8/7/2025` matches `08/07/2025`. An empty option
    /// list means the portal did not restrict dates.
    pub fn option_for(&self, date: &AttendanceDate) -> Option<String> {
        if self.date_options.is_empty() {
            return Some(date.portal_value());
        }
        self.date_options
            .iter()
            .find(|o| AttendanceDate::parse(o).is_ok_and(|d| d == *date))
            .cloned()
    }

    /// Body of the "Show Attendance" postback.
    pub fn submission(&self, state_code: &str, attendance_date: &str) -> Vec<(String, String)> {
        [
            (VIEWSTATE, self.viewstate.as_str()),
            (VIEWSTATE_GENERATOR, self.viewstate_generator.as_str()),
            (EVENT_VALIDATION, self.event_validation.as_str()),
            (FIELD_STATE, state_code),
            (FIELD_ATTENDANCE, attendance_date),
            (FIELD_SUBMIT, SUBMIT_LABEL),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }
}
