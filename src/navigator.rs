use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use url::Url;

use crate::client::PageSource;
use crate::config::{AttendanceDate, RegionPath, Settings};
use crate::error::{Hop, NavigationError};
use crate::parser::{find_col_idx, resolve_council_link, resolve_link, LandingForm, ListingTable, NavigationLink, TableLocator};

const GRID_ID: &str = "grdTable";
const REPEATER_ID: &str = "RepPr1";
/// Unit names sit in the second column of every listing.
const LABEL_COL: usize = 1;

const WORK_CODE_HEADER: &str = "work code";
const ROLL_NO_HEADER: &str = "mustroll no";

/// Link-follow hops, in order, after the landing form is submitted.
const LINK_HOPS: [Hop; 4] = [Hop::SelectState, Hop::SelectDistrict, Hop::SelectBlock, Hop::SelectCouncil];

/// The final listing page with its required columns located.
#[derive(Debug, Clone)]
pub struct MusterListing {
    pub url: Url,
    pub table: ListingTable,
    pub work_code_col: usize,
    pub roll_no_col: usize,
}

pub struct Navigator {
    source: Arc<dyn PageSource>,
    landing_url: String,
    digest: String,
    region: RegionPath,
}

impl Navigator {
    pub fn new(source: Arc<dyn PageSource>, settings: &Settings) -> Self {
        Self {
            source,
            landing_url: settings.portal.landing_url.clone(),
            digest: settings.portal.digest.clone(),
            region: settings.region.clone(),
        }
    }

    pub fn landing_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.landing_url)
            .with_context(|| format!("Invalid landing URL {:?}", self.landing_url))?;
        url.query_pairs_mut()
            .append_pair("fin_year", &self.region.fin_year)
            .append_pair("Digest", &self.digest);
        Ok(url)
    }

    /// Fetch the landing page and read its postback tokens and date options.
    pub async fn landing_form(&self) -> Result<(Url, LandingForm)> {
        let url = self.landing_url()?;
        info!("Fetching landing page: {}", url);
        let body = self
            .source
            .get_text(&url)
            .await
            .with_context(|| format!("{}: request to {} failed", Hop::SelectFinancialYear, url))?;
        let form = LandingForm::parse(&body)?;
        Ok((url, form))
    }

    /// Walk landing form → state → district → block → council → muster listing.
    pub async fn navigate(&self, date: &AttendanceDate) -> Result<MusterListing> {
        let (landing, form) = self.landing_form().await?;

        let Some(date_value) = form.option_for(date) else {
            return Err(NavigationError::DateNotOffered {
                hop: Hop::SelectFinancialYear,
                date: date.portal_value(),
                available: form.date_options,
            }
            .into());
        };

        let submission = form.submission(&self.region.state_code, &date_value);
        let mut body = self
            .source
            .post_form(&landing, &submission, &landing)
            .await
            .with_context(|| format!("{}: form submission failed", Hop::SelectFinancialYear))?;
        let mut url = landing;

        for hop in LINK_HOPS {
            let link = self.follow(hop, &body, &url)?;
            url = url
                .join(&link.href)
                .with_context(|| format!("{hop}: bad link {:?}", link.href))?;
            info!(hop = %hop, label = %link.label, "Following {}", url);
            body = self
                .source
                .get_text(&url)
                .await
                .with_context(|| format!("{hop}: request to {url} failed"))?;
        }

        let listing = read_listing(&body, url)?;
        info!(
            rows = listing.table.body().len(),
            "Muster roll listing at {}", listing.url
        );
        Ok(listing)
    }

    fn follow(&self, hop: Hop, body: &str, url: &Url) -> Result<NavigationLink, NavigationError> {
        let table = ListingTable::extract(body, locator(hop)).ok_or_else(|| NavigationError::MissingTable {
            hop,
            url: url.to_string(),
        })?;
        let target = self.target(hop)?;
        debug!(hop = %hop, rows = table.rows.len(), name = target, "Resolving link");

        let link = match hop {
            Hop::SelectCouncil => resolve_council_link(&table, target),
            _ => resolve_link(&table, LABEL_COL, target),
        };
        link.ok_or_else(|| NavigationError::TargetNotFound {
            hop,
            target: target.to_string(),
        })
    }

    fn target(&self, hop: Hop) -> Result<&str, NavigationError> {
        let target = match hop {
            Hop::SelectState => Some(self.region.state_name.as_str()),
            Hop::SelectDistrict => Some(self.region.district.as_str()),
            Hop::SelectBlock => Some(self.region.block.as_str()),
            Hop::SelectCouncil => self.region.council.as_deref(),
            Hop::SelectFinancialYear | Hop::ListMusterRolls => None,
        };
        target.filter(|t| !t.trim().is_empty()).ok_or(NavigationError::TargetNotFound {
            hop,
            target: String::new(),
        })
    }
}

/// Grid pages carry `grdTable`; repeater pages wrap an anonymous table in `RepPr1`.
fn locator(hop: Hop) -> TableLocator<'static> {
    match hop {
        Hop::SelectCouncil | Hop::ListMusterRolls => TableLocator::InContainer(REPEATER_ID),
        _ => TableLocator::IdOrContainer {
            id: GRID_ID,
            container: REPEATER_ID,
        },
    }
}

/// Parse the muster listing and validate that both required columns exist.
pub fn read_listing(body: &str, url: Url) -> Result<MusterListing, NavigationError> {
    let hop = Hop::ListMusterRolls;
    let table = ListingTable::extract(body, locator(hop)).ok_or_else(|| NavigationError::MissingTable {
        hop,
        url: url.to_string(),
    })?;

    let headers = table.header_texts();
    let work_code_col = find_col_idx(&headers, WORK_CODE_HEADER);
    let roll_no_col = find_col_idx(&headers, ROLL_NO_HEADER);

    match (work_code_col, roll_no_col) {
        (Some(work_code_col), Some(roll_no_col)) => Ok(MusterListing {
            url,
            table,
            work_code_col,
            roll_no_col,
        }),
        _ => {
            let missing = [(WORK_CODE_HEADER, work_code_col), (ROLL_NO_HEADER, roll_no_col)]
                .into_iter()
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| name)
                .collect();
            Err(NavigationError::MissingColumns {
                hop,
                missing,
                found: headers,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn date() -> AttendanceDate {
        AttendanceDate::parse("18/07/2025").unwrap()
    }

    async fn navigate(source: FakeSource, settings: &Settings) -> (Arc<FakeSource>, Result<MusterListing>) {
        let source = Arc::new(source);
        let nav = Navigator::new(source.clone(), settings);
        let result = nav.navigate(&date()).await;
        (source, result)
    }

    fn nav_error(result: Result<MusterListing>) -> NavigationError {
        result
            .unwrap_err()
            .downcast::<NavigationError>()
            .expect("navigation error")
    }

    #[tokio::test]
    async fn walks_full_chain() {
        let (source, result) = navigate(portal(), &settings()).await;
        let listing = result.unwrap();
        assert_eq!(listing.url.as_str(), COUNCIL_URL);
        assert_eq!(listing.work_code_col, 1);
        assert_eq!(listing.roll_no_col, 3);
        assert_eq!(listing.table.body().len(), 3);

        assert_eq!(
            source.requests(),
            vec![LANDING, LANDING, STATE_URL, DISTRICT_URL, BLOCK_URL, COUNCIL_URL]
        );
        let forms = source.posted_forms.lock().unwrap();
        assert!(forms[0].contains(&("__VIEWSTATE".to_string(), "VS123".to_string())));
        assert!(forms[0].contains(&(crate::parser::form::FIELD_ATTENDANCE.to_string(), "18/07/2025".to_string())));
    }

    #[tokio::test]
    async fn unknown_council_names_hop() {
        let mut s = settings();
        s.region.council = Some("NOWHERE".into());
        let (_, result) = navigate(portal(), &s).await;
        let err = nav_error(result);
        assert_eq!(
            err,
            NavigationError::TargetNotFound {
                hop: Hop::SelectCouncil,
                target: "NOWHERE".into()
            }
        );
    }

    #[tokio::test]
    async fn council_without_rolls_is_not_found() {
        let mut s = settings();
        s.region.council = Some("BAGEWADI".into());
        let (_, result) = navigate(portal(), &s).await;
        assert_eq!(nav_error(result).hop(), Hop::SelectCouncil);
    }

    #[tokio::test]
    async fn missing_table_on_district_page() {
        let source = portal().page(STATE_URL, "<html><body>Service unavailable</body></html>");
        let (_, result) = navigate(source, &settings()).await;
        let err = nav_error(result);
        assert!(matches!(err, NavigationError::MissingTable { hop: Hop::SelectDistrict, .. }));
        assert!(err.to_string().contains("missing table"));
    }

    #[tokio::test]
    async fn missing_listing_columns() {
        let listing = r#"<div id="RepPr1"><table>
            <tr><td>S.No.</td><td>Work Code</td><td>Workers</td></tr>
            <tr><td>1</td><td>X</td><td>2</td></tr></table></div>"#;
        let source = portal().page(COUNCIL_URL, listing);
        let (_, result) = navigate(source, &settings()).await;
        match nav_error(result) {
            NavigationError::MissingColumns { hop, missing, found } => {
                assert_eq!(hop, Hop::ListMusterRolls);
                assert_eq!(missing, vec![ROLL_NO_HEADER]);
                assert_eq!(found, vec!["S.No.", "Work Code", "Workers"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn date_not_offered() {
        let source = Arc::new(portal());
        let nav = Navigator::new(source.clone(), &settings());
        let err = nav
            .navigate(&AttendanceDate::parse("01/01/2025").unwrap())
            .await
            .unwrap_err()
            .downcast::<NavigationError>()
            .unwrap();
        assert!(matches!(err, NavigationError::DateNotOffered { .. }));
        // Nothing was posted.
        assert!(source.posted_forms.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn network_failure_is_contextual() {
        let source = FakeSource::new().page(LANDING, fixture("landing"));
        let (_, result) = navigate(source, &settings()).await;
        let err = result.unwrap_err();
        assert!(err.downcast_ref::<NavigationError>().is_none());
        assert!(format!("{err:#}").contains("financial year selection"));
    }
}
