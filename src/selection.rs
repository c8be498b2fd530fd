use crate::model::MusterRollReference;
use crate::navigator::MusterListing;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    /// Keep rows whose work-code cell contains this text.
    ByWorkCode(String),
}

impl Selection {
    pub fn from_work_code(work_code: Option<String>) -> Self {
        match work_code.map(|w| w.trim().to_string()) {
            Some(w) if !w.is_empty() => Selection::ByWorkCode(w),
            _ => Selection::All,
        }
    }
}

/// Listing rows to fetch, in listing order. Rows without a link in the roll
/// number column have nothing to fetch and are dropped.
pub fn select(listing: &MusterListing, selection: &Selection) -> Vec<MusterRollReference> {
    listing
        .table
        .data_rows()
        .filter(|row| row.cells.len() > listing.roll_no_col)
        .filter(|row| match selection {
            Selection::All => true,
            Selection::ByWorkCode(code) => row.text(listing.work_code_col).contains(code.as_str()),
        })
        .filter_map(|row| {
            let roll = row.cell(listing.roll_no_col)?;
            let href = roll.first_link()?;
            Some(MusterRollReference {
                serial: row.text(0).to_string(),
                work_code: row.text(listing.work_code_col).to_string(),
                roll_number: roll.text.clone(),
                detail_href: href.to_string(),
            })
        })
        .collect()
}
