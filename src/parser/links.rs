use super::table::ListingTable;
use super::text::normalize_label;

/// Column holding the muster-roll count link on the council listing.
const COUNCIL_LINK_COL: usize = 3;

/// An edge discovered in a listing table. `href` is relative to the page it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationLink {
    pub label: String,
    pub href: String,
}

/// First row (top to bottom, header excluded) whose `match_col` text equals
/// `target` ignoring case; returns the first anchor in that cell.
pub fn resolve_link(table: &ListingTable, match_col: usize, target: &str) -> Option<NavigationLink> {
    let target = target.trim().to_uppercase();
    table.body().iter().find_map(|row| {
        let cell = row.cell(match_col)?;
        if cell.text.trim().to_uppercase() != target {
            return None;
        }
        cell.first_link().map(|href| NavigationLink {
            label: cell.text.clone(),
            href: href.to_string(),
        })
    })
}

/// Council rows: serial in column 0, name in column 1, and the link taken
/// from column 3. Rows failing either guard are skipped even on a name match.
pub fn resolve_council_link(table: &ListingTable, council: &str) -> Option<NavigationLink> {
    let council = council.trim().to_uppercase();
    table.body().iter().find_map(|row| {
        if row.cells.len() <= COUNCIL_LINK_COL || !row.has_serial() {
            return None;
        }
        if row.text(1).to_uppercase() != council {
            return None;
        }
        row.cell(COUNCIL_LINK_COL)?
            .first_link()
            .map(|href| NavigationLink {
                label: row.text(1).to_string(),
                href: href.to_string(),
            })
    })
}

/// Index of the first header whose normalized text contains the normalized search term.
pub fn find_col_idx<S: AsRef<str>>(headers: &[S], search: &str) -> Option<usize> {
    let needle = normalize_label(search);
    headers
        .iter()
        .position(|h| normalize_label(h.as_ref()).contains(&needle))
}
