pub mod detail;
pub mod form;
pub mod links;
pub mod table;
pub mod text;

pub use detail::{parse_detail, AttendanceRow, DetailPage};
pub use form::LandingForm;
pub use links::{find_col_idx, resolve_council_link, resolve_link, NavigationLink};
pub use table::{ListingTable, TableLocator};
