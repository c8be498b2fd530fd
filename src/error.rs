use std::fmt;

use thiserror::Error;

/// A hop in the state → district → block → council → listing chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    SelectFinancialYear,
    SelectState,
    SelectDistrict,
    SelectBlock,
    SelectCouncil,
    ListMusterRolls,
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hop::SelectFinancialYear => "financial year selection",
            Hop::SelectState => "state listing",
            Hop::SelectDistrict => "district listing",
            Hop::SelectBlock => "block listing",
            Hop::SelectCouncil => "council listing",
            Hop::ListMusterRolls => "muster roll listing",
        };
        f.write_str(name)
    }
}

/// Terminal navigation failure. Any of these aborts the run before output.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    #[error("{hop}: missing table on {url}")]
    MissingTable { hop: Hop, url: String },

    #[error("{hop}: target not found: no link for {target:?}")]
    TargetNotFound { hop: Hop, target: String },

    #[error("{hop}: missing columns {missing:?} (header was {found:?})")]
    MissingColumns {
        hop: Hop,
        missing: Vec<&'static str>,
        found: Vec<String>,
    },

    #[error("{hop}: landing form has no {field} field")]
    MissingFormToken { hop: Hop, field: &'static str },

    #[error("{hop}: attendance date {date} is not offered (available: {available:?})")]
    DateNotOffered {
        hop: Hop,
        date: String,
        available: Vec<String>,
    },
}

impl NavigationError {
    pub fn hop(&self) -> Hop {
        match self {
            NavigationError::MissingTable { hop, .. }
            | NavigationError::TargetNotFound { hop, .. }
            | NavigationError::MissingColumns { hop, .. }
            | NavigationError::MissingFormToken { hop, .. }
            | NavigationError::DateNotOffered { hop, .. } => *hop,
        }
    }
}
