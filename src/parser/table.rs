use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::text::{element_text, is_serial};

static TABLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static DIV_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div").unwrap());
static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
pub(crate) static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// How to find the data table on a page. Each variant encodes one assumption
/// about the portal's markup, so a layout change touches one strategy.
#[derive(Debug, Clone, Copy)]
pub enum TableLocator<'a> {
    /// `<table id=..>`. The state/district/block grids carry an id.
    ById(&'a str),
    /// First `<table>` inside `<div id=..>`. Council and muster listings are
    /// wrapped in a repeater container with no table id.
    InContainer(&'a str),
    /// Try the id, then the container.
    IdOrContainer { id: &'a str, container: &'a str },
    /// Last `<table>` in document order. Detail pages put attendance last.
    LastOnPage,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCell {
    pub text: String,
    /// hrefs of anchors inside the cell, in document order.
    pub links: Vec<String>,
}

impl TableCell {
    pub fn first_link(&self) -> Option<&str> {
        self.links.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

impl TableRow {
    pub fn cell(&self, idx: usize) -> Option<&TableCell> {
        self.cells.get(idx)
    }

    pub fn text(&self, idx: usize) -> &str {
        self.cells.get(idx).map(|c| c.text.as_str()).unwrap_or("")
    }

    pub fn has_serial(&self) -> bool {
        self.cells.first().is_some_and(|c| is_serial(&c.text))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingTable {
    pub rows: Vec<TableRow>,
}

impl ListingTable {
    /// Parse `html` and extract the table `locator` points at. `None` means
    /// the page has no data, which callers decide how to treat.
    pub fn extract(html: &str, locator: TableLocator<'_>) -> Option<Self> {
        let doc = Html::parse_document(html);
        locate(&doc, locator).map(read_table)
    }

    pub fn header(&self) -> Option<&TableRow> {
        self.rows.first()
    }

    pub fn header_texts(&self) -> Vec<String> {
        self.header()
            .map(|r| r.cells.iter().map(|c| c.text.clone()).collect())
            .unwrap_or_default()
    }

    /// Rows after the header, header and footer noise included.
    pub fn body(&self) -> &[TableRow] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Body rows whose first cell is a positive serial number.
    pub fn data_rows(&self) -> impl Iterator<Item = &TableRow> {
        self.body().iter().filter(|r| r.has_serial())
    }
}

pub(crate) fn locate<'a>(doc: &'a Html, locator: TableLocator<'_>) -> Option<ElementRef<'a>> {
    match locator {
        TableLocator::ById(id) => doc
            .select(&TABLE_SEL)
            .find(|t| t.value().id() == Some(id)),
        TableLocator::InContainer(container) => doc
            .select(&DIV_SEL)
            .find(|d| d.value().id() == Some(container))
            .and_then(|d| d.select(&TABLE_SEL).next()),
        TableLocator::IdOrContainer { id, container } => locate(doc, TableLocator::ById(id))
            .or_else(|| locate(doc, TableLocator::InContainer(container))),
        TableLocator::LastOnPage => doc.select(&TABLE_SEL).last(),
    }
}

/// Rows of `table` itself; rows of tables nested in its cells are skipped.
pub(crate) fn own_rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    let table_id = table.id();
    table.select(&TR_SEL).filter(move |tr| {
        tr.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().name() == "table")
            .is_some_and(|owner| owner.id() == table_id)
    })
}

/// Direct `td`/`th` children of a row.
pub(crate) fn row_cells<'a>(tr: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    tr.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
}

fn read_table(table: ElementRef<'_>) -> ListingTable {
    let rows = own_rows(table)
        .map(|tr| TableRow {
            cells: row_cells(tr)
                .map(|cell| TableCell {
                    text: element_text(cell),
                    links: cell
                        .select(&ANCHOR_SEL)
                        .filter_map(|a| a.value().attr("href"))
                        .map(|h| h.trim().to_string())
                        .filter(|h| !h.is_empty())
                        .collect(),
                })
                .collect(),
        })
        .collect();
    ListingTable { rows }
}
