use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_ALNUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]").unwrap());

/// Visible text of an element, non-breaking spaces folded and whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    clean(&el.text().collect::<String>())
}

pub fn clean(raw: &str) -> String {
    let folded = raw.replace('\u{a0}', " ");
    WS_RE.replace_all(folded.trim(), " ").into_owned()
}

/// Lowercase ASCII alphanumerics only: `"Mustroll No."` → `"mustrollno"`.
pub fn normalize_label(raw: &str) -> String {
    NON_ALNUM_RE
        .replace_all(&raw.to_lowercase(), "")
        .into_owned()
}

/// True for a positive integer serial number cell.
pub fn is_serial(raw: &str) -> bool {
    let raw = raw.trim();
    !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) && raw.parse::<u64>().is_ok_and(|n| n > 0)
}
