//! HTML table scraper for dispatch pages that publish a plain table.

use std::sync::LazyLock;

use regex::Regex;

use crate::html::{collapse_whitespace, strip_html};
use crate::types::SourceRow;

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>").expect("valid regex"));
static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("valid regex"));
static CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<t([hd])\b[^>]*>(.*?)</t[hd]\s*>").expect("valid regex")
});

static ADDRESS_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)address|location").expect("valid regex"));
static RECEIVED_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)received|time|updated").expect("valid regex"));
static PROBLEM_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)problem|type|incident").expect("valid regex"));

static MAP_QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&](?:amp;)?q=(-?\d{1,3}(?:\.\d+)?)\s*(?:,|%2C)\s*(-?\d{1,3}(?:\.\d+)?)")
        .expect("valid regex")
});
static MAP_PIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!3d(-?\d{1,3}(?:\.\d+)?)!4d(-?\d{1,3}(?:\.\d+)?)").expect("valid regex")
});

struct Cell<'a> {
    is_header: bool,
    raw: &'a str,
}

fn cells(row_html: &str) -> Vec<Cell<'_>> {
    CELL_RE
        .captures_iter(row_html)
        .filter_map(|caps| {
            let tag = caps.get(1)?;
            let raw = caps.get(2)?;
            Some(Cell {
                is_header: tag.as_str().eq_ignore_ascii_case("h"),
                raw: raw.as_str(),
            })
        })
        .collect()
}

fn cell_text(raw: &str) -> String {
    collapse_whitespace(&strip_html(raw))
}

/// Row key for a header cell: one of the well-known keys when the header
/// matches, otherwise the header text itself. The first matching class wins,
/// checked as problem, then address, then received.
fn classify_header(text: &str, index: usize) -> String {
    if PROBLEM_HEADER_RE.is_match(text) {
        "problem".to_string()
    } else if ADDRESS_HEADER_RE.is_match(text) {
        "address".to_string()
    } else if RECEIVED_HEADER_RE.is_match(text) {
        "received".to_string()
    } else if text.is_empty() {
        format!("column_{index}")
    } else {
        text.to_string()
    }
}

/// Coordinates from a Google Maps style link anywhere in the row.
fn map_link_coordinates(row_html: &str) -> Option<(f64, f64)> {
    let caps = MAP_QUERY_RE
        .captures(row_html)
        .or_else(|| MAP_PIN_RE.captures(row_html))?;
    let lat = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let lon = caps.get(2)?.as_str().parse::<f64>().ok()?;
    Some((lat, lon))
}

/// Parse the first `<table>` of an HTML page into rows keyed by header.
pub(crate) fn parse_html_table(html: &str) -> Vec<SourceRow> {
    let Some(table) = TABLE_RE.captures(html).and_then(|caps| caps.get(1)) else {
        return Vec::new();
    };

    let mut headers: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for row_caps in ROW_RE.captures_iter(table.as_str()) {
        let Some(row_html) = row_caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let row_cells = cells(row_html);
        if row_cells.is_empty() {
            continue;
        }

        if headers.is_none() {
            headers = Some(
                row_cells
                    .iter()
                    .enumerate()
                    .map(|(i, cell)| classify_header(&cell_text(cell.raw), i))
                    .collect(),
            );
            continue;
        }
        let Some(keys) = headers.as_ref() else {
            continue;
        };
        if row_cells.iter().all(|cell| cell.is_header) {
            continue;
        }

        let mut row = SourceRow::new();
        for (i, cell) in row_cells.iter().enumerate() {
            let text = cell_text(cell.raw);
            if text.is_empty() {
                continue;
            }
            let key = keys
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("column_{i}"));
            if row.get(&key).is_none() {
                row.insert(key, text);
            }
        }
        if let Some((lat, lon)) = map_link_coordinates(row_html) {
            row.insert("lat", lat);
            row.insert("lon", lon);
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }

    rows
}
