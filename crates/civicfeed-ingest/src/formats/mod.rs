//! Feed payload parsers.
//!
//! Every parser is total: malformed or unrecognized input degrades to an
//! empty (or partial) row list, never an error.

mod html_table;
mod json;
mod kml;

use civicfeed_core::FeedFormat;

use crate::types::SourceRow;

/// How many leading bytes are inspected for markup markers.
const SNIFF_WINDOW: usize = 1024;

/// Identify a payload by content. `None` when nothing matches.
///
/// XML wins first (an XML document whose root is `html` counts as HTML),
/// then anything that parses as JSON, then a bare `<html`/`<table` marker.
#[must_use]
pub fn sniff_format(bytes: &[u8]) -> Option<FeedFormat> {
    let text = String::from_utf8_lossy(bytes);
    let body = text.trim_start_matches('\u{feff}').trim_start();
    let head: String = body
        .chars()
        .take(SNIFF_WINDOW)
        .collect::<String>()
        .to_ascii_lowercase();

    if head.starts_with("<?xml") || head.contains("<kml") {
        if head.contains("<kml") {
            return Some(FeedFormat::Kml);
        }
        if head.contains("<html") || head.contains("<!doctype html") {
            return Some(FeedFormat::Html);
        }
        return Some(FeedFormat::Kml);
    }

    if (body.starts_with('{') || body.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(body).is_ok()
    {
        return Some(FeedFormat::Json);
    }

    if head.contains("<html") || head.contains("<table") || head.contains("<!doctype html") {
        return Some(FeedFormat::Html);
    }
    None
}

/// Parse a raw feed body into rows.
///
/// `hint` is consulted only when [`sniff_format`] cannot identify the
/// payload.
#[must_use]
pub fn parse_feed(bytes: &[u8], hint: Option<FeedFormat>) -> Vec<SourceRow> {
    let sniffed = sniff_format(bytes);
    let Some(format) = sniffed.or(hint) else {
        tracing::debug!(len = bytes.len(), "feed format not recognized");
        return Vec::new();
    };
    tracing::debug!(%format, sniffed = sniffed.is_some(), "feed format detected");

    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');
    match format {
        FeedFormat::Kml => kml::parse_kml(text),
        FeedFormat::Json => json::parse_json(text),
        FeedFormat::Html => html_table::parse_html_table(text),
    }
}

#[cfg(test)]
#[path = "formats_test.rs"]
mod tests;
