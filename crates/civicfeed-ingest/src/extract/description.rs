//! Free-text description parsing for KML placemarks.
//!
//! Dispatch feeds publish one sentence per incident, e.g.
//! `Theft at 123 Main St, Sunday, August 17, 2025 4:20 PM [Portland Police #PP1]`.
//! The address, the bracketed incident id and the long-form timestamp are
//! recovered separately.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::html::{collapse_whitespace, strip_html};

const AT_TOKEN: &str = " at ";

/// Offsets tried in order when resolving a Pacific wall-clock timestamp:
/// daylight time first, then standard time.
const PACIFIC_OFFSETS: &[&str] = &["-0700", "-0800"];

static WEEKDAY_STAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday),?\s+(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2}),?\s+(\d{4}),?\s+(\d{1,2}):(\d{2})\s*([ap])\.?\s*m\.?",
    )
    .expect("valid regex")
});
static INCIDENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]\[]*#\s*([A-Za-z0-9][A-Za-z0-9_-]*)\s*\]").expect("valid regex")
});
static SPACE_BEFORE_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([,;])").expect("valid regex"));
static REPEATED_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([,;])(?:\s*[,;])+").expect("valid regex"));

/// What the description sub-parser recovers from one placemark.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDescription {
    pub clean_address: Option<String>,
    pub incident_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Parse a (possibly HTML) placemark description.
#[must_use]
pub fn parse_description(description: &str) -> ParsedDescription {
    let text = strip_html(description);

    let mut incident_id = None;
    let clean_address = text.find(AT_TOKEN).and_then(|pos| {
        let after = &text[pos + AT_TOKEN.len()..];
        let line = after.lines().next().unwrap_or_default();
        let without_stamp = WEEKDAY_STAMP_RE.replace_all(line, "");
        let without_id = INCIDENT_ID_RE.replace_all(&without_stamp, |caps: &regex::Captures<'_>| {
            if incident_id.is_none() {
                incident_id = Some(caps[1].to_string());
            }
            String::new()
        });
        let cleaned = collapse_punctuation(&without_id);
        (!cleaned.is_empty()).then_some(cleaned)
    });

    let incident_id = incident_id.or_else(|| {
        INCIDENT_ID_RE
            .captures(&text)
            .map(|caps| caps[1].to_string())
    });

    ParsedDescription {
        clean_address,
        incident_id,
        timestamp: find_pacific_timestamp(&text),
    }
}

/// Incident name from a placemark title: the text before the first `" at "`.
#[must_use]
pub fn name_from_title(title: &str) -> String {
    let trimmed = title.trim();
    trimmed
        .find(AT_TOKEN)
        .map_or(trimmed, |pos| trimmed[..pos].trim())
        .to_string()
}

/// Scan text for a weekday-long-date-time stamp and resolve it as Pacific
/// wall-clock time.
#[must_use]
pub fn find_pacific_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let caps = WEEKDAY_STAMP_RE.captures(text)?;
    let meridiem = if caps[6].eq_ignore_ascii_case("p") {
        "PM"
    } else {
        "AM"
    };
    let local = format!(
        "{} {}, {} {}:{} {meridiem}",
        &caps[1], &caps[2], &caps[3], &caps[4], &caps[5]
    );

    PACIFIC_OFFSETS.iter().find_map(|offset| {
        DateTime::parse_from_str(&format!("{local} {offset}"), "%B %d, %Y %I:%M %p %z")
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

fn collapse_punctuation(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    let tightened = SPACE_BEFORE_PUNCT_RE.replace_all(&collapsed, "$1");
    let deduped = REPEATED_PUNCT_RE.replace_all(&tightened, "$1");
    deduped
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '-'))
        .to_string()
}
