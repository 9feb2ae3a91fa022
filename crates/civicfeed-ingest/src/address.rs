//! Address canonicalization: geocode query keys and display addresses.
//!
//! Two different strings come out of one raw street:
//! - the [`GeocodeQuery`] key (lower-cased, whitespace-collapsed) used for
//!   dedup and caching;
//! - the display address shown to clients, built by the source's
//!   [`DisplayPolicy`].
//!
//! The geocoder's own formatted label never becomes the display address.

use civicfeed_core::{DisplayPolicy, SourceConfig};

use crate::html::collapse_whitespace;
use crate::types::GeocodeQuery;

/// Compass quadrants kept upper-case when title-casing (`SE Division St`).
const QUADRANTS: &[&str] = &["NE", "NW", "SE", "SW"];

/// Trailing words stripped from a region label before matching it against
/// the directional list (`EAST PRECINCT` → `EAST`).
const LABEL_SUFFIXES: &[&str] = &["PRECINCT", "DISTRICT", "SECTOR", "AREA"];

/// Everything a display policy needs to know about a source.
#[derive(Debug, Clone)]
pub struct DisplayContext<'a> {
    pub policy: DisplayPolicy,
    pub city: &'a str,
    /// City-level fallback, `"<City>, <ABBR>"`.
    pub city_label: String,
    pub region: &'a str,
    pub region_abbr: &'a str,
    pub directional_labels: &'a [String],
}

impl<'a> DisplayContext<'a> {
    #[must_use]
    pub fn from_source(source: &'a SourceConfig) -> Self {
        Self {
            policy: source.display_policy,
            city: &source.city,
            city_label: source.city_label(),
            region: &source.region,
            region_abbr: &source.region_abbr,
            directional_labels: &source.directional_labels,
        }
    }
}

/// Normalize an address into its dedup/cache key: trim, collapse internal
/// whitespace, lower-case. Idempotent.
#[must_use]
pub fn normalize_query(address: &str) -> GeocodeQuery {
    GeocodeQuery(collapse_whitespace(address).to_lowercase())
}

/// Title-case a street or intersection word by word.
///
/// Intersections (`A ST/B AVE`, `A ST \ B AVE`) are split on `/` or `\`,
/// each side title-cased independently and rejoined with `" / "`.
#[must_use]
pub fn title_case_street(street: &str) -> String {
    title_case_keeping(street, &[])
}

fn title_case_keeping(street: &str, keep_upper: &[&str]) -> String {
    street
        .split(['/', '\\'])
        .map(str::trim)
        .filter(|side| !side.is_empty())
        .map(|side| {
            side.split_whitespace()
                .map(|word| title_case_word(word, keep_upper))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

fn title_case_word(word: &str, keep_upper: &[&str]) -> String {
    let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
    let is_kept = |candidate: &&str| bare.eq_ignore_ascii_case(candidate);
    if !bare.is_empty() && (QUADRANTS.iter().any(is_kept) || keep_upper.iter().any(is_kept)) {
        return word.to_uppercase();
    }

    let mut out = String::with_capacity(word.len());
    let mut capitalize_next = true;
    for c in word.chars() {
        if c.is_alphabetic() {
            if capitalize_next {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            capitalize_next = false;
        } else {
            out.push(c);
            capitalize_next = matches!(c, '-' | '(' | '"');
        }
    }
    out
}

/// Resolve the place name shown after the street for directional sources.
///
/// Directional or precinct labels (`EAST`, `DOWNTOWN`, `NORTH PRECINCT`) are
/// replaced by the source's city; real place names are title-cased.
#[must_use]
pub fn resolve_place_label(label: Option<&str>, ctx: &DisplayContext<'_>) -> String {
    let Some(label) = label.map(collapse_whitespace).filter(|l| !l.is_empty()) else {
        return ctx.city.to_string();
    };

    let upper = label.to_uppercase();
    let core = LABEL_SUFFIXES
        .iter()
        .find_map(|suffix| {
            upper
                .strip_suffix(suffix)
                .map(str::trim_end)
                .filter(|rest| !rest.is_empty())
        })
        .unwrap_or(upper.as_str());

    let is_directional = ctx
        .directional_labels
        .iter()
        .any(|d| d.trim().eq_ignore_ascii_case(core) || d.trim().eq_ignore_ascii_case(&upper));

    if is_directional {
        ctx.city.to_string()
    } else {
        title_case_street(&label)
    }
}

/// Build the display address for one record. Never empty: without a street
/// it degrades to `"<City>, <Abbr>"`.
#[must_use]
pub fn canonicalize_display(
    street: Option<&str>,
    region_label: Option<&str>,
    ctx: &DisplayContext<'_>,
) -> String {
    let Some(street) = street.map(collapse_whitespace).filter(|s| !s.is_empty()) else {
        return ctx.city_label.clone();
    };

    match ctx.policy {
        DisplayPolicy::Directional => {
            let titled = title_case_street(&street);
            if titled.is_empty() {
                return ctx.city_label.clone();
            }
            let place = resolve_place_label(region_label, ctx);
            format!("{titled}, {place}, {}", ctx.region_abbr)
        }
        DisplayPolicy::FixedSuffix => {
            let titled = title_case_keeping(&street, &[ctx.region_abbr]);
            if titled.is_empty() {
                ctx.city_label.clone()
            } else if mentions_locality(&street, ctx) {
                titled
            } else {
                format!("{titled}, {}", ctx.city_label)
            }
        }
    }
}

/// Whether an address already names the source's city or region.
///
/// City and full region name match as case-insensitive substrings; the
/// abbreviation must match a whole word so `OR` does not match `ORCHARD`.
fn mentions_locality(address: &str, ctx: &DisplayContext<'_>) -> bool {
    let lower = address.to_lowercase();
    let contains = |needle: &str| {
        let needle = needle.trim().to_lowercase();
        !needle.is_empty() && lower.contains(&needle)
    };
    let abbr = ctx.region_abbr.trim();
    contains(ctx.city)
        || contains(ctx.region)
        || (!abbr.is_empty()
            && address
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| word.eq_ignore_ascii_case(abbr)))
}

#[cfg(test)]
#[path = "address_test.rs"]
mod tests;
