use super::*;

fn labels() -> Vec<String> {
    civicfeed_core::DEFAULT_DIRECTIONAL_LABELS
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn ctx(policy: DisplayPolicy, labels: &[String]) -> DisplayContext<'_> {
    DisplayContext {
        policy,
        city: "Portland",
        city_label: "Portland, OR".to_string(),
        region: "Oregon",
        region_abbr: "OR",
        directional_labels: labels,
    }
}

// -----------------------------------------------------------------------
// normalize_query
// -----------------------------------------------------------------------

#[test]
fn normalize_trims_collapses_and_lowercases() {
    assert_eq!(normalize_query("  5th   AVE \t").as_str(), "5th ave");
}

#[test]
fn normalize_is_idempotent() {
    for input in [
        "",
        "   ",
        "5th Ave",
        "5th   ave",
        "SE DIVISION ST / SE 82ND AVE",
        "Ünïcödé  Straße\n",
        "123 Main St, Portland, OR",
    ] {
        let once = normalize_query(input);
        let twice = normalize_query(once.as_str());
        assert_eq!(once, twice, "normalize not idempotent for {input:?}");
    }
}

#[test]
fn case_and_whitespace_variants_share_a_key() {
    assert_eq!(normalize_query("5th Ave"), normalize_query("5th   ave"));
}

// -----------------------------------------------------------------------
// title_case_street
// -----------------------------------------------------------------------

#[test]
fn title_cases_words_and_ordinals() {
    assert_eq!(title_case_street("123 MAIN ST"), "123 Main St");
    assert_eq!(title_case_street("1ST AVE"), "1st Ave");
}

#[test]
fn keeps_quadrants_upper_case() {
    assert_eq!(title_case_street("se division st"), "SE Division St");
}

#[test]
fn intersections_split_on_both_slashes() {
    assert_eq!(
        title_case_street("SE DIVISION ST/SE 82ND AVE"),
        "SE Division St / SE 82nd Ave"
    );
    assert_eq!(
        title_case_street(r"BURNSIDE ST \ 12TH AVE"),
        "Burnside St / 12th Ave"
    );
}

#[test]
fn hyphenated_words_capitalize_each_part() {
    assert_eq!(title_case_street("I-5 NB / WILSON-RIVER HWY"), "I-5 Nb / Wilson-River Hwy");
}

#[test]
fn apostrophes_do_not_capitalize() {
    assert_eq!(title_case_street("MARY'S WAY"), "Mary's Way");
}

// -----------------------------------------------------------------------
// canonicalize_display
// -----------------------------------------------------------------------

#[test]
fn directional_label_is_replaced_by_city() {
    let labels = labels();
    let c = ctx(DisplayPolicy::Directional, &labels);
    assert_eq!(
        canonicalize_display(Some("123 MAIN ST"), Some("EAST"), &c),
        "123 Main St, Portland, OR"
    );
    assert_eq!(
        canonicalize_display(Some("123 MAIN ST"), Some("north precinct"), &c),
        "123 Main St, Portland, OR"
    );
}

#[test]
fn real_place_label_is_title_cased() {
    let labels = labels();
    let c = ctx(DisplayPolicy::Directional, &labels);
    assert_eq!(
        canonicalize_display(Some("10 FIRST ST"), Some("LAKE OSWEGO"), &c),
        "10 First St, Lake Oswego, OR"
    );
}

#[test]
fn missing_label_uses_city() {
    let labels = labels();
    let c = ctx(DisplayPolicy::Directional, &labels);
    assert_eq!(
        canonicalize_display(Some("10 first st"), None, &c),
        "10 First St, Portland, OR"
    );
}

#[test]
fn custom_directional_list_is_honored() {
    let labels = vec!["CENTRAL EASTSIDE".to_string()];
    let c = ctx(DisplayPolicy::Directional, &labels);
    assert_eq!(
        canonicalize_display(Some("1 A ST"), Some("Central  Eastside"), &c),
        "1 A St, Portland, OR"
    );
    assert_eq!(
        canonicalize_display(Some("1 A ST"), Some("DOWNTOWN"), &c),
        "1 A St, Downtown, OR"
    );
}

#[test]
fn no_street_degrades_to_city_label() {
    let labels = labels();
    for policy in [DisplayPolicy::Directional, DisplayPolicy::FixedSuffix] {
        let c = ctx(policy, &labels);
        assert_eq!(canonicalize_display(None, Some("EAST"), &c), "Portland, OR");
        assert_eq!(canonicalize_display(Some("   "), None, &c), "Portland, OR");
    }
}

#[test]
fn fixed_suffix_appended_when_missing() {
    let labels = labels();
    let c = ctx(DisplayPolicy::FixedSuffix, &labels);
    assert_eq!(
        canonicalize_display(Some("400 ORCHARD LN"), None, &c),
        "400 Orchard Ln, Portland, OR"
    );
}

#[test]
fn fixed_suffix_not_duplicated() {
    let labels = labels();
    let c = ctx(DisplayPolicy::FixedSuffix, &labels);
    assert_eq!(
        canonicalize_display(Some("400 ELM ST, PORTLAND, OR"), None, &c),
        "400 Elm St, Portland, OR"
    );
    assert_eq!(
        canonicalize_display(Some("400 Elm St, Beaverton, Oregon"), None, &c),
        "400 Elm St, Beaverton, Oregon"
    );
    assert_eq!(
        canonicalize_display(Some("400 Elm St, Gresham OR"), None, &c),
        "400 Elm St, Gresham OR"
    );
}

#[test]
fn display_address_is_never_empty() {
    let labels = labels();
    for policy in [DisplayPolicy::Directional, DisplayPolicy::FixedSuffix] {
        let c = ctx(policy, &labels);
        for street in [None, Some(""), Some("x"), Some("/"), Some("\\ /")] {
            assert!(!canonicalize_display(street, None, &c).is_empty());
        }
    }
}

#[test]
fn separator_only_street_degrades_to_city_label() {
    let labels = labels();
    for policy in [DisplayPolicy::Directional, DisplayPolicy::FixedSuffix] {
        let c = ctx(policy, &labels);
        assert_eq!(canonicalize_display(Some(" / "), None, &c), "Portland, OR");
    }
}

#[test]
fn context_from_source_uses_source_city_label() {
    let yaml = "sources:\n  - slug: tigard\n    label: Tigard\n    url: https://example.org/t\n    city: Tigard\n    region: Oregon\n    region_abbr: OR\n    display_policy: fixed_suffix\n";
    let source = civicfeed_core::parse_sources(yaml).unwrap().sources.remove(0);
    let c = DisplayContext::from_source(&source);

    assert_eq!(c.city_label, source.city_label());
    assert_eq!(canonicalize_display(None, None, &c), "Tigard, OR");
}
