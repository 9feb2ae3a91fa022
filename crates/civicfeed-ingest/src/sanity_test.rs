use std::time::Duration;

use super::*;
use crate::testing::FakeProvider;

const PORTLAND: GeoPoint = GeoPoint {
    lat: 45.5152,
    lon: -122.6784,
};

fn check() -> SanityCheck {
    SanityCheck {
        center: PORTLAND,
        radius_miles: 40.0,
        city: "Portland".to_string(),
        region_abbr: "OR".to_string(),
    }
}

#[test]
fn haversine_matches_known_distance() {
    let seattle = GeoPoint {
        lat: 47.6062,
        lon: -122.3321,
    };
    let d = haversine_miles(PORTLAND, seattle);
    assert!((d - 145.0).abs() < 2.0, "Portland → Seattle was {d}");
    assert!(haversine_miles(PORTLAND, PORTLAND).abs() < f64::EPSILON);
}

#[test]
fn radius_is_inclusive_of_nearby_points() {
    let gresham = GeoPoint {
        lat: 45.4987,
        lon: -122.4302,
    };
    assert!(check().within_radius(gresham));
    assert!(!check().within_radius(GeoPoint {
        lat: 44.0,
        lon: -123.0
    }));
}

#[test]
fn force_suffix_replaces_other_city() {
    assert_eq!(
        check().force_regional_suffix("123 main st, salem, or"),
        "123 main st, Portland, OR"
    );
}

#[test]
fn force_suffix_inserts_city_before_bare_abbr() {
    assert_eq!(
        check().force_regional_suffix("123 main st, OR"),
        "123 main st, Portland, OR"
    );
}

#[test]
fn force_suffix_appends_when_absent() {
    assert_eq!(
        check().force_regional_suffix("123 main st"),
        "123 main st, Portland, OR"
    );
    assert_eq!(check().force_regional_suffix(""), "Portland, OR");
    assert_eq!(check().force_regional_suffix("OR"), "Portland, OR");
}

#[test]
fn from_source_requires_center() {
    let yaml = "sources:\n  - slug: a\n    label: A\n    url: https://example.org/a\n    city: Portland\n    region: Oregon\n    region_abbr: OR\n";
    let mut source = civicfeed_core::parse_sources(yaml).unwrap().sources.remove(0);
    assert!(SanityCheck::from_source(&source).is_none());

    source.center = Some(PORTLAND);
    source.sanity_radius_miles = 12.5;
    let check = SanityCheck::from_source(&source).unwrap();
    assert!((check.radius_miles - 12.5).abs() < f64::EPSILON);
    assert_eq!(check.city, "Portland");
}

#[tokio::test]
async fn in_radius_result_is_kept_without_retry() {
    let resolver = GeocodeResolver::new(FakeProvider::new().answer("123 Main St", 45.51, -122.66));
    let q = normalize_query("123 Main St");

    let result = check().resolve_validated(&resolver, &q).await.unwrap();

    assert!((result.lat - 45.51).abs() < f64::EPSILON);
    assert_eq!(resolver.provider().calls(), vec!["123 main st"]);
}

#[tokio::test]
async fn distant_result_is_replaced_by_in_radius_retry() {
    let provider = FakeProvider::new()
        .answer("123 Main St", 39.78, -89.65)
        .answer("123 Main St, Portland, OR", 45.51, -122.66);
    let resolver = GeocodeResolver::new(provider);
    let q = normalize_query("123 Main St");

    let result = check().resolve_validated(&resolver, &q).await.unwrap();

    assert!((result.lat - 45.51).abs() < f64::EPSILON);
    assert_eq!(
        resolver.provider().calls(),
        vec!["123 main st", "123 main st, portland, or"]
    );
}

#[tokio::test]
async fn distant_retry_keeps_original() {
    let provider = FakeProvider::new()
        .answer("123 Main St", 39.78, -89.65)
        .answer("123 Main St, Portland, OR", 40.0, -100.0);
    let resolver = GeocodeResolver::new(provider);
    let q = normalize_query("123 Main St");

    let result = check().resolve_validated(&resolver, &q).await.unwrap();

    assert!((result.lat - 39.78).abs() < f64::EPSILON);
}

#[tokio::test]
async fn failed_retry_keeps_original() {
    let resolver = GeocodeResolver::new(FakeProvider::new().answer("123 Main St", 39.78, -89.65));
    let q = normalize_query("123 Main St");

    let result = check().resolve_validated(&resolver, &q).await.unwrap();

    assert!((result.lat - 39.78).abs() < f64::EPSILON);
    assert_eq!(resolver.provider().calls().len(), 2);
}

#[tokio::test]
async fn already_suffixed_query_is_not_retried() {
    let resolver = GeocodeResolver::new(
        FakeProvider::new().answer("123 Main St, Portland, OR", 39.78, -89.65),
    );
    let q = normalize_query("123 Main St, Portland, OR");

    let result = check().resolve_validated(&resolver, &q).await.unwrap();

    assert!((result.lat - 39.78).abs() < f64::EPSILON);
    assert_eq!(resolver.provider().calls().len(), 1);
}

#[tokio::test]
async fn initial_failure_is_surfaced() {
    let resolver = GeocodeResolver::new(FakeProvider::new());
    let err = check()
        .resolve_validated(&resolver, &normalize_query("nowhere"))
        .await
        .unwrap_err();
    assert!(matches!(err, GeocodeError::NoResult { .. }));
}

#[tokio::test]
async fn resolve_all_applies_the_check() {
    let provider = FakeProvider::new()
        .answer("123 Main St", 39.78, -89.65)
        .answer("123 Main St, Portland, OR", 45.51, -122.66);
    let resolver = GeocodeResolver::new(provider);
    let check = check();

    let resolved = resolver
        .resolve_all([normalize_query("123 Main St")], 5, Some(&check))
        .await;

    let hit = &resolved[&normalize_query("123 main st")];
    assert!(check.within_radius(hit.point()));
}

#[tokio::test]
async fn retry_already_in_the_batch_is_not_looked_up_again() {
    let provider = FakeProvider::new()
        .answer("10 Oak St, Springfield, OR", 39.78, -89.65)
        .answer("10 Oak St, Portland, OR", 45.53, -122.65)
        .delay("10 Oak St, Springfield, OR", Duration::from_millis(20))
        .delay("10 Oak St, Portland, OR", Duration::from_millis(60));
    let resolver = GeocodeResolver::new(provider);
    let check = check();
    let queries = ["10 Oak St, Springfield, OR", "10 Oak St, Portland, OR"].map(normalize_query);

    let resolved = resolver.resolve_all(queries, 5, Some(&check)).await;

    let mut calls = resolver.provider().calls();
    calls.sort();
    assert_eq!(
        calls,
        vec!["10 oak st, portland, or", "10 oak st, springfield, or"]
    );
    let corrected = &resolved[&normalize_query("10 Oak St, Springfield, OR")];
    assert!((corrected.lat - 45.53).abs() < f64::EPSILON);
}

#[tokio::test]
async fn shared_retry_is_looked_up_once() {
    let provider = FakeProvider::new()
        .answer("10 Oak St, Salem, OR", 39.78, -89.65)
        .answer("10 Oak St, Eugene, OR", 39.70, -89.60)
        .answer("10 Oak St, Portland, OR", 45.53, -122.65)
        .delay_all(Duration::from_millis(20));
    let resolver = GeocodeResolver::new(provider);
    let check = check();
    let queries = ["10 Oak St, Salem, OR", "10 Oak St, Eugene, OR"].map(normalize_query);

    let resolved = resolver.resolve_all(queries, 5, Some(&check)).await;

    let calls = resolver.provider().calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls.iter().filter(|c| *c == "10 oak st, portland, or").count(),
        1
    );
    assert!(resolved.values().all(|hit| check.within_radius(hit.point())));
}

#[tokio::test]
async fn distant_retry_in_the_batch_keeps_both_originals() {
    let provider = FakeProvider::new()
        .answer("10 Oak St, Salem, OR", 39.78, -89.65)
        .answer("10 Oak St, Portland, OR", 40.0, -100.0);
    let resolver = GeocodeResolver::new(provider);
    let check = check();
    let queries = ["10 Oak St, Salem, OR", "10 Oak St, Portland, OR"].map(normalize_query);

    let resolved = resolver.resolve_all(queries, 5, Some(&check)).await;

    assert_eq!(resolver.provider().calls().len(), 2);
    assert!((resolved[&normalize_query("10 Oak St, Salem, OR")].lat - 39.78).abs() < f64::EPSILON);
    assert!((resolved[&normalize_query("10 Oak St, Portland, OR")].lat - 40.0).abs() < f64::EPSILON);
}

#[test]
fn retry_query_is_none_when_suffix_is_already_forced() {
    assert!(check()
        .retry_query(&normalize_query("1 A St, Portland, OR"))
        .is_none());
    assert_eq!(
        check().retry_query(&normalize_query("1 A St")),
        Some(normalize_query("1 a st, portland, or"))
    );
}
