//! Coverage resolution against provider-shaped fixtures

mod helpers;

use helpers::*;
use panoscout_common::{CapturedDate, Coordinate, PanoId};
use panoscout_engine::{FetchError, ResolveError};
use std::sync::Arc;

fn date(year: i32, month: u32) -> CapturedDate {
    CapturedDate::new(year, month).unwrap()
}

#[tokio::test]
async fn test_no_newer_coverage_returns_base() {
    let stub = Arc::new(
        StubTransport::new()
            .with_pano(
                PanoFixture::new("BASE", BASE_LAT, BASE_LNG)
                    .dated(2024, 1)
                    .history("OLDER", 2022, 6)
                    .spatial("NEIGHBOR"),
            )
            .with_pano(PanoFixture::new("NEIGHBOR", BASE_LAT + NEAR, BASE_LNG).dated(2023, 11)),
    );

    let verdict = resolver(&stub)
        .resolve(&PanoId::from("BASE"), "2024", "01")
        .await
        .unwrap();

    assert_eq!(verdict.pano_id, PanoId::from("BASE"));
    assert_eq!(verdict.date, date(2024, 1));
    assert_eq!(verdict.coordinate, Coordinate::new(BASE_LAT, BASE_LNG));
    assert!(!verdict.has_newer_coverage);
    assert!(!verdict.is_only_one_month_newer);
}

#[tokio::test]
async fn test_history_link_one_month_newer() {
    let stub = Arc::new(
        StubTransport::new()
            .with_pano(PanoFixture::new("BASE", BASE_LAT, BASE_LNG).dated(2023, 5).history("JUNE", 2023, 6)),
    );

    let verdict = resolver(&stub)
        .resolve(&PanoId::from("BASE"), "2023", "5")
        .await
        .unwrap();

    assert_eq!(verdict.pano_id, PanoId::from("JUNE"));
    assert_eq!(verdict.date, date(2023, 6));
    assert!(verdict.has_newer_coverage);
    assert!(verdict.is_only_one_month_newer);
}

#[tokio::test]
async fn test_documented_example_history_three_months_newer() {
    let stub = Arc::new(
        StubTransport::new().with_pano(
            PanoFixture::new("ABC123", BASE_LAT, BASE_LNG)
                .dated(2023, 5)
                .history("HIST_AUG", 2023, 8)
                .spatial("SPATIAL"),
        ),
    );

    let verdict = resolver(&stub)
        .resolve(&PanoId::from("ABC123"), "2023", "05")
        .await
        .unwrap();

    assert_eq!(verdict.pano_id, PanoId::from("HIST_AUG"));
    assert_eq!(verdict.date, date(2023, 8));
    // History shares the tripod location
    assert_eq!(verdict.coordinate, Coordinate::new(BASE_LAT, BASE_LNG));
    assert!(verdict.has_newer_coverage);
    assert!(!verdict.is_only_one_month_newer);

    // Three months ahead already: spatial links are not probed
    assert_eq!(stub.calls_for("SPATIAL"), 0);
    assert_eq!(stub.call_count(), 1);
}

#[tokio::test]
async fn test_history_within_threshold_still_probes_spatial() {
    let near = PanoFixture::new("NEAR", BASE_LAT + NEAR, BASE_LNG).dated(2024, 3);
    let stub = Arc::new(
        StubTransport::new()
            .with_pano(
                PanoFixture::new("BASE", BASE_LAT, BASE_LNG)
                    .dated(2023, 11)
                    .history("HIST", 2024, 1)
                    .spatial("NEAR"),
            )
            .with_pano(near.clone()),
    );

    let verdict = resolver(&stub)
        .resolve(&PanoId::from("BASE"), "2023", "11")
        .await
        .unwrap();

    assert_eq!(stub.calls_for("NEAR"), 1);
    assert_eq!(verdict.pano_id, PanoId::from("NEAR"));
    assert_eq!(verdict.date, date(2024, 3));
    assert_eq!(verdict.coordinate, Coordinate::new(near.lat, near.lng));
    assert!(verdict.has_newer_coverage);
    assert!(!verdict.is_only_one_month_newer);
}

#[tokio::test]
async fn test_spatial_neighbor_outside_radius_is_ignored() {
    let stub = Arc::new(
        StubTransport::new()
            .with_pano(
                PanoFixture::new("BASE", BASE_LAT, BASE_LNG)
                    .dated(2023, 5)
                    .spatial("FAR")
                    .spatial("NEAR"),
            )
            .with_pano(PanoFixture::new("FAR", BASE_LAT + FAR, BASE_LNG).dated(2025, 1))
            .with_pano(PanoFixture::new("NEAR", BASE_LAT + NEAR, BASE_LNG).dated(2023, 9)),
    );

    let verdict = resolver(&stub)
        .resolve(&PanoId::from("BASE"), "2023", "05")
        .await
        .unwrap();

    assert_eq!(verdict.pano_id, PanoId::from("NEAR"));
    assert_eq!(verdict.date, date(2023, 9));
    assert_eq!(verdict.coordinate, Coordinate::new(BASE_LAT + NEAR, BASE_LNG));
}

#[tokio::test]
async fn test_wider_radius_accepts_farther_neighbor() {
    let stub = Arc::new(
        StubTransport::new()
            .with_pano(PanoFixture::new("BASE", BASE_LAT, BASE_LNG).dated(2023, 5).spatial("FAR"))
            .with_pano(PanoFixture::new("FAR", BASE_LAT + FAR, BASE_LNG).dated(2025, 1)),
    );
    let resolver = resolver(&stub);
    let base = PanoId::from("BASE");

    let default_radius = resolver.resolve(&base, "2023", "05").await.unwrap();
    assert!(!default_radius.has_newer_coverage);

    let wide = resolver.resolve_within(&base, "2023", "05", 200.0).await.unwrap();
    assert_eq!(wide.pano_id, PanoId::from("FAR"));
    assert_eq!(wide.date, date(2025, 1));
}

#[tokio::test]
async fn test_neighbor_date_found_by_heuristic() {
    let stub = Arc::new(
        StubTransport::new()
            .with_pano(PanoFixture::new("BASE", BASE_LAT, BASE_LNG).dated(2023, 5).spatial("UNDATED"))
            .with_pano(PanoFixture::new("UNDATED", BASE_LAT + NEAR, BASE_LNG).hidden_date(2023, 10)),
    );

    let verdict = resolver(&stub)
        .resolve(&PanoId::from("BASE"), "2023", "05")
        .await
        .unwrap();

    assert_eq!(verdict.pano_id, PanoId::from("UNDATED"));
    assert_eq!(verdict.date, date(2023, 10));
}

#[tokio::test]
async fn test_neighbor_without_any_date_is_skipped() {
    let stub = Arc::new(
        StubTransport::new()
            .with_pano(PanoFixture::new("BASE", BASE_LAT, BASE_LNG).dated(2023, 5).spatial("UNDATED"))
            .with_pano(PanoFixture::new("UNDATED", BASE_LAT + NEAR, BASE_LNG)),
    );

    let verdict = resolver(&stub)
        .resolve(&PanoId::from("BASE"), "2023", "05")
        .await
        .unwrap();

    assert_eq!(verdict.pano_id, PanoId::from("BASE"));
    assert!(!verdict.has_newer_coverage);
}

#[tokio::test]
async fn test_failing_neighbor_is_skipped() {
    let stub = Arc::new(
        StubTransport::new()
            .with_pano(
                PanoFixture::new("BASE", BASE_LAT, BASE_LNG)
                    .dated(2023, 5)
                    .spatial("BROKEN")
                    .spatial("GOOD"),
            )
            .with_pano(PanoFixture::new("BROKEN", BASE_LAT + NEAR, BASE_LNG).dated(2026, 1))
            .failing("BROKEN")
            .with_pano(PanoFixture::new("GOOD", BASE_LAT + NEAR, BASE_LNG).dated(2023, 7)),
    );

    let verdict = resolver(&stub)
        .resolve(&PanoId::from("BASE"), "2023", "05")
        .await
        .unwrap();

    // Both panorama types were tried before giving up on the neighbor
    assert_eq!(stub.calls_for("BROKEN"), 2);
    assert_eq!(verdict.pano_id, PanoId::from("GOOD"));
    assert_eq!(verdict.date, date(2023, 7));
}

#[tokio::test]
async fn test_dangling_spatial_link_is_skipped() {
    let stub = Arc::new(
        StubTransport::new()
            .with_pano(
                PanoFixture::new("BASE", BASE_LAT, BASE_LNG)
                    .dated(2023, 5)
                    .dangling_spatial(42)
                    .spatial("GOOD"),
            )
            .with_pano(PanoFixture::new("GOOD", BASE_LAT + NEAR, BASE_LNG).dated(2023, 6)),
    );

    let verdict = resolver(&stub)
        .resolve(&PanoId::from("BASE"), "2023", "05")
        .await
        .unwrap();

    assert_eq!(verdict.pano_id, PanoId::from("GOOD"));
    assert!(verdict.is_only_one_month_newer);
}

#[tokio::test]
async fn test_invalid_reference_date_fetches_nothing() {
    let stub = Arc::new(StubTransport::new().with_pano(PanoFixture::new("BASE", BASE_LAT, BASE_LNG).dated(2023, 5)));
    let resolver = resolver(&stub);
    let base = PanoId::from("BASE");

    for (year, month) in [("2023", "13"), ("20x3", "05"), ("2023", ""), ("", "05")] {
        let result = resolver.resolve(&base, year, month).await;
        assert!(
            matches!(result, Err(ResolveError::InvalidReferenceDate(_))),
            "{}/{} should be rejected, got {:?}",
            year,
            month,
            result
        );
    }
    assert_eq!(stub.call_count(), 0);
}

#[tokio::test]
async fn test_base_fetch_failure_aborts() {
    let stub = Arc::new(StubTransport::new().failing("BASE"));

    let result = resolver(&stub).resolve(&PanoId::from("BASE"), "2023", "05").await;

    match result {
        Err(ResolveError::BaseUnavailable { pano_id, source }) => {
            assert_eq!(pano_id, PanoId::from("BASE"));
            assert!(matches!(source, FetchError::Exhausted { .. }));
        }
        other => panic!("expected BaseUnavailable, got {:?}", other),
    }
    assert_eq!(stub.calls(), vec![("BASE".to_string(), 2), ("BASE".to_string(), 10)]);
}

#[tokio::test]
async fn test_unknown_pano_is_unavailable() {
    let stub = Arc::new(StubTransport::new());

    let result = resolver(&stub).resolve(&PanoId::from("MISSING"), "2023", "05").await;

    assert!(matches!(result, Err(ResolveError::BaseUnavailable { .. })));
}

#[tokio::test]
async fn test_user_contributed_prefix_falls_back_to_official_type() {
    let id = "CIHM0ogKEICAgIDu";
    let stub = Arc::new(
        StubTransport::new()
            .with_pano(PanoFixture::new(id, BASE_LAT, BASE_LNG).dated(2023, 5).history("NEWER", 2024, 5))
            .with_pano_type(id, 2),
    );

    let verdict = resolver(&stub).resolve(&PanoId::from(id), "2023", "05").await.unwrap();

    assert_eq!(verdict.pano_id, PanoId::from("NEWER"));
    assert_eq!(stub.calls(), vec![(id.to_string(), 10), (id.to_string(), 2)]);
}

#[tokio::test]
async fn test_unusable_radius_is_rejected_before_fetching() {
    let stub = Arc::new(
        StubTransport::new()
            .with_pano(PanoFixture::new("BASE", BASE_LAT, BASE_LNG).dated(2023, 5).spatial("FAR"))
            // ~111 km away and much newer
            .with_pano(PanoFixture::new("FAR", BASE_LAT + 1.0, BASE_LNG).dated(2025, 1)),
    );
    let resolver = resolver(&stub);
    let base = PanoId::from("BASE");

    for radius in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -1.0] {
        let result = resolver.resolve_within(&base, "2023", "05", radius).await;
        assert!(
            matches!(result, Err(ResolveError::InvalidRadius(_))),
            "radius {} should be rejected, got {:?}",
            radius,
            result
        );
    }
    assert_eq!(stub.call_count(), 0);

    // A zero radius is valid and only admits co-located neighbors
    let verdict = resolver.resolve_within(&base, "2023", "05", 0.0).await.unwrap();
    assert_eq!(verdict.pano_id, PanoId::from("BASE"));
    assert!(!verdict.has_newer_coverage);
}

#[tokio::test]
async fn test_malformed_base_response_is_unavailable() {
    // Core present but the coordinate block is missing
    let malformed = serde_json::json!([
        [1],
        [[null, [2, "BROKEN"], null, null, null, [[null, [], null, [[]]]]]]
    ]);
    let stub = Arc::new(StubTransport::new().with_raw("BROKEN", malformed));

    let result = resolver(&stub).resolve(&PanoId::from("BROKEN"), "2023", "05").await;

    match result {
        Err(ResolveError::BaseUnavailable { source: FetchError::Exhausted { last_error, .. }, .. }) => {
            assert!(last_error.contains("Unusable response"), "{}", last_error);
        }
        other => panic!("expected BaseUnavailable, got {:?}", other),
    }
    // Both panorama types were tried
    assert_eq!(stub.calls_for("BROKEN"), 2);
}
