//! Ranking integration tests
//!
//! Ranking twice gives the same fares in the same order, and filters and
//! limits hold for any batch.

mod common;

use common::fare;
use proptest::prelude::*;
use shared::{CabinClass, DealRecord, DealVerdict, SortKey};

use fare_deals_engine::services::rank;

fn record(price: i64, hours: f64, discount: f64) -> DealRecord {
    DealRecord::new(
        fare(price, hours, CabinClass::Economy),
        DealVerdict {
            is_good_deal: discount >= 35.0,
            discount_percentage: discount,
        },
    )
}

/// Identity of a record independent of its batch-relative score
fn identity(records: &[DealRecord]) -> Vec<(f64, f64, f64)> {
    records
        .iter()
        .map(|r| (r.price(), r.duration_hours(), r.discount_percentage))
        .collect()
}

fn any_record() -> impl Strategy<Value = DealRecord> {
    (1i64..5_000, 1u32..40, -50i32..80).prop_map(|(price, hours, discount)| {
        record(price, f64::from(hours), f64::from(discount))
    })
}

fn any_sort_key() -> impl Strategy<Value = SortKey> {
    prop_oneof![
        Just(SortKey::Price),
        Just(SortKey::PricePerHour),
        Just(SortKey::DurationHours),
        Just(SortKey::DiscountPercentage),
        Just(SortKey::from("airline")),
    ]
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_threshold_of_one_hundred_filters_everything() {
    let records = vec![record(100, 5.0, 99.0), record(200, 5.0, 60.0)];
    assert!(rank(records, &SortKey::Price, 10, 100.0).is_empty());
}

#[test]
fn test_value_score_ranking() {
    let records = vec![record(900, 6.0, 0.0), record(600, 12.0, 0.0), record(800, 8.0, 0.0)];
    let ranked = rank(records, &SortKey::ValueScore, 10, 0.0);
    let scores: Vec<_> = ranked.iter().map(|r| r.value_score.unwrap()).collect();
    assert_eq!(scores, vec![0.0, 50.0, 100.0]);
}

#[test]
fn test_sort_key_names_from_config() {
    let records = vec![record(900, 6.0, 0.0), record(600, 12.0, 0.0)];
    let by_duration = rank(records.clone(), &SortKey::from("duration_hours"), 10, 0.0);
    assert_eq!(by_duration[0].price(), 600.0);
    let by_price = rank(records, &SortKey::from("price"), 10, 0.0);
    assert_eq!(by_price[0].price(), 600.0);
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_ranking_is_idempotent(
        records in prop::collection::vec(any_record(), 0..40),
        sort_key in any_sort_key(),
        limit in -2i64..30,
        threshold in 0.0f64..60.0,
    ) {
        let once = rank(records, &sort_key, limit, threshold);
        let twice = rank(once.clone(), &sort_key, limit, threshold);
        prop_assert_eq!(identity(&once), identity(&twice));
    }

    #[test]
    fn prop_filter_and_limit_hold(
        records in prop::collection::vec(any_record(), 0..40),
        sort_key in any_sort_key(),
        limit in -2i64..30,
        threshold in 0.0f64..60.0,
    ) {
        let total = records.len();
        let ranked = rank(records, &sort_key, limit, threshold);

        prop_assert!(ranked.len() <= usize::try_from(limit.max(0)).unwrap());
        prop_assert!(ranked.len() <= total);
        if threshold > 0.0 {
            prop_assert!(ranked.iter().all(|r| r.discount_percentage >= threshold));
        }
        for score in ranked.iter().filter_map(|r| r.value_score) {
            prop_assert!((0.0..=100.0).contains(&score));
        }
    }
}
