//! Ranking of evaluated fares

use shared::{round2, DealRecord, SortKey};
use std::cmp::Ordering;

/// Score, filter, order and truncate a batch of records.
///
/// A `discount_threshold` of zero or below disables the discount filter.
/// An unrecognised sort key leaves the records in their incoming order.
/// A `limit` of zero or below yields nothing.
pub fn rank(
    mut records: Vec<DealRecord>,
    sort_key: &SortKey,
    limit: i64,
    discount_threshold: f64,
) -> Vec<DealRecord> {
    assign_value_scores(&mut records);

    if discount_threshold > 0.0 {
        records.retain(|r| r.discount_percentage >= discount_threshold);
    }

    if let SortKey::Unrecognized(raw) = sort_key {
        tracing::debug!(sort_key = %raw, "Unknown sort key, keeping collection order");
    } else {
        records.sort_by(|a, b| compare(sort_key, a, b));
    }

    let limit = usize::try_from(limit).unwrap_or(0);
    records.truncate(limit);
    records
}

/// Place each record's price per hour on a 0-100 scale within the batch.
/// Every record gets 50 when all rates are equal; records without a rate get none.
pub fn assign_value_scores(records: &mut [DealRecord]) {
    let rates = records.iter().filter_map(|r| r.price_per_hour);
    let (min, max) = rates.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), pph| {
        (lo.min(pph), hi.max(pph))
    });

    for record in records.iter_mut() {
        record.value_score = record.price_per_hour.map(|pph| {
            if max > min {
                round2((pph - min) / (max - min) * 100.0)
            } else {
                50.0
            }
        });
    }
}

fn compare(sort_key: &SortKey, a: &DealRecord, b: &DealRecord) -> Ordering {
    match sort_key {
        SortKey::Price => a.price().total_cmp(&b.price()),
        SortKey::PricePerHour => missing_last(a.price_per_hour, b.price_per_hour),
        SortKey::DurationHours => b.duration_hours().total_cmp(&a.duration_hours()),
        SortKey::ValueScore => missing_last(a.value_score, b.value_score),
        SortKey::DiscountPercentage => b.discount_percentage.total_cmp(&a.discount_percentage),
        SortKey::Unrecognized(_) => Ordering::Equal,
    }
}

/// Ascending, with records lacking the value after all others
fn missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
