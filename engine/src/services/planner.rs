//! Expansion of a search job into concrete fare queries

use chrono::Days;
use shared::{FlightQuery, SearchJob, TripKind};

/// One query per departure date for one-way jobs; one per
/// (departure, stay length) pair for round trips, skipping returns past the
/// job's return ceiling. Queries come out ordered by departure then return.
/// Dates past the end of the calendar are never planned.
pub fn plan_queries(job: &SearchJob) -> Vec<FlightQuery> {
    let departures = job
        .departure_window()
        .map(|window| window.days(job.date_step_days))
        .unwrap_or_default();

    let query = |departure_date, return_date| FlightQuery {
        origin: job.origin.clone(),
        destination: job.destination.clone(),
        departure_date,
        return_date,
        cabin: job.cabin,
    };

    match job.trip {
        TripKind::OneWay => departures.into_iter().map(|d| query(d, None)).collect(),
        TripKind::RoundTrip {
            min_stay,
            max_stay,
            stay_step,
        } => {
            let ceiling = job.return_ceiling();
            let step = stay_step.max(1) as usize;
            departures
                .into_iter()
                .flat_map(|departure| {
                    (min_stay..=max_stay)
                        .step_by(step)
                        .filter_map(move |stay| departure.checked_add_days(Days::new(u64::from(stay))))
                        .filter(move |ret| ceiling.map_or(true, |c| *ret <= c))
                        .map(move |ret| (departure, ret))
                })
                .map(|(departure, ret)| query(departure, Some(ret)))
                .collect()
        }
    }
}
