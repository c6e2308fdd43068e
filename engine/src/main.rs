//! Fare deal engine - scheduled runner
//!
//! Loads the route list, then sweeps every route for fares on a fixed
//! interval, logging the best ones, until interrupted.

use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use fare_deals_engine::config::{load_routes, Config};
use fare_deals_engine::external::HttpFareClient;
use fare_deals_engine::services::{DealEvaluator, LogSink, PriceHistoryStore, Scheduler, SearchOrchestrator};
use fare_deals_engine::telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    init_tracing(&config.logging);

    tracing::info!("Starting fare deal engine");
    tracing::info!("Environment: {}", config.environment);

    let routes_file = config
        .routes_file
        .clone()
        .context("routes_file is not configured (set FARE__ROUTES_FILE)")?;
    let routes = load_routes(&routes_file)
        .with_context(|| format!("reading routes from {}", routes_file.display()))?;
    tracing::info!("Loaded {} routes from {}", routes.len(), routes_file.display());

    let store = Arc::new(PriceHistoryStore::load(&config.store.path));
    let fetcher = HttpFareClient::new(
        config.fetcher.base_url.clone(),
        config.fetcher.api_key.clone(),
        config.fetcher.timeout_secs,
    )?;
    let orchestrator = Arc::new(SearchOrchestrator::new(
        Arc::new(fetcher),
        DealEvaluator::new(store),
    ));

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let scheduler = Scheduler::new(orchestrator, config.schedule.interval_hours).with_sink(LogSink);
    scheduler
        .run(
            |today| {
                routes
                    .iter()
                    .filter_map(|route| match config.job_for_route(route, today) {
                        Ok(job) => Some(job),
                        Err(e) => {
                            tracing::error!(
                                origin = %route.origin,
                                destination = %route.destination,
                                "Skipping route: {}",
                                e
                            );
                            None
                        }
                    })
                    .collect()
            },
            cancel,
        )
        .await;

    tracing::info!("Fare deal engine stopped");
    Ok(())
}

/// Cancel running searches on Ctrl-C
async fn shutdown_signal(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Shutdown requested, finishing in-flight queries");
            cancel.cancel();
        }
        Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
    }
}
