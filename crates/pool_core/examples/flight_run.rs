//! Pool a few synthetic flights and print the confirmable groups.
//!
//! ```sh
//! RUST_LOG=pool_core=debug cargo run -p pool_core --example flight_run
//! ```

use std::sync::Arc;

use pool_core::geo::offset_km;
use pool_core::routing::RouteCache;
use pool_core::runner::requests_by_flight;
use pool_core::test_helpers::{booking_ring, seeded_bookings, TEST_AIRPORT, TEST_AIRPORT_ID};
use pool_core::{FlightRunner, PipelineConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path).expect("read config file");
            PipelineConfig::from_json_str(&json).expect("valid config")
        }
        None => PipelineConfig::default(),
    };

    let mut bookings = seeded_bookings(2024, 40, 20.0);
    bookings.extend(booking_ring("AF1234", "af", offset_km(TEST_AIRPORT, 25.0, 5.0), 1.2, 5));
    bookings.extend(booking_ring("BA4321", "ba", offset_km(TEST_AIRPORT, -18.0, 12.0), 2.0, 2));
    let flights = requests_by_flight(TEST_AIRPORT_ID, TEST_AIRPORT, &bookings);

    let cache = Arc::new(RouteCache::from_config(&config.routing));
    let runner = FlightRunner::new(&config).with_route_cache(cache);

    for result in runner.run_flights_parallel(&flights, None) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                eprintln!("flight failed: {err}");
                continue;
            }
        };
        println!(
            "flight {}: {} bookings, {} clusters, {} noise, {} confirmable, {} rejected",
            outcome.flight_id,
            outcome.clustering_stats.total_points,
            outcome.clustering_stats.cluster_count,
            outcome.noise_booking_ids.len(),
            outcome.ranking.stats.confirmable,
            outcome.ranking.stats.rejected,
        );
        for pool in &outcome.ranking.confirmable_pools {
            let tier = pool
                .stability_tier
                .map(|t| t.to_string())
                .unwrap_or_default();
            println!(
                "  pool {} | {} pax | {:.1} km | score {:.1} {} | total {:.2}",
                pool.cluster_id,
                pool.total_pax,
                pool.total_route_km,
                pool.score(),
                tier,
                pool.pricing.grand_total,
            );
            for rider in &pool.pricing.passengers {
                println!(
                    "    {:<6} {:>6.2} km  {:>7.2}",
                    rider.booking_id, rider.km_onboard, rider.total_price
                );
            }
        }
        for rejected in &outcome.ranking.rejected_pools {
            println!(
                "  rejected pool {}: {} {:?}",
                rejected.pool.cluster_id, rejected.reason, rejected.violations
            );
        }
    }
}
