mod support;

use pool_core::clustering::GeoClusterer;
use pool_core::geo::haversine_km;
use pool_core::metrics::calculate_passenger_metrics;
use pool_core::pricing::{calculate_pricing, PassengerKm, DEFAULT_PLATFORM_RATE_SHORT};
use pool_core::quality::StabilityTier;
use pool_core::routing::{optimize_route, RouteSource};
use pool_core::rules::filter_clusters_by_business_rules;
use pool_core::test_helpers::{
    airport_waypoints, geo_points, seeded_bookings, three_rider_corridor, TEST_AIRPORT,
    TEST_AIRPORT_ID, TEST_FLIGHT_ID,
};
use pool_core::{FlightRequest, FlightRunner, PipelineConfig};

#[test]
fn corridor_trio_runs_stage_by_stage() {
    let bookings = three_rider_corridor();

    let clustering = GeoClusterer::default().cluster_points(&geo_points(&bookings));
    assert_eq!(clustering.clusters.len(), 1);
    assert!(clustering.noise.is_empty());
    let clusters = filter_clusters_by_business_rules(clustering.clusters);
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].len(), 3);

    let route = optimize_route(&airport_waypoints(&bookings)).expect("route");
    assert_eq!(route.source, RouteSource::Fallback);
    let distances: Vec<f64> = route.ordered_waypoints[1..]
        .iter()
        .map(|w| haversine_km(TEST_AIRPORT, w.coordinate()))
        .collect();
    assert!(distances.windows(2).all(|w| w[0] < w[1]));

    let metrics = calculate_passenger_metrics(&route, &bookings).expect("metrics");
    assert_eq!(metrics.len(), 3);
    assert!(metrics.iter().all(|m| m.detour_percent < 5.0));
}

#[test]
fn pricing_example_splits_driver_cost_equally() {
    let riders = vec![
        PassengerKm::new("b1", 26.0),
        PassengerKm::new("b2", 28.0),
        PassengerKm::new("b3", 30.0),
    ];
    let pricing = calculate_pricing(36.5, &riders).expect("pricing");

    let share = (36.5_f64 * 2.00 / 3.0 * 100.0).round() / 100.0;
    for (rider, p) in riders.iter().zip(&pricing.passengers) {
        assert_eq!(p.driver_cost, share);
        assert_eq!(p.breakdown.platform_rate, DEFAULT_PLATFORM_RATE_SHORT);
        let fee = (rider.km_onboard * DEFAULT_PLATFORM_RATE_SHORT * 100.0).round() / 100.0;
        assert_eq!(p.platform_fee, fee);
    }
    let total_cents: i64 = pricing
        .passengers
        .iter()
        .map(|p| (p.total_price * 100.0).round() as i64)
        .sum();
    assert_eq!(total_cents, (pricing.grand_total * 100.0).round() as i64);
    assert!(pricing.validation.sum_matches_total);
}

#[test]
fn corridor_trio_is_an_excellent_pool() {
    let runner = FlightRunner::new(&PipelineConfig::default());
    let request = FlightRequest::new(
        TEST_FLIGHT_ID,
        TEST_AIRPORT_ID,
        TEST_AIRPORT,
        three_rider_corridor(),
    );
    let outcome = runner.run_flight(&request).expect("outcome");

    assert_eq!(outcome.clustering_stats.cluster_count, 1);
    assert_eq!(outcome.ranking.confirmable_pools.len(), 1);
    assert!(outcome.ranking.rejected_pools.is_empty());

    let pool = &outcome.ranking.confirmable_pools[0];
    assert_eq!(pool.total_pax, 3);
    assert_eq!(pool.stability_tier, Some(StabilityTier::Excellent));
    let score = pool.quality_score.as_ref().expect("scored");
    assert!(score.overall >= 60.0, "score {}", score.overall);
    assert!(score.is_valid());
    assert!(pool.pricing.validation.sum_matches_total);
}

#[test]
fn scattered_flight_accounts_for_every_booking() {
    let bookings = seeded_bookings(42, 60, 15.0);
    let request = FlightRequest::new(
        TEST_FLIGHT_ID,
        TEST_AIRPORT_ID,
        TEST_AIRPORT,
        bookings.clone(),
    );
    let runner = FlightRunner::new(&support::fast_config());
    let outcome = runner.run_flight(&request).expect("outcome");

    let mut seen: Vec<String> = outcome
        .noise_booking_ids
        .iter()
        .chain(&outcome.dropped_booking_ids)
        .cloned()
        .collect();
    for pool in &outcome.ranking.confirmable_pools {
        assert!((2..=7).contains(&pool.total_pax));
        assert!(pool.pricing.validation.sum_matches_total);
        if pool.total_pax == 2 {
            assert!(pool.score() >= 70.0);
        }
        seen.extend(pool.booking_ids.iter().cloned());
    }
    for rejected in &outcome.ranking.rejected_pools {
        assert!(!rejected.reason.is_empty());
        seen.extend(rejected.pool.booking_ids.iter().cloned());
    }
    seen.sort();
    let mut expected: Vec<String> = bookings.iter().map(|b| b.id.clone()).collect();
    expected.sort();
    assert_eq!(seen, expected);

    let again = runner.run_flight(&request).expect("outcome");
    assert_eq!(again, outcome);
}
