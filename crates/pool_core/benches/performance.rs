//! Performance benchmarks for pool_core using Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pool_core::clustering::GeoClusterer;
use pool_core::ranking::PoolRanker;
use pool_core::routing::{greedy_route, DEFAULT_AVERAGE_SPEED_KMH};
use pool_core::test_helpers::{
    airport_waypoints, geo_points, seeded_bookings, TEST_AIRPORT, TEST_AIRPORT_ID, TEST_FLIGHT_ID,
};
use pool_core::{FlightRequest, FlightRunner, PipelineConfig};

fn bench_clustering(c: &mut Criterion) {
    let clusterer = GeoClusterer::default();
    let mut group = c.benchmark_group("dbscan");
    for size in [20, 100, 400] {
        let points = geo_points(&seeded_bookings(42, size, 30.0));
        group.bench_with_input(BenchmarkId::from_parameter(size), &points, |b, points| {
            b.iter(|| black_box(clusterer.cluster_points(points)));
        });
    }
    group.finish();
}

fn bench_greedy_route(c: &mut Criterion) {
    let waypoints = airport_waypoints(&seeded_bookings(7, 7, 10.0));
    c.bench_function("greedy_route_7_stops", |b| {
        b.iter(|| black_box(greedy_route(&waypoints, DEFAULT_AVERAGE_SPEED_KMH)));
    });
}

fn bench_flight_pipeline(c: &mut Criterion) {
    let runner = FlightRunner::new(&PipelineConfig::default());
    let mut group = c.benchmark_group("flight_pipeline");
    for size in [12, 60, 200] {
        let request = FlightRequest::new(
            TEST_FLIGHT_ID,
            TEST_AIRPORT_ID,
            TEST_AIRPORT,
            seeded_bookings(99, size, 25.0),
        );
        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, request| {
            b.iter(|| black_box(runner.run_flight(request)));
        });
    }
    group.finish();
}

fn bench_ranking(c: &mut Criterion) {
    let runner = FlightRunner::new(&PipelineConfig::default());
    let request = FlightRequest::new(
        TEST_FLIGHT_ID,
        TEST_AIRPORT_ID,
        TEST_AIRPORT,
        seeded_bookings(5, 200, 25.0),
    );
    let Ok(outcome) = runner.run_flight(&request) else {
        return;
    };
    let candidates: Vec<_> = outcome
        .ranking
        .confirmable_pools
        .into_iter()
        .chain(outcome.ranking.rejected_pools.into_iter().map(|r| r.pool))
        .collect();
    let ranker = PoolRanker::default();
    c.bench_function("rank_and_filter_pools", |b| {
        b.iter(|| black_box(ranker.rank_and_filter_pools(candidates.clone())));
    });
}

criterion_group!(
    benches,
    bench_clustering,
    bench_greedy_route,
    bench_flight_pipeline,
    bench_ranking
);
criterion_main!(benches);
