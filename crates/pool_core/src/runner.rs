//! End-to-end pooling run for one flight, and parallel runs over many flights.
//!
//! A run is a chain of pure stages:
//! clustering → group rules → routing → rider metrics → pricing → ranking.
//! Input defects and pricing invariant violations abort the flight; routing
//! problems are absorbed by the optimizer's fallback.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::booking::{group_bookings_by_flight, Booking};
use crate::clustering::{Cluster, ClusteringStats, GeoClusterer};
use crate::config::PipelineConfig;
use crate::error::{InputError, PoolError};
use crate::geo::{Coordinate, GeoPoint};
use crate::metrics::PassengerMetricsCalculator;
use crate::pricing::{PassengerKm, PricingEngine};
use crate::quality::QualityScorer;
use crate::ranking::{PoolCandidate, PoolRanker, RankingResult};
use crate::routing::{RouteCache, RouteOptimizer, RoutingClient, Waypoint};
use crate::rules::ClusterRuleFilter;

/// All bookings of one flight, landing at `airport`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRequest {
    pub flight_id: String,
    pub airport_id: String,
    pub airport: Coordinate,
    pub bookings: Vec<Booking>,
}

impl FlightRequest {
    pub fn new(
        flight_id: impl Into<String>,
        airport_id: impl Into<String>,
        airport: Coordinate,
        bookings: Vec<Booking>,
    ) -> Self {
        Self {
            flight_id: flight_id.into(),
            airport_id: airport_id.into(),
            airport,
            bookings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOutcome {
    pub flight_id: String,
    pub clustering_stats: ClusteringStats,
    /// Bookings DBSCAN left unclustered.
    pub noise_booking_ids: Vec<String>,
    /// Clustered bookings the group rules could not place in a vehicle.
    pub dropped_booking_ids: Vec<String>,
    pub ranking: RankingResult,
}

pub struct FlightRunner {
    clusterer: GeoClusterer,
    rules: ClusterRuleFilter,
    optimizer: RouteOptimizer,
    metrics: PassengerMetricsCalculator,
    pricing: PricingEngine,
    ranker: PoolRanker,
}

impl FlightRunner {
    /// Runner with no routing service; routes use the greedy fallback.
    pub fn new(config: &PipelineConfig) -> Self {
        let pricing = PricingEngine::new(config.pricing.clone());
        Self {
            clusterer: GeoClusterer::new(config.clustering),
            rules: ClusterRuleFilter::new(config.group_rules),
            optimizer: RouteOptimizer::new(&config.routing),
            metrics: PassengerMetricsCalculator::new(config.routing.average_speed_kmh),
            ranker: PoolRanker::new(
                config.ranking,
                QualityScorer::new(config.quality),
                pricing.clone(),
            ),
            pricing,
        }
    }

    pub fn with_routing_client(mut self, client: Box<dyn RoutingClient>) -> Self {
        self.optimizer = self.optimizer.with_client(client);
        self
    }

    /// Share `cache` with other runners so parallel flights reuse routes.
    pub fn with_route_cache(mut self, cache: Arc<RouteCache>) -> Self {
        self.optimizer = self.optimizer.with_cache(cache);
        self
    }

    pub fn run_flight(&self, request: &FlightRequest) -> Result<FlightOutcome, PoolError> {
        if request.bookings.is_empty() {
            return Err(InputError::NoBookings {
                flight_id: request.flight_id.clone(),
            }
            .into());
        }
        request.airport.validate(&request.airport_id)?;
        for booking in &request.bookings {
            booking.destination().validate(&booking.id)?;
        }

        let points: Vec<GeoPoint> = request.bookings.iter().map(Booking::to_geo_point).collect();
        let clustering = self.clusterer.cluster_points(&points);
        let noise_booking_ids: Vec<String> =
            clustering.noise.iter().map(|p| p.booking_id.clone()).collect();

        let clustered: Vec<String> = clustering
            .clusters
            .iter()
            .flat_map(Cluster::booking_ids)
            .collect();
        let clusters = self.rules.filter(clustering.clusters);
        let kept: HashSet<&str> = clusters
            .iter()
            .flat_map(|c| c.points.iter().map(|p| p.booking_id.as_str()))
            .collect();
        let dropped_booking_ids: Vec<String> = clustered
            .iter()
            .filter(|id| !kept.contains(id.as_str()))
            .cloned()
            .collect();

        let by_id: HashMap<&str, &Booking> = request
            .bookings
            .iter()
            .map(|b| (b.id.as_str(), b))
            .collect();

        let mut candidates = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            candidates.push(self.build_candidate(request, cluster, &by_id)?);
        }
        debug!(
            flight_id = %request.flight_id,
            clusters = clusters.len(),
            noise = noise_booking_ids.len(),
            dropped = dropped_booking_ids.len(),
            "built pool candidates"
        );

        Ok(FlightOutcome {
            flight_id: request.flight_id.clone(),
            clustering_stats: clustering.stats,
            noise_booking_ids,
            dropped_booking_ids,
            ranking: self.ranker.rank_and_filter_pools(candidates),
        })
    }

    fn build_candidate(
        &self,
        request: &FlightRequest,
        cluster: &Cluster,
        by_id: &HashMap<&str, &Booking>,
    ) -> Result<PoolCandidate, PoolError> {
        let bookings: Vec<Booking> = cluster
            .points
            .iter()
            .map(|p| {
                by_id
                    .get(p.booking_id.as_str())
                    .map(|b| (*b).clone())
                    .ok_or_else(|| InputError::UnknownBooking {
                        booking_id: p.booking_id.clone(),
                    })
            })
            .collect::<Result<_, _>>()?;

        let mut waypoints = Vec::with_capacity(cluster.len() + 1);
        waypoints.push(Waypoint::airport(&request.airport_id, request.airport));
        waypoints.extend(cluster.points.iter().map(Waypoint::dropoff));

        let route = self.optimizer.optimize_route(&waypoints)?;
        let metrics = self.metrics.calculate(&route, &bookings)?;
        let passenger_kms: Vec<PassengerKm> = metrics
            .iter()
            .map(|m| PassengerKm::new(m.booking_id.clone(), m.km_onboard))
            .collect();
        let pricing = self.pricing.calculate(route.distance_km, &passenger_kms)?;
        if !pricing.validation.sum_matches_total {
            error!(
                flight_id = %request.flight_id,
                cluster_id = cluster.id,
                difference = pricing.validation.difference,
                "pricing invariant violated"
            );
            return Err(PoolError::PricingInvariant {
                cluster_id: cluster.id,
                difference: pricing.validation.difference,
            });
        }

        Ok(PoolCandidate::new(cluster, &route, &bookings, metrics, pricing))
    }

    /// Run every flight independently, results in input order.
    ///
    /// `num_threads` of `None` uses rayon's default pool size. If a dedicated
    /// pool cannot be built the flights run on the global pool.
    pub fn run_flights_parallel(
        &self,
        flights: &[FlightRequest],
        num_threads: Option<usize>,
    ) -> Vec<Result<FlightOutcome, PoolError>> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = num_threads {
            builder = builder.num_threads(threads);
        }
        let run_all = || -> Vec<Result<FlightOutcome, PoolError>> {
            flights
                .par_iter()
                .map(|flight| self.run_flight(flight))
                .collect()
        };
        match builder.build() {
            Ok(pool) => pool.install(run_all),
            Err(err) => {
                warn!(error = %err, "could not build flight thread pool, using the global pool");
                run_all()
            }
        }
    }
}

impl std::fmt::Debug for FlightRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightRunner")
            .field("clusterer", &self.clusterer)
            .field("optimizer", &self.optimizer)
            .field("ranker", &self.ranker)
            .finish_non_exhaustive()
    }
}

/// Split a mixed booking list into per-flight requests, all landing at `airport`.
pub fn requests_by_flight(
    airport_id: &str,
    airport: Coordinate,
    bookings: &[Booking],
) -> Vec<FlightRequest> {
    group_bookings_by_flight(bookings)
        .into_iter()
        .map(|(flight_id, bookings)| FlightRequest::new(flight_id, airport_id, airport, bookings))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::offset_km;

    const AIRPORT: Coordinate = Coordinate {
        latitude: 50.0379,
        longitude: 8.5622,
    };

    fn trio(flight: &str, prefix: &str) -> Vec<Booking> {
        [(26.0, 0.0), (28.0, 0.8), (30.0, -0.6)]
            .iter()
            .enumerate()
            .map(|(i, (north, east))| {
                Booking::new(
                    format!("{prefix}{i}"),
                    flight,
                    offset_km(AIRPORT, *north, *east),
                    Some(1),
                )
            })
            .collect()
    }

    #[test]
    fn empty_flight_is_an_input_error() {
        let runner = FlightRunner::new(&PipelineConfig::default());
        let request = FlightRequest::new("LH1", "FRA", AIRPORT, Vec::new());
        assert_eq!(
            runner.run_flight(&request),
            Err(PoolError::Input(InputError::NoBookings {
                flight_id: "LH1".to_string()
            }))
        );
    }

    #[test]
    fn invalid_booking_coordinate_aborts_the_flight() {
        let runner = FlightRunner::new(&PipelineConfig::default());
        let mut bookings = trio("LH1", "b");
        bookings[1].latitude = 123.0;
        let request = FlightRequest::new("LH1", "FRA", AIRPORT, bookings);
        assert!(matches!(
            runner.run_flight(&request),
            Err(PoolError::Input(InputError::InvalidCoordinate { .. }))
        ));
    }

    #[test]
    fn cluster_point_without_booking_is_reported_as_unknown() {
        let runner = FlightRunner::new(&PipelineConfig::default());
        let bookings = trio("LH1", "b");
        let request = FlightRequest::new("LH1", "FRA", AIRPORT, bookings.clone());
        let points: Vec<GeoPoint> = bookings.iter().map(Booking::to_geo_point).collect();
        let cluster = Cluster::from_points(0, points).expect("cluster");
        let by_id: HashMap<&str, &Booking> =
            bookings[..2].iter().map(|b| (b.id.as_str(), b)).collect();

        assert_eq!(
            runner.build_candidate(&request, &cluster, &by_id).err(),
            Some(PoolError::Input(InputError::UnknownBooking {
                booking_id: "b2".to_string()
            }))
        );
    }

    #[test]
    fn trio_becomes_one_confirmable_pool() {
        let runner = FlightRunner::new(&PipelineConfig::default());
        let mut bookings = trio("LH1", "b");
        bookings.push(Booking::new("lonely", "LH1", offset_km(AIRPORT, -40.0, 0.0), None));
        let outcome = runner
            .run_flight(&FlightRequest::new("LH1", "FRA", AIRPORT, bookings))
            .expect("outcome");

        assert_eq!(outcome.noise_booking_ids, vec!["lonely".to_string()]);
        assert!(outcome.dropped_booking_ids.is_empty());
        assert_eq!(outcome.ranking.confirmable_pools.len(), 1);
        let pool = &outcome.ranking.confirmable_pools[0];
        assert_eq!(pool.total_pax, 3);
        assert_eq!(pool.waypoint_count, 4);
        assert!(pool.pricing.validation.sum_matches_total);
        assert!(pool.booking_ids.iter().all(|id| id.starts_with('b')));
    }

    #[test]
    fn parallel_runs_match_sequential_runs() {
        let runner = FlightRunner::new(&PipelineConfig::default());
        let flights: Vec<FlightRequest> = ["LH1", "LH2", "LH3"]
            .iter()
            .map(|f| FlightRequest::new(*f, "FRA", AIRPORT, trio(f, f)))
            .collect();

        let parallel = runner.run_flights_parallel(&flights, Some(2));
        let sequential: Vec<_> = flights.iter().map(|f| runner.run_flight(f)).collect();
        assert_eq!(parallel, sequential);
        for (outcome, flight) in parallel.iter().zip(&flights) {
            let outcome = outcome.as_ref().expect("outcome");
            assert_eq!(outcome.flight_id, flight.flight_id);
        }
    }

    #[test]
    fn requests_are_split_per_flight() {
        let mut bookings = trio("LH2", "x");
        bookings.extend(trio("BA9", "y"));
        let requests = requests_by_flight("FRA", AIRPORT, &bookings);
        let ids: Vec<&str> = requests.iter().map(|r| r.flight_id.as_str()).collect();
        assert_eq!(ids, vec!["BA9", "LH2"]);
        assert!(requests.iter().all(|r| r.bookings.len() == 3));
    }
}
