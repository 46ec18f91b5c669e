#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pool_core::error::RoutingError;
use pool_core::geo::haversine_km;
use pool_core::routing::{RouteLeg, RoutingClient, TripResponse, Waypoint};

/// Shared call counter, readable after the client is boxed into an optimizer.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Visits waypoints in input order, reporting straight-line distances.
fn input_order_trip(waypoints: &[Waypoint]) -> TripResponse {
    let distance_km: f64 = waypoints
        .windows(2)
        .map(|pair| haversine_km(pair[0].coordinate(), pair[1].coordinate()))
        .sum();
    TripResponse {
        order: (0..waypoints.len()).collect(),
        distance_km,
        duration_minutes: distance_km / 50.0 * 60.0,
        legs: Vec::new(),
        geometry: None,
    }
}

/// Rate limits the first `failures` calls, then answers in input order.
pub struct FlakyClient {
    failures: usize,
    calls: CallCounter,
}

impl FlakyClient {
    pub fn new(failures: usize) -> (Self, CallCounter) {
        let calls = CallCounter::default();
        (
            Self {
                failures,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl RoutingClient for FlakyClient {
    fn compute_trip(&self, waypoints: &[Waypoint]) -> Result<TripResponse, RoutingError> {
        if self.calls.bump() < self.failures {
            return Err(RoutingError::RateLimited);
        }
        Ok(input_order_trip(waypoints))
    }
}

/// Fails every call with a non-retryable error.
pub struct BrokenClient {
    calls: CallCounter,
}

impl BrokenClient {
    pub fn new() -> (Self, CallCounter) {
        let calls = CallCounter::default();
        (
            Self {
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl RoutingClient for BrokenClient {
    fn compute_trip(&self, _waypoints: &[Waypoint]) -> Result<TripResponse, RoutingError> {
        self.calls.bump();
        Err(RoutingError::Unavailable("503 from test".to_string()))
    }
}

/// Answers in input order with road legs `factor` times the straight line,
/// driven at 50 km/h.
pub struct RoadFactorClient {
    factor: f64,
}

impl RoadFactorClient {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }
}

impl RoutingClient for RoadFactorClient {
    fn compute_trip(&self, waypoints: &[Waypoint]) -> Result<TripResponse, RoutingError> {
        let legs: Vec<RouteLeg> = waypoints
            .windows(2)
            .map(|pair| {
                let distance_km =
                    haversine_km(pair[0].coordinate(), pair[1].coordinate()) * self.factor;
                RouteLeg {
                    distance_km,
                    duration_minutes: distance_km / 50.0 * 60.0,
                }
            })
            .collect();
        Ok(TripResponse {
            order: (0..waypoints.len()).collect(),
            distance_km: legs.iter().map(|leg| leg.distance_km).sum(),
            duration_minutes: legs.iter().map(|leg| leg.duration_minutes).sum(),
            legs,
            geometry: None,
        })
    }
}
