//! Route sequencing: order the airport and drop-offs into a single trip.
//!
//! The primary path asks an external routing service (any [`RoutingClient`])
//! to optimise the trip with the airport fixed as source. Rate-limit responses
//! are retried according to a [`RetryPolicy`]; any remaining failure falls back
//! to a deterministic greedy nearest-neighbour ordering, so sequencing always
//! produces a route.
//!
//! Successful service routes can be memoised in an injected [`RouteCache`].

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{InputError, RoutingError};
use crate::geo::{haversine_km, minutes_at_speed, Coordinate, GeoPoint};

pub mod cache;
#[cfg(feature = "osrm")]
pub mod osrm_trip;

pub use cache::RouteCache;

/// Average speed used to turn fallback distances into durations.
pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 50.0;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
/// One hour.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointKind {
    Airport,
    Pickup,
    Dropoff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub kind: WaypointKind,
    pub booking_id: Option<String>,
    pub address: Option<String>,
}

impl Waypoint {
    pub fn airport(id: impl Into<String>, location: Coordinate) -> Self {
        Self {
            id: id.into(),
            latitude: location.latitude,
            longitude: location.longitude,
            kind: WaypointKind::Airport,
            booking_id: None,
            address: None,
        }
    }

    pub fn dropoff(point: &GeoPoint) -> Self {
        Self {
            id: point.id.clone(),
            latitude: point.latitude,
            longitude: point.longitude,
            kind: WaypointKind::Dropoff,
            booking_id: Some(point.booking_id.clone()),
            address: None,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// One segment between consecutive waypoints of a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub distance_km: f64,
    pub duration_minutes: f64,
}

/// Where a route came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteSource {
    Service,
    Cache,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub distance_km: f64,
    pub duration_minutes: f64,
    pub ordered_waypoints: Vec<Waypoint>,
    /// `visit_order[k]` is the request index of `ordered_waypoints[k]`.
    pub visit_order: Vec<usize>,
    /// `ordered_waypoints.len() - 1` legs, in route order.
    pub legs: Vec<RouteLeg>,
    pub geometry: Option<Vec<Coordinate>>,
    pub source: RouteSource,
}

/// Raw answer of a trip-optimisation call.
#[derive(Debug, Clone, PartialEq)]
pub struct TripResponse {
    /// `order[k]` is the input index of the waypoint visited k-th.
    pub order: Vec<usize>,
    pub distance_km: f64,
    pub duration_minutes: f64,
    /// Per-leg values in visiting order; may be empty if the service omits them.
    pub legs: Vec<RouteLeg>,
    pub geometry: Option<Vec<Coordinate>>,
}

/// External trip-optimisation capability.
///
/// Implementations solve an open trip over `waypoints` with the first
/// waypoint as fixed source, free destination and no return to origin.
/// They must be `Send + Sync` so one optimizer can serve parallel flights.
pub trait RoutingClient: Send + Sync {
    fn compute_trip(&self, waypoints: &[Waypoint]) -> Result<TripResponse, RoutingError>;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Exponential backoff applied to rate-limited routing calls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Same retry count with no waiting, for tests and offline batch runs.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay before retry number `retry` (0-based): base × multiplier^retry.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(retry as i32);
        Duration::from_millis((self.base_delay_ms as f64 * factor).round() as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub average_speed_kmh: f64,
    pub retry: RetryPolicy,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            average_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
            retry: RetryPolicy::default(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// Orders waypoints into a route, never failing on routing-service problems.
pub struct RouteOptimizer {
    client: Option<Box<dyn RoutingClient>>,
    cache: Option<Arc<RouteCache>>,
    retry: RetryPolicy,
    average_speed_kmh: f64,
}

impl RouteOptimizer {
    /// Optimizer with no routing service: every route is the greedy fallback.
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            client: None,
            cache: None,
            retry: config.retry,
            average_speed_kmh: config.average_speed_kmh,
        }
    }

    pub fn with_client(mut self, client: Box<dyn RoutingClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_cache(mut self, cache: Arc<RouteCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn average_speed_kmh(&self) -> f64 {
        self.average_speed_kmh
    }

    /// Sequence `waypoints` (airport first) into a route.
    ///
    /// Only malformed input is an error; routing-service failures degrade to
    /// [`greedy_route`].
    pub fn optimize_route(&self, waypoints: &[Waypoint]) -> Result<Route, InputError> {
        validate_waypoints(waypoints)?;

        let Some(client) = self.client.as_deref() else {
            return Ok(greedy_route(waypoints, self.average_speed_kmh));
        };

        let key = RouteCache::key_for(waypoints);
        if let Some(cache) = &self.cache {
            if let Some(route) = cache.get(&key).and_then(|r| reapply_order(r, waypoints)) {
                debug!(waypoints = waypoints.len(), "route cache hit");
                return Ok(route);
            }
        }

        match self.call_with_retry(client, waypoints) {
            Ok(route) => {
                if let Some(cache) = &self.cache {
                    cache.set(key, route.clone());
                }
                Ok(route)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    waypoints = waypoints.len(),
                    "routing service failed, using greedy fallback"
                );
                Ok(greedy_route(waypoints, self.average_speed_kmh))
            }
        }
    }

    fn call_with_retry(
        &self,
        client: &dyn RoutingClient,
        waypoints: &[Waypoint],
    ) -> Result<Route, RoutingError> {
        let mut retry = 0;
        loop {
            let attempt = client
                .compute_trip(waypoints)
                .and_then(|trip| route_from_trip(waypoints, trip, self.average_speed_kmh));
            match attempt {
                Ok(route) => return Ok(route),
                Err(err) if err.is_retryable() && retry < self.retry.max_retries => {
                    let delay = self.retry.delay_for_retry(retry);
                    debug!(
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        "routing rate limited, backing off"
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl std::fmt::Debug for RouteOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteOptimizer")
            .field("has_client", &self.client.is_some())
            .field("has_cache", &self.cache.is_some())
            .field("retry", &self.retry)
            .field("average_speed_kmh", &self.average_speed_kmh)
            .finish()
    }
}

fn validate_waypoints(waypoints: &[Waypoint]) -> Result<(), InputError> {
    let first = waypoints.first().ok_or(InputError::NoDropoffs)?;
    if first.kind != WaypointKind::Airport {
        return Err(InputError::AirportNotFirst {
            found: first.id.clone(),
        });
    }
    if waypoints.len() < 2 {
        return Err(InputError::NoDropoffs);
    }
    for waypoint in waypoints {
        waypoint.coordinate().validate(&waypoint.id)?;
    }
    Ok(())
}

/// Cached routes are keyed by coordinates only, so the waypoints (and their
/// booking ids) are taken from the current request.
fn reapply_order(mut route: Route, waypoints: &[Waypoint]) -> Option<Route> {
    if route.visit_order.len() != waypoints.len() {
        return None;
    }
    route.ordered_waypoints = route
        .visit_order
        .iter()
        .map(|&idx| waypoints.get(idx).cloned())
        .collect::<Option<Vec<_>>>()?;
    route.source = RouteSource::Cache;
    Some(route)
}

/// Turn a service answer into a route, rejecting anything inconsistent with the request.
fn route_from_trip(
    waypoints: &[Waypoint],
    trip: TripResponse,
    average_speed_kmh: f64,
) -> Result<Route, RoutingError> {
    if trip.order.len() != waypoints.len() {
        return Err(RoutingError::InvalidResponse(format!(
            "expected {} waypoints in trip order, got {}",
            waypoints.len(),
            trip.order.len()
        )));
    }
    let mut seen = HashSet::with_capacity(trip.order.len());
    if !trip
        .order
        .iter()
        .all(|&idx| idx < waypoints.len() && seen.insert(idx))
    {
        return Err(RoutingError::InvalidResponse(
            "trip order is not a permutation of the request".to_string(),
        ));
    }
    if trip.order.first() != Some(&0) {
        return Err(RoutingError::InvalidResponse(
            "trip does not start at the airport".to_string(),
        ));
    }
    if !trip.distance_km.is_finite() || trip.distance_km < 0.0 {
        return Err(RoutingError::InvalidResponse(format!(
            "invalid trip distance {}",
            trip.distance_km
        )));
    }

    let ordered_waypoints: Vec<Waypoint> =
        trip.order.iter().map(|&idx| waypoints[idx].clone()).collect();
    let legs = if trip.legs.len() == ordered_waypoints.len() - 1 {
        trip.legs
    } else {
        haversine_legs(&ordered_waypoints, average_speed_kmh)
    };

    Ok(Route {
        distance_km: trip.distance_km,
        duration_minutes: trip.duration_minutes,
        ordered_waypoints,
        visit_order: trip.order,
        legs,
        geometry: trip.geometry,
        source: RouteSource::Service,
    })
}

/// Straight-line legs between consecutive waypoints at a constant speed.
pub(crate) fn haversine_legs(ordered: &[Waypoint], average_speed_kmh: f64) -> Vec<RouteLeg> {
    ordered
        .windows(2)
        .map(|pair| {
            let distance_km = haversine_km(pair[0].coordinate(), pair[1].coordinate());
            RouteLeg {
                distance_km,
                duration_minutes: minutes_at_speed(distance_km, average_speed_kmh),
            }
        })
        .collect()
}

/// Greedy nearest-neighbour ordering starting at the first waypoint.
///
/// Ties keep the earlier input waypoint. Distance is the sum of haversine
/// legs; duration assumes `average_speed_kmh` throughout.
pub fn greedy_route(waypoints: &[Waypoint], average_speed_kmh: f64) -> Route {
    let mut remaining: Vec<usize> = (1..waypoints.len()).collect();
    let mut visit_order: Vec<usize> = Vec::with_capacity(waypoints.len());
    if !waypoints.is_empty() {
        visit_order.push(0);
    }

    while let Some(current) = visit_order.last().map(|&idx| waypoints[idx].coordinate()) {
        let mut nearest: Option<(usize, f64)> = None;
        for (pos, &candidate) in remaining.iter().enumerate() {
            let distance = haversine_km(current, waypoints[candidate].coordinate());
            let closer = match nearest {
                Some((_, best)) => distance < best,
                None => true,
            };
            if closer {
                nearest = Some((pos, distance));
            }
        }
        let Some((pos, _)) = nearest else { break };
        visit_order.push(remaining.remove(pos));
    }
    let ordered: Vec<Waypoint> = visit_order.iter().map(|&idx| waypoints[idx].clone()).collect();

    let legs = haversine_legs(&ordered, average_speed_kmh);
    let distance_km: f64 = legs.iter().map(|leg| leg.distance_km).sum();
    Route {
        distance_km,
        duration_minutes: minutes_at_speed(distance_km, average_speed_kmh),
        ordered_waypoints: ordered,
        visit_order,
        legs,
        geometry: None,
        source: RouteSource::Fallback,
    }
}

/// Sequence with no routing service, using the default average speed.
pub fn optimize_route(waypoints: &[Waypoint]) -> Result<Route, InputError> {
    RouteOptimizer::new(&RoutingConfig::default()).optimize_route(waypoints)
}
