use h3o::LatLng;

use crate::error::RoutingError;
use crate::geo::Coordinate;
use crate::routing::{RouteLeg, TripResponse};

use super::response::OsrmTripResponse;

pub(super) fn parse_trip_response(
    resp: OsrmTripResponse,
    requested: usize,
) -> Result<TripResponse, RoutingError> {
    if resp.code != "Ok" {
        let detail = resp.message.unwrap_or_default();
        return Err(RoutingError::Api(format!("{}: {}", resp.code, detail)));
    }

    let trip = resp
        .trips
        .and_then(|trips| trips.into_iter().next())
        .ok_or_else(|| RoutingError::InvalidResponse("response holds no trip".to_string()))?;
    let waypoints = resp.waypoints.unwrap_or_default();

    if waypoints.len() != requested {
        return Err(RoutingError::InvalidResponse(format!(
            "requested {} waypoints, response has {}",
            requested,
            waypoints.len()
        )));
    }
    if waypoints.iter().any(|wp| wp.trips_index != 0) {
        return Err(RoutingError::InvalidResponse(
            "waypoints were split across several trips".to_string(),
        ));
    }

    let mut order: Vec<Option<usize>> = vec![None; requested];
    for (input_idx, wp) in waypoints.iter().enumerate() {
        let slot = order.get_mut(wp.waypoint_index).ok_or_else(|| {
            RoutingError::InvalidResponse(format!(
                "waypoint_index {} out of range",
                wp.waypoint_index
            ))
        })?;
        if slot.replace(input_idx).is_some() {
            return Err(RoutingError::InvalidResponse(format!(
                "waypoint_index {} used twice",
                wp.waypoint_index
            )));
        }
    }
    let order: Vec<usize> = order.into_iter().flatten().collect();

    let legs = trip
        .legs
        .iter()
        .map(|leg| RouteLeg {
            distance_km: leg.distance / 1000.0,
            duration_minutes: leg.duration / 60.0,
        })
        .collect();

    // OSRM returns [lng, lat]; unusable points are skipped.
    let geometry = trip.geometry.map(|geometry| {
        geometry
            .coordinates
            .iter()
            .filter_map(|c| LatLng::new(c[1], c[0]).ok().map(Coordinate::from))
            .collect()
    });

    Ok(TripResponse {
        order,
        distance_km: trip.distance / 1000.0,
        duration_minutes: trip.duration / 60.0,
        legs,
        geometry,
    })
}
