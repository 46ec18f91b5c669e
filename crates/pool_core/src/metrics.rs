//! Per-rider distance and time metrics derived from an ordered route.

use serde::{Deserialize, Serialize};

use crate::booking::Booking;
use crate::error::InputError;
use crate::geo::{haversine_km, minutes_at_speed};
use crate::routing::{haversine_legs, Route, RouteLeg, WaypointKind, DEFAULT_AVERAGE_SPEED_KMH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerMetrics {
    pub booking_id: String,
    pub km_onboard: f64,
    pub direct_distance_km: f64,
    pub detour_percent: f64,
    pub extra_time_minutes: f64,
    pub pickup_index: usize,
    pub dropoff_index: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct PassengerMetricsCalculator {
    average_speed_kmh: f64,
}

impl Default for PassengerMetricsCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_AVERAGE_SPEED_KMH)
    }
}

impl PassengerMetricsCalculator {
    pub fn new(average_speed_kmh: f64) -> Self {
        Self { average_speed_kmh }
    }

    /// Metrics for every booking, in booking order.
    ///
    /// Distances are great-circle segments between consecutive stops, so
    /// on-board and direct distance share one metric whatever the route's
    /// source. Times use the route's own leg durations when it carries them;
    /// the direct time is the direct distance at the pace the rider actually
    /// travelled on board.
    pub fn calculate(
        &self,
        route: &Route,
        bookings: &[Booking],
    ) -> Result<Vec<PassengerMetrics>, InputError> {
        let straight = haversine_legs(&route.ordered_waypoints, self.average_speed_kmh);
        let timed: &[RouteLeg] = if route.legs.len() == straight.len() {
            &route.legs
        } else {
            &straight
        };
        let origin = route
            .ordered_waypoints
            .first()
            .map(|w| w.coordinate())
            .ok_or(InputError::NoDropoffs)?;

        bookings
            .iter()
            .map(|booking| {
                let pickup_index = pickup_index(route, &booking.id)?;
                let dropoff_index = dropoff_index(route, &booking.id)?;
                if dropoff_index <= pickup_index {
                    return Err(InputError::DropoffBeforePickup {
                        booking_id: booking.id.clone(),
                        pickup_index,
                        dropoff_index,
                    });
                }

                let km_onboard: f64 = straight[pickup_index..dropoff_index]
                    .iter()
                    .map(|leg| leg.distance_km)
                    .sum();
                let minutes_onboard: f64 = timed[pickup_index..dropoff_index]
                    .iter()
                    .map(|leg| leg.duration_minutes)
                    .sum();

                let direct_distance_km = haversine_km(origin, booking.destination());
                let direct_minutes =
                    self.direct_minutes(direct_distance_km, km_onboard, minutes_onboard);

                Ok(PassengerMetrics {
                    booking_id: booking.id.clone(),
                    km_onboard,
                    direct_distance_km,
                    detour_percent: detour_percent(km_onboard, direct_distance_km),
                    extra_time_minutes: minutes_onboard - direct_minutes,
                    pickup_index,
                    dropoff_index,
                })
            })
            .collect()
    }

    fn direct_minutes(&self, direct_km: f64, km_onboard: f64, minutes_onboard: f64) -> f64 {
        if km_onboard > 0.0 && minutes_onboard > 0.0 {
            direct_km * minutes_onboard / km_onboard
        } else {
            minutes_at_speed(direct_km, self.average_speed_kmh)
        }
    }
}

/// Excess of on-board over direct distance, in percent.
///
/// Zero when the direct distance is zero.
pub fn detour_percent(km_onboard: f64, direct_distance_km: f64) -> f64 {
    if direct_distance_km <= 0.0 {
        return 0.0;
    }
    (km_onboard - direct_distance_km) / direct_distance_km * 100.0
}

/// Riders board at the airport unless the route has a dedicated pickup stop for them.
fn pickup_index(route: &Route, booking_id: &str) -> Result<usize, InputError> {
    let waypoints = &route.ordered_waypoints;
    waypoints
        .iter()
        .position(|w| {
            w.kind == WaypointKind::Pickup && w.booking_id.as_deref() == Some(booking_id)
        })
        .or_else(|| waypoints.iter().position(|w| w.kind == WaypointKind::Airport))
        .ok_or_else(|| InputError::MissingPickup {
            booking_id: booking_id.to_string(),
        })
}

fn dropoff_index(route: &Route, booking_id: &str) -> Result<usize, InputError> {
    route
        .ordered_waypoints
        .iter()
        .position(|w| {
            w.kind == WaypointKind::Dropoff && w.booking_id.as_deref() == Some(booking_id)
        })
        .ok_or_else(|| InputError::MissingDropoff {
            booking_id: booking_id.to_string(),
        })
}

/// Metrics with the default 50 km/h reference speed.
pub fn calculate_passenger_metrics(
    route: &Route,
    bookings: &[Booking],
) -> Result<Vec<PassengerMetrics>, InputError> {
    PassengerMetricsCalculator::default().calculate(route, bookings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{offset_km, Coordinate};
    use crate::routing::{greedy_route, Waypoint};

    fn airport() -> Coordinate {
        Coordinate::new(50.0379, 8.5622)
    }

    fn booking_north(id: &str, km: f64, east_km: f64) -> Booking {
        Booking::new(id, "LH400", offset_km(airport(), km, east_km), None)
    }

    fn route_for(bookings: &[Booking]) -> Route {
        let mut waypoints = vec![Waypoint::airport("FRA", airport())];
        waypoints.extend(bookings.iter().map(|b| Waypoint::dropoff(&b.to_geo_point())));
        greedy_route(&waypoints, DEFAULT_AVERAGE_SPEED_KMH)
    }

    #[test]
    fn first_rider_on_straight_line_has_no_detour() {
        let bookings = vec![
            booking_north("near", 10.0, 0.0),
            booking_north("far", 20.0, 0.0),
        ];
        let metrics =
            calculate_passenger_metrics(&route_for(&bookings), &bookings).expect("metrics");

        assert_eq!(metrics[0].pickup_index, 0);
        assert_eq!(metrics[0].dropoff_index, 1);
        assert!(metrics[0].detour_percent.abs() < 0.01);
        assert!(metrics[0].extra_time_minutes.abs() < 0.01);
        assert_eq!(metrics[1].dropoff_index, 2);
        assert!((metrics[1].km_onboard - 20.0).abs() < 0.05);
    }

    #[test]
    fn sideways_stop_adds_detour_for_later_rider() {
        let bookings = vec![
            booking_north("side", 10.0, 5.0),
            booking_north("end", 20.0, 0.0),
        ];
        let metrics =
            calculate_passenger_metrics(&route_for(&bookings), &bookings).expect("metrics");
        let end = &metrics[1];
        assert!(end.km_onboard > end.direct_distance_km);
        assert!(end.detour_percent > 0.0);
        // 50 km/h: one extra km costs 1.2 minutes.
        let extra_km = end.km_onboard - end.direct_distance_km;
        assert!((end.extra_time_minutes - extra_km * 1.2).abs() < 1e-6);
    }

    #[test]
    fn missing_dropoff_is_an_input_error() {
        let bookings = vec![booking_north("a", 10.0, 0.0)];
        let route = route_for(&bookings);
        let stranger = vec![booking_north("ghost", 12.0, 0.0)];
        assert_eq!(
            calculate_passenger_metrics(&route, &stranger),
            Err(InputError::MissingDropoff {
                booking_id: "ghost".to_string()
            })
        );
    }

    #[test]
    fn road_legs_do_not_count_as_detour() {
        let bookings = vec![
            booking_north("b1", 26.0, 0.0),
            booking_north("b2", 27.0, 0.0),
            booking_north("b3", 28.0, 0.0),
        ];
        let mut route = route_for(&bookings);
        // Roads 30% longer than the crow flies, driven at 50 km/h.
        for leg in &mut route.legs {
            leg.distance_km *= 1.3;
            leg.duration_minutes *= 1.3;
        }
        route.distance_km *= 1.3;

        let metrics = calculate_passenger_metrics(&route, &bookings).expect("metrics");
        for m in &metrics {
            assert!(m.detour_percent.abs() < 0.01, "{}: {}", m.booking_id, m.detour_percent);
            assert!(m.extra_time_minutes.abs() < 0.01);
            assert!((m.km_onboard - m.direct_distance_km).abs() < 0.01);
        }
    }

    #[test]
    fn road_legs_price_the_time_of_a_real_detour() {
        let bookings = vec![
            booking_north("side", 10.0, 5.0),
            booking_north("end", 20.0, 0.0),
        ];
        let mut route = route_for(&bookings);
        for leg in &mut route.legs {
            leg.duration_minutes *= 2.0;
        }

        let metrics = calculate_passenger_metrics(&route, &bookings).expect("metrics");
        let end = &metrics[1];
        let onboard_minutes: f64 = route.legs.iter().map(|leg| leg.duration_minutes).sum();
        let expected = onboard_minutes * (1.0 - end.direct_distance_km / end.km_onboard);
        assert!(end.extra_time_minutes > 0.0);
        assert!((end.extra_time_minutes - expected).abs() < 1e-9);
    }

    #[test]
    fn dropoff_ahead_of_pickup_is_an_ordering_error() {
        let bookings = vec![booking_north("a", 10.0, 0.0)];
        let mut route = route_for(&bookings);
        let mut pickup = route.ordered_waypoints[1].clone();
        pickup.id = "a-pickup".to_string();
        pickup.kind = WaypointKind::Pickup;
        route.ordered_waypoints.push(pickup);

        assert_eq!(
            calculate_passenger_metrics(&route, &bookings),
            Err(InputError::DropoffBeforePickup {
                booking_id: "a".to_string(),
                pickup_index: 2,
                dropoff_index: 1,
            })
        );
    }

    #[test]
    fn detour_percent_guards_zero_direct_distance() {
        assert_eq!(detour_percent(3.0, 0.0), 0.0);
        assert!((detour_percent(12.0, 10.0) - 20.0).abs() < 1e-9);
    }
}
