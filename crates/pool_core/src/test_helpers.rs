//! Shared fixtures for unit tests, integration tests and benches.
//!
//! Geography is laid out relative to a fixed airport so distances in tests
//! read as plain kilometres.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::booking::Booking;
use crate::geo::{offset_km, Coordinate, GeoPoint};
use crate::routing::Waypoint;

pub const TEST_AIRPORT_ID: &str = "FRA";

/// Frankfurt airport.
pub const TEST_AIRPORT: Coordinate = Coordinate {
    latitude: 50.0379,
    longitude: 8.5622,
};

pub const TEST_FLIGHT_ID: &str = "LH400";

/// Booking whose destination is `north_km`/`east_km` away from the test airport.
pub fn booking_at(id: &str, north_km: f64, east_km: f64) -> Booking {
    Booking::new(
        id,
        TEST_FLIGHT_ID,
        offset_km(TEST_AIRPORT, north_km, east_km),
        None,
    )
}

/// Three bookings between 26 and 29 km north of the airport, mutually within 2 km.
pub fn three_rider_corridor() -> Vec<Booking> {
    vec![
        booking_at("b1", 26.5, 0.0),
        booking_at("b2", 27.5, 0.5),
        booking_at("b3", 28.3, -0.2),
    ]
}

/// `count` bookings on a circle of `radius_km` around `center`, for a flight.
pub fn booking_ring(
    flight_id: &str,
    prefix: &str,
    center: Coordinate,
    radius_km: f64,
    count: usize,
) -> Vec<Booking> {
    (0..count)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / count.max(1) as f64;
            Booking::new(
                format!("{prefix}{i}"),
                flight_id,
                offset_km(center, radius_km * angle.cos(), radius_km * angle.sin()),
                Some((i % 4) as u32),
            )
        })
        .collect()
}

/// Reproducible bookings scattered within `spread_km` of the test airport.
pub fn seeded_bookings(seed: u64, count: usize, spread_km: f64) -> Vec<Booking> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let north = rng.gen_range(-spread_km..=spread_km);
            let east = rng.gen_range(-spread_km..=spread_km);
            let luggage = rng.gen_range(0..=5);
            Booking::new(
                format!("s{i}"),
                TEST_FLIGHT_ID,
                offset_km(TEST_AIRPORT, north, east),
                Some(luggage),
            )
        })
        .collect()
}

pub fn geo_points(bookings: &[Booking]) -> Vec<GeoPoint> {
    bookings.iter().map(Booking::to_geo_point).collect()
}

/// Airport followed by one drop-off per booking, in booking order.
pub fn airport_waypoints(bookings: &[Booking]) -> Vec<Waypoint> {
    let mut waypoints = vec![Waypoint::airport(TEST_AIRPORT_ID, TEST_AIRPORT)];
    waypoints.extend(bookings.iter().map(|b| Waypoint::dropoff(&b.to_geo_point())));
    waypoints
}
