//! Read-only booking records as delivered by the booking source.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, GeoPoint, PointMetadata};

/// One airport-transfer request. The coordinates are the rider's destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub luggage_count: Option<u32>,
    pub flight_id: String,
}

impl Booking {
    pub fn new(
        id: impl Into<String>,
        flight_id: impl Into<String>,
        destination: Coordinate,
        luggage_count: Option<u32>,
    ) -> Self {
        Self {
            id: id.into(),
            latitude: destination.latitude,
            longitude: destination.longitude,
            luggage_count,
            flight_id: flight_id.into(),
        }
    }

    pub fn destination(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn to_geo_point(&self) -> GeoPoint {
        GeoPoint {
            id: self.id.clone(),
            booking_id: self.id.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            metadata: PointMetadata {
                luggage_count: self.luggage_count,
                flight_id: Some(self.flight_id.clone()),
            },
        }
    }
}

/// Bucket bookings per flight, flights in lexical order, bookings in input order.
pub fn group_bookings_by_flight(bookings: &[Booking]) -> BTreeMap<String, Vec<Booking>> {
    let mut flights: BTreeMap<String, Vec<Booking>> = BTreeMap::new();
    for booking in bookings {
        flights
            .entry(booking.flight_id.clone())
            .or_default()
            .push(booking.clone());
    }
    flights
}
