//! Geographic primitives: coordinates, drop-off points and great-circle distance.
//!
//! All distances are haversine distances on a sphere of radius
//! [`EARTH_RADIUS_KM`]. Travel time estimates assume a constant average speed.

use h3o::LatLng;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Mean Earth radius used by every distance calculation in the crate.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Reject NaN/infinite or out-of-range coordinates.
    pub fn validate(&self, id: &str) -> Result<(), InputError> {
        let in_range = self.latitude.abs() <= 90.0 && self.longitude.abs() <= 180.0;
        match LatLng::new(self.latitude, self.longitude) {
            Ok(_) if in_range => Ok(()),
            _ => Err(InputError::InvalidCoordinate {
                id: id.to_string(),
                latitude: self.latitude,
                longitude: self.longitude,
            }),
        }
    }
}

impl From<LatLng> for Coordinate {
    fn from(value: LatLng) -> Self {
        Self::new(value.lat(), value.lng())
    }
}

/// Extra booking attributes carried along with a drop-off point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointMetadata {
    pub luggage_count: Option<u32>,
    pub flight_id: Option<String>,
}

/// A rider's drop-off location, the unit of clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub id: String,
    pub booking_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub metadata: PointMetadata,
}

impl GeoPoint {
    pub fn new(
        id: impl Into<String>,
        booking_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            booking_id: booking_id.into(),
            latitude,
            longitude,
            metadata: PointMetadata::default(),
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let (lat1, lon1) = (a.latitude.to_radians(), a.longitude.to_radians());
    let (lat2, lon2) = (b.latitude.to_radians(), b.longitude.to_radians());
    let sin_dlat = ((lat2 - lat1) * 0.5).sin();
    let sin_dlon = ((lon2 - lon1) * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Coordinate-wise mean. Returns `None` for an empty slice.
pub fn centroid<'a>(coordinates: impl IntoIterator<Item = &'a GeoPoint>) -> Option<Coordinate> {
    let (count, lat_sum, lng_sum) = coordinates
        .into_iter()
        .fold((0usize, 0.0, 0.0), |(n, lat, lng), point| {
            (n + 1, lat + point.latitude, lng + point.longitude)
        });
    if count == 0 {
        return None;
    }
    Some(Coordinate::new(lat_sum / count as f64, lng_sum / count as f64))
}

/// Minutes needed to cover `distance_km` at a constant `speed_kmh`.
pub fn minutes_at_speed(distance_km: f64, speed_kmh: f64) -> f64 {
    if distance_km <= 0.0 || speed_kmh <= 0.0 {
        return 0.0;
    }
    distance_km / speed_kmh * 60.0
}

/// Shift a coordinate by the given kilometres north and east.
///
/// Small-offset approximation, good enough to lay out fixtures around an airport.
pub fn offset_km(origin: Coordinate, north_km: f64, east_km: f64) -> Coordinate {
    let km_per_deg_lat = EARTH_RADIUS_KM.to_radians();
    let km_per_deg_lng = km_per_deg_lat * origin.latitude.to_radians().cos();
    Coordinate::new(
        origin.latitude + north_km / km_per_deg_lat,
        origin.longitude + east_km / km_per_deg_lng,
    )
}
