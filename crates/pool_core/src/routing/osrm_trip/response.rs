#[derive(serde::Deserialize)]
pub(super) struct OsrmTripResponse {
    pub(super) code: String,
    pub(super) message: Option<String>,
    pub(super) trips: Option<Vec<OsrmTrip>>,
    pub(super) waypoints: Option<Vec<OsrmTripWaypoint>>,
}

#[derive(serde::Deserialize)]
pub(super) struct OsrmTrip {
    pub(super) distance: f64, // metres
    pub(super) duration: f64, // seconds
    pub(super) geometry: Option<OsrmGeometry>,
    #[serde(default)]
    pub(super) legs: Vec<OsrmLeg>,
}

#[derive(serde::Deserialize)]
pub(super) struct OsrmLeg {
    pub(super) distance: f64,
    pub(super) duration: f64,
}

#[derive(serde::Deserialize)]
pub(super) struct OsrmGeometry {
    pub(super) coordinates: Vec<[f64; 2]>, // [lng, lat]
}

#[derive(serde::Deserialize)]
pub(super) struct OsrmTripWaypoint {
    pub(super) waypoint_index: usize,
    pub(super) trips_index: usize,
}
