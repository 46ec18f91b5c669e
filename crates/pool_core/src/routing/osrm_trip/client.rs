use reqwest::{blocking::Client, StatusCode, Url};
use std::time::Duration;

use crate::error::RoutingError;
use crate::routing::{RoutingClient, TripResponse, Waypoint};

use super::parser::parse_trip_response;
use super::response::OsrmTripResponse;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking HTTP client for an OSRM endpoint (e.g. `http://localhost:5000`).
#[derive(Debug, Clone)]
pub struct OsrmTripClient {
    client: Client,
    endpoint: String,
}

impl OsrmTripClient {
    pub fn new(endpoint: &str) -> Result<Self, RoutingError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn trip_url(&self, waypoints: &[Waypoint]) -> Result<Url, RoutingError> {
        let coord_segment = waypoints
            .iter()
            .map(|w| format!("{:.6},{:.6}", w.longitude, w.latitude))
            .collect::<Vec<_>>()
            .join(";");

        let base = format!("{}/trip/v1/driving/{}", self.endpoint, coord_segment);
        let mut url = Url::parse(&base)
            .map_err(|err| RoutingError::Api(format!("failed to build OSRM URL: {}", err)))?;
        url.query_pairs_mut()
            .append_pair("source", "first")
            .append_pair("destination", "any")
            .append_pair("roundtrip", "false")
            .append_pair("steps", "false")
            .append_pair("overview", "full")
            .append_pair("geometries", "geojson");
        Ok(url)
    }
}

impl RoutingClient for OsrmTripClient {
    fn compute_trip(&self, waypoints: &[Waypoint]) -> Result<TripResponse, RoutingError> {
        if waypoints.len() < 2 {
            return Err(RoutingError::InvalidResponse(
                "a trip needs at least two waypoints".to_string(),
            ));
        }

        let response = self.client.get(self.trip_url(waypoints)?).send()?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RoutingError::RateLimited);
        }
        if status.is_server_error() {
            return Err(RoutingError::Unavailable(status.to_string()));
        }

        // OSRM reports request errors (e.g. NoTrip) as JSON bodies with 4xx codes.
        let parsed: OsrmTripResponse = response.json()?;
        parse_trip_response(parsed, waypoints.len())
    }
}
