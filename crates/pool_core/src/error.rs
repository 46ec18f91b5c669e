//! Error types for the pooling pipeline.
//!
//! Only [`InputError`] and pricing invariant violations abort a flight run.
//! [`RoutingError`] is recoverable and never leaves the route optimizer; a
//! rejected pool is a normal ranking outcome and is not an error at all.

use thiserror::Error;

/// Defects in the data handed to a pipeline stage. Never silently defaulted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("at least one booking is required for flight {flight_id}")]
    NoBookings { flight_id: String },

    #[error("pricing requires at least one passenger")]
    NoPassengers,

    #[error("route needs at least one drop-off after the airport")]
    NoDropoffs,

    #[error("first waypoint must be the airport, found {found}")]
    AirportNotFirst { found: String },

    #[error("invalid coordinate for {id}: ({latitude}, {longitude})")]
    InvalidCoordinate {
        id: String,
        latitude: f64,
        longitude: f64,
    },

    #[error("invalid distance for {what}: {value}")]
    InvalidDistance { what: String, value: f64 },

    #[error("no pickup waypoint found for booking {booking_id}")]
    MissingPickup { booking_id: String },

    #[error("no drop-off waypoint found for booking {booking_id}")]
    MissingDropoff { booking_id: String },

    #[error(
        "booking {booking_id} is dropped at stop {dropoff_index} before pickup at {pickup_index}"
    )]
    DropoffBeforePickup {
        booking_id: String,
        pickup_index: usize,
        dropoff_index: usize,
    },

    #[error("cluster point references unknown booking {booking_id}")]
    UnknownBooking { booking_id: String },
}

/// Failures of the external routing service.
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("routing service is rate limiting requests")]
    RateLimited,

    #[cfg(feature = "osrm")]
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("routing service error: {0}")]
    Api(String),

    #[error("malformed routing response: {0}")]
    InvalidResponse(String),

    #[error("routing service unavailable: {0}")]
    Unavailable(String),
}

impl RoutingError {
    /// Only rate limiting is retried; every other failure goes straight to the fallback.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RoutingError::RateLimited)
    }
}

/// Run-level error for a single flight.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PoolError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("pricing for cluster {cluster_id} is off by {difference:.2}")]
    PricingInvariant { cluster_id: usize, difference: f64 },
}

pub type Result<T> = std::result::Result<T, PoolError>;

/// Rejected pipeline configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse pipeline config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid pipeline config: {0}")]
    Invalid(String),
}
