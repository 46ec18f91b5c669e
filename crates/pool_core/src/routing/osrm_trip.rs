//! OSRM `/trip` client: the production [`RoutingClient`](super::RoutingClient).
//!
//! Requests an open trip (`source=first`, `destination=any`,
//! `roundtrip=false`) and converts OSRM's per-input `waypoint_index` into the
//! visiting order expected by the optimizer. HTTP 429 is surfaced as
//! [`RoutingError::RateLimited`](crate::error::RoutingError::RateLimited) so
//! the optimizer can back off.

mod client;
mod parser;
mod response;


pub use client::OsrmTripClient;
