//! Shared airport-transfer matching.
//!
//! Groups bookings that share a flight into shared vehicles, prices every
//! group so the riders' prices add up to the cent, scores each group and
//! ranks the confirmable ones. Start with [`runner::FlightRunner`] for a
//! complete run, or use the stage modules directly.

pub mod booking;
pub mod clustering;
pub mod config;
pub mod error;
pub mod geo;
pub mod metrics;
pub mod pricing;
pub mod quality;
pub mod ranking;
pub mod routing;
pub mod rules;
pub mod runner;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use booking::Booking;
pub use config::PipelineConfig;
pub use error::{ConfigError, InputError, PoolError, RoutingError};
pub use runner::{FlightOutcome, FlightRequest, FlightRunner};
