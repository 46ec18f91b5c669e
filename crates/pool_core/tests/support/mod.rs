#![allow(dead_code)]

pub mod clients;

use pool_core::routing::{RetryPolicy, RoutingConfig};
use pool_core::PipelineConfig;

/// Default pipeline with backoff sleeps disabled.
pub fn fast_config() -> PipelineConfig {
    PipelineConfig::default().with_routing(fast_routing())
}

pub fn fast_routing() -> RoutingConfig {
    RoutingConfig {
        retry: RetryPolicy::immediate(3),
        ..RoutingConfig::default()
    }
}
