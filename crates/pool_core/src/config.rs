//! Pipeline-wide configuration.
//!
//! Every stage has its own config struct with documented defaults; this
//! module bundles them so a whole run can be tuned from one JSON document.
//! Missing fields fall back to their defaults, so `{}` is a valid config.

use serde::{Deserialize, Serialize};

use crate::clustering::ClusteringConfig;
use crate::error::ConfigError;
use crate::pricing::PricingConfig;
use crate::quality::QualityConfig;
use crate::ranking::RankingConfig;
use crate::routing::RoutingConfig;
use crate::rules::GroupRulesConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub clustering: ClusteringConfig,
    pub group_rules: GroupRulesConfig,
    pub routing: RoutingConfig,
    pub pricing: PricingConfig,
    pub quality: QualityConfig,
    pub ranking: RankingConfig,
}

impl PipelineConfig {
    /// Parse and validate a JSON config; absent sections keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would make a stage meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !self.clustering.eps_km.is_finite() || self.clustering.eps_km <= 0.0 {
            return invalid(format!(
                "clustering.eps_km must be positive, got {}",
                self.clustering.eps_km
            ));
        }
        if self.clustering.min_samples == 0 {
            return invalid("clustering.min_samples must be at least 1".to_string());
        }
        let rules = &self.group_rules;
        if rules.min_group_size == 0 || rules.min_group_size > rules.max_group_size {
            return invalid(format!(
                "group_rules sizes must satisfy 1 <= min ({}) <= max ({})",
                rules.min_group_size, rules.max_group_size
            ));
        }
        if rules.split_chunk_size < rules.min_group_size
            || rules.split_chunk_size > rules.max_group_size
        {
            return invalid(format!(
                "group_rules.split_chunk_size {} must lie within {}..={}",
                rules.split_chunk_size, rules.min_group_size, rules.max_group_size
            ));
        }
        if !self.routing.average_speed_kmh.is_finite() || self.routing.average_speed_kmh <= 0.0 {
            return invalid(format!(
                "routing.average_speed_kmh must be positive, got {}",
                self.routing.average_speed_kmh
            ));
        }
        if self.pricing.platform_tiers.is_empty() {
            return invalid("pricing.platform_tiers must not be empty".to_string());
        }
        if self
            .pricing
            .platform_tiers
            .windows(2)
            .any(|pair| pair[0].min_km > pair[1].min_km)
        {
            return invalid("pricing.platform_tiers must be sorted by min_km".to_string());
        }
        if self.quality.corridor_full_km > self.quality.corridor_partial_km {
            return invalid(
                "quality.corridor_full_km must not exceed corridor_partial_km".to_string(),
            );
        }
        if self.quality.luggage_full > self.quality.luggage_partial {
            return invalid("quality.luggage_full must not exceed luggage_partial".to_string());
        }
        if self.ranking.min_pax > self.ranking.max_pax {
            return invalid(format!(
                "ranking.min_pax {} exceeds max_pax {}",
                self.ranking.min_pax, self.ranking.max_pax
            ));
        }
        Ok(())
    }

    pub fn with_clustering(mut self, clustering: ClusteringConfig) -> Self {
        self.clustering = clustering;
        self
    }

    /// DBSCAN radius and density in one call.
    pub fn with_eps(mut self, eps_km: f64, min_samples: usize) -> Self {
        self.clustering.eps_km = eps_km;
        self.clustering.min_samples = min_samples;
        self
    }

    pub fn with_group_rules(mut self, group_rules: GroupRulesConfig) -> Self {
        self.group_rules = group_rules;
        self
    }

    pub fn with_routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = routing;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_quality(mut self, quality: QualityConfig) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_ranking(mut self, ranking: RankingConfig) -> Self {
        self.ranking = ranking;
        self
    }
}
