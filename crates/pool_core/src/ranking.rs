//! Constraint filtering, scoring and deterministic ordering of candidate pools.
//!
//! Ranking runs four stages over a flight's candidates:
//!
//! 1. hard constraints (group size, worst detour, worst extra time)
//! 2. quality scoring of the survivors
//! 3. a score threshold that only applies to two-rider pools
//! 4. a stable sort: score (ties within epsilon), then size, extra time, stops
//!
//! Rejection is a normal outcome here and never an error. The whole pass is a
//! pure function of its input.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::booking::Booking;
use crate::clustering::Cluster;
use crate::geo::Coordinate;
use crate::metrics::PassengerMetrics;
use crate::pricing::{ClusterPricing, PricingEngine};
use crate::quality::{QualityInput, QualityScore, QualityScorer, StabilityTier};
use crate::routing::Route;

pub const DEFAULT_MIN_PAX: usize = 2;
pub const DEFAULT_MAX_PAX: usize = 7;
pub const DEFAULT_MAX_DETOUR_PERCENT: f64 = 20.0;
pub const DEFAULT_MAX_EXTRA_TIME_MINUTES: f64 = 10.0;
pub const DEFAULT_PAIR_MIN_QUALITY_SCORE: f64 = 70.0;
pub const DEFAULT_SCORE_TIE_EPSILON: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub min_pax: usize,
    pub max_pax: usize,
    pub max_detour_percent: f64,
    pub max_extra_time_minutes: f64,
    /// Minimum quality score for a two-rider pool.
    pub pair_min_quality_score: f64,
    /// Score differences below this are ties.
    pub score_tie_epsilon: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_pax: DEFAULT_MIN_PAX,
            max_pax: DEFAULT_MAX_PAX,
            max_detour_percent: DEFAULT_MAX_DETOUR_PERCENT,
            max_extra_time_minutes: DEFAULT_MAX_EXTRA_TIME_MINUTES,
            pair_min_quality_score: DEFAULT_PAIR_MIN_QUALITY_SCORE,
            score_tie_epsilon: DEFAULT_SCORE_TIE_EPSILON,
        }
    }
}

/// A routed, metered and priced grouping waiting to be ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolCandidate {
    pub cluster_id: usize,
    pub total_pax: usize,
    pub total_route_km: f64,
    pub total_duration_minutes: f64,
    pub max_detour_percent: f64,
    /// Worst rider's extra time.
    pub extra_time_minutes: f64,
    pub waypoint_count: usize,
    pub centroid: Coordinate,
    pub passenger_metrics: Vec<PassengerMetrics>,
    pub pricing: ClusterPricing,
    pub quality_score: Option<QualityScore>,
    pub stability_tier: Option<StabilityTier>,
    pub booking_ids: Vec<String>,
    /// Known destinations, for the compatibility score.
    pub destinations: Vec<Coordinate>,
    /// Known luggage counts, for the compatibility score.
    pub luggage_counts: Vec<u32>,
}

impl PoolCandidate {
    pub fn new(
        cluster: &Cluster,
        route: &Route,
        bookings: &[Booking],
        passenger_metrics: Vec<PassengerMetrics>,
        pricing: ClusterPricing,
    ) -> Self {
        let max_detour_percent = passenger_metrics
            .iter()
            .map(|m| m.detour_percent)
            .fold(0.0, f64::max);
        let extra_time_minutes = passenger_metrics
            .iter()
            .map(|m| m.extra_time_minutes)
            .fold(0.0, f64::max);

        Self {
            cluster_id: cluster.id,
            total_pax: bookings.len(),
            total_route_km: route.distance_km,
            total_duration_minutes: route.duration_minutes,
            max_detour_percent,
            extra_time_minutes,
            waypoint_count: route.ordered_waypoints.len(),
            centroid: cluster.centroid,
            passenger_metrics,
            pricing,
            quality_score: None,
            stability_tier: None,
            booking_ids: bookings.iter().map(|b| b.id.clone()).collect(),
            destinations: bookings.iter().map(Booking::destination).collect(),
            luggage_counts: bookings.iter().filter_map(|b| b.luggage_count).collect(),
        }
    }

    pub fn score(&self) -> f64 {
        self.quality_score.as_ref().map_or(0.0, |q| q.overall)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionStage {
    HardConstraint,
    SoftThreshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedPool {
    pub pool: PoolCandidate,
    pub stage: RejectionStage,
    pub reason: String,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingStats {
    pub total_candidates: usize,
    pub passed_hard_constraints: usize,
    pub scored: usize,
    pub passed_soft_threshold: usize,
    pub confirmable: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingResult {
    pub confirmable_pools: Vec<PoolCandidate>,
    pub rejected_pools: Vec<RejectedPool>,
    pub stats: RankingStats,
}

#[derive(Debug, Clone, Default)]
pub struct PoolRanker {
    config: RankingConfig,
    scorer: QualityScorer,
    pricing: PricingEngine,
}

impl PoolRanker {
    /// `pricing` is only used to estimate each rider's solo price for the savings figure.
    pub fn new(config: RankingConfig, scorer: QualityScorer, pricing: PricingEngine) -> Self {
        Self {
            config,
            scorer,
            pricing,
        }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn rank_and_filter_pools(&self, candidates: Vec<PoolCandidate>) -> RankingResult {
        let mut stats = RankingStats {
            total_candidates: candidates.len(),
            ..RankingStats::default()
        };
        let mut rejected = Vec::new();

        let mut survivors = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let violations = self.hard_constraint_violations(&candidate);
            if violations.is_empty() {
                survivors.push(candidate);
            } else {
                rejected.push(RejectedPool {
                    pool: candidate,
                    stage: RejectionStage::HardConstraint,
                    reason: "hard constraints violated".to_string(),
                    violations,
                });
            }
        }
        stats.passed_hard_constraints = survivors.len();

        for candidate in &mut survivors {
            self.attach_score(candidate);
        }
        stats.scored = survivors.len();

        let mut confirmable = Vec::with_capacity(survivors.len());
        for candidate in survivors {
            match self.soft_threshold(&candidate) {
                Ok(()) => confirmable.push(candidate),
                Err(reason) => rejected.push(RejectedPool {
                    pool: candidate,
                    stage: RejectionStage::SoftThreshold,
                    reason,
                    violations: Vec::new(),
                }),
            }
        }
        stats.passed_soft_threshold = confirmable.len();

        self.sort_pools(&mut confirmable);
        stats.confirmable = confirmable.len();
        stats.rejected = rejected.len();

        info!(
            candidates = stats.total_candidates,
            confirmable = stats.confirmable,
            rejected = stats.rejected,
            "ranked candidate pools"
        );

        RankingResult {
            confirmable_pools: confirmable,
            rejected_pools: rejected,
            stats,
        }
    }

    pub fn hard_constraint_violations(&self, candidate: &PoolCandidate) -> Vec<String> {
        let mut violations = Vec::new();
        if candidate.total_pax < self.config.min_pax {
            violations.push(format!(
                "{} passengers is below the minimum of {}",
                candidate.total_pax, self.config.min_pax
            ));
        }
        if candidate.total_pax > self.config.max_pax {
            violations.push(format!(
                "{} passengers exceeds the maximum of {}",
                candidate.total_pax, self.config.max_pax
            ));
        }
        if candidate.max_detour_percent > self.config.max_detour_percent {
            violations.push(format!(
                "max detour {:.1}% exceeds {:.0}%",
                candidate.max_detour_percent, self.config.max_detour_percent
            ));
        }
        if candidate.extra_time_minutes > self.config.max_extra_time_minutes {
            violations.push(format!(
                "extra time {:.1} min exceeds {:.0} min",
                candidate.extra_time_minutes, self.config.max_extra_time_minutes
            ));
        }
        violations
    }

    /// Score `candidate` and attach the result.
    pub fn attach_score(&self, candidate: &mut PoolCandidate) {
        let savings = self.savings_percent(candidate);
        let input = QualityInput {
            cluster_size: candidate.total_pax,
            passenger_metrics: &candidate.passenger_metrics,
            savings_percent: &savings,
            total_route_km: candidate.total_route_km,
            centroid: candidate.centroid,
            luggage_counts: &candidate.luggage_counts,
            destinations: &candidate.destinations,
        };
        let score = self.scorer.score(&input);
        candidate.stability_tier = Some(score.stability_tier);
        candidate.quality_score = Some(score);
    }

    /// Per-rider saving of the shared price against riding alone the direct distance.
    pub fn savings_percent(&self, candidate: &PoolCandidate) -> Vec<f64> {
        candidate
            .passenger_metrics
            .iter()
            .map(|m| {
                let solo = self.pricing.solo_price(m.direct_distance_km);
                let shared = candidate
                    .pricing
                    .passenger(&m.booking_id)
                    .map_or(solo, |p| p.total_price);
                if solo > 0.0 {
                    (solo - shared) / solo * 100.0
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Pools of three or more always pass; pairs need the minimum pair score.
    pub fn soft_threshold(&self, candidate: &PoolCandidate) -> Result<(), String> {
        match candidate.total_pax {
            n if n >= 3 => Ok(()),
            2 => {
                let score = candidate.score();
                if score >= self.config.pair_min_quality_score {
                    Ok(())
                } else {
                    Err(format!(
                        "two-rider pool scored {:.1}, below the required {:.0}",
                        score, self.config.pair_min_quality_score
                    ))
                }
            }
            n => Err(format!("{n} passenger pool cannot be shared")),
        }
    }

    /// Stable insertion sort with the ranking order.
    ///
    /// The epsilon tie on scores is not transitive, so this avoids the
    /// standard library sorts which require a total order.
    pub fn sort_pools(&self, pools: &mut [PoolCandidate]) {
        for i in 1..pools.len() {
            let mut j = i;
            while j > 0 && self.compare(&pools[j - 1], &pools[j]) == Ordering::Greater {
                pools.swap(j - 1, j);
                j -= 1;
            }
        }
    }

    fn compare(&self, a: &PoolCandidate, b: &PoolCandidate) -> Ordering {
        let (score_a, score_b) = (a.score(), b.score());
        if (score_a - score_b).abs() >= self.config.score_tie_epsilon {
            return score_b.partial_cmp(&score_a).unwrap_or(Ordering::Equal);
        }
        b.total_pax
            .cmp(&a.total_pax)
            .then_with(|| {
                a.extra_time_minutes
                    .partial_cmp(&b.extra_time_minutes)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.waypoint_count.cmp(&b.waypoint_count))
    }
}

/// Rank with the default thresholds and rates.
pub fn rank_and_filter_pools(candidates: Vec<PoolCandidate>) -> RankingResult {
    PoolRanker::default().rank_and_filter_pools(candidates)
}
