//! Multi-factor quality score for a candidate grouping.
//!
//! Four capped sub-scores add up to a 0–100 score:
//!
//! | Component       | Cap | Driven by                          |
//! |-----------------|-----|------------------------------------|
//! | price saving    | 40  | average savings vs. riding alone   |
//! | time efficiency | 30  | average extra minutes on board     |
//! | route deviation | 20  | average detour percent             |
//! | compatibility   | 10  | common direction and luggage load  |
//!
//! Scoring looks at averages, while the stability tier and hard-constraint
//! checks look at the worst rider.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo::{haversine_km, Coordinate};
use crate::metrics::PassengerMetrics;

pub const PRICE_SAVING_CAP: f64 = 40.0;
pub const TIME_EFFICIENCY_CAP: f64 = 30.0;
pub const ROUTE_DEVIATION_CAP: f64 = 20.0;
pub const COMPATIBILITY_CAP: f64 = 10.0;

/// (average savings %, points)
const PRICE_SAVING_CURVE: [(f64, f64); 4] = [(0.0, 0.0), (10.0, 10.0), (30.0, 28.0), (50.0, 40.0)];
/// (average extra minutes, points)
const TIME_EFFICIENCY_CURVE: [(f64, f64); 4] =
    [(2.0, 30.0), (6.0, 20.0), (10.0, 10.0), (20.0, 0.0)];
/// (average detour %, points)
const ROUTE_DEVIATION_CURVE: [(f64, f64); 5] = [
    (5.0, 20.0),
    (10.0, 15.0),
    (15.0, 10.0),
    (20.0, 5.0),
    (30.0, 0.0),
];

const COMPATIBILITY_BASE: f64 = 50.0;
const CORRIDOR_BONUS: f64 = 30.0;
const LUGGAGE_BONUS: f64 = 20.0;

pub const DEFAULT_CORRIDOR_FULL_KM: f64 = 8.0;
pub const DEFAULT_CORRIDOR_PARTIAL_KM: f64 = 12.0;
pub const DEFAULT_LUGGAGE_FULL: u32 = 4;
pub const DEFAULT_LUGGAGE_PARTIAL: u32 = 6;
pub const DEFAULT_MAX_DETOUR_PERCENT: f64 = 20.0;
pub const DEFAULT_MAX_EXTRA_TIME_MINUTES: f64 = 10.0;
pub const DEFAULT_PAIR_MAX_DETOUR_PERCENT: f64 = 10.0;
pub const DEFAULT_PAIR_MAX_EXTRA_TIME_MINUTES: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Every destination within this radius of the centroid earns the full corridor bonus.
    pub corridor_full_km: f64,
    /// Beyond this radius the corridor bonus is zero.
    pub corridor_partial_km: f64,
    pub luggage_full: u32,
    pub luggage_partial: u32,
    pub max_detour_percent: f64,
    pub max_extra_time_minutes: f64,
    /// Worst-rider limits a two-rider group must meet to be rated GOOD.
    pub pair_max_detour_percent: f64,
    pub pair_max_extra_time_minutes: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            corridor_full_km: DEFAULT_CORRIDOR_FULL_KM,
            corridor_partial_km: DEFAULT_CORRIDOR_PARTIAL_KM,
            luggage_full: DEFAULT_LUGGAGE_FULL,
            luggage_partial: DEFAULT_LUGGAGE_PARTIAL,
            max_detour_percent: DEFAULT_MAX_DETOUR_PERCENT,
            max_extra_time_minutes: DEFAULT_MAX_EXTRA_TIME_MINUTES,
            pair_max_detour_percent: DEFAULT_PAIR_MAX_DETOUR_PERCENT,
            pair_max_extra_time_minutes: DEFAULT_PAIR_MAX_EXTRA_TIME_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StabilityTier {
    Excellent,
    Good,
    Rejected,
}

impl fmt::Display for StabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StabilityTier::Excellent => "EXCELLENT",
            StabilityTier::Good => "GOOD",
            StabilityTier::Rejected => "REJECTED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Excellent,
    Good,
    Fair,
    Poor,
    Reject,
}

impl Recommendation {
    pub fn from_score(overall: f64) -> Self {
        match overall {
            s if s >= 80.0 => Recommendation::Excellent,
            s if s >= 60.0 => Recommendation::Good,
            s if s >= 40.0 => Recommendation::Fair,
            _ => Recommendation::Poor,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Recommendation::Excellent => "excellent match, confirm",
            Recommendation::Good => "good match",
            Recommendation::Fair => "fair match, confirm only if nothing better",
            Recommendation::Poor => "poor match",
            Recommendation::Reject => "reject",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub price_saving: f64,
    pub time_efficiency: f64,
    pub route_deviation: f64,
    pub compatibility: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.price_saving + self.time_efficiency + self.route_deviation + self.compatibility
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub overall: f64,
    pub breakdown: ScoreBreakdown,
    pub stability_tier: StabilityTier,
    pub recommendation: Recommendation,
    pub warnings: Vec<String>,
    pub violations: Vec<String>,
}

impl QualityScore {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Everything the scorer looks at for one grouping.
///
/// `luggage_counts` and `destinations` may be empty when unknown; missing
/// data earns the full bonus on that part of the compatibility score.
#[derive(Debug, Clone, Copy)]
pub struct QualityInput<'a> {
    pub cluster_size: usize,
    pub passenger_metrics: &'a [PassengerMetrics],
    pub savings_percent: &'a [f64],
    pub total_route_km: f64,
    pub centroid: Coordinate,
    pub luggage_counts: &'a [u32],
    pub destinations: &'a [Coordinate],
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (count, sum) = values.fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn max_of(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, f64::max)
}

/// Piecewise-linear interpolation through `curve`, flat beyond both ends.
fn piecewise(x: f64, curve: &[(f64, f64)]) -> f64 {
    let (Some(&(x_first, y_first)), Some(&(x_last, y_last))) = (curve.first(), curve.last()) else {
        return 0.0;
    };
    if x.is_nan() {
        return 0.0;
    }
    if x <= x_first {
        return y_first;
    }
    if x >= x_last {
        return y_last;
    }
    curve
        .windows(2)
        .find(|pair| x <= pair[1].0)
        .map_or(y_last, |pair| {
            let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
            y0 + (y1 - y0) * (x - x0) / (x1 - x0)
        })
}

/// Linear fade from `full` points at `full_at` down to zero at `zero_at`.
fn fade(value: f64, full_at: f64, zero_at: f64, full: f64) -> f64 {
    if value <= full_at {
        full
    } else if value >= zero_at || zero_at <= full_at {
        0.0
    } else {
        full * (zero_at - value) / (zero_at - full_at)
    }
}

pub fn price_saving_score(average_savings_percent: f64) -> f64 {
    piecewise(average_savings_percent, &PRICE_SAVING_CURVE).clamp(0.0, PRICE_SAVING_CAP)
}

pub fn time_efficiency_score(average_extra_minutes: f64) -> f64 {
    piecewise(average_extra_minutes, &TIME_EFFICIENCY_CURVE).clamp(0.0, TIME_EFFICIENCY_CAP)
}

pub fn route_deviation_score(average_detour_percent: f64) -> f64 {
    piecewise(average_detour_percent, &ROUTE_DEVIATION_CURVE).clamp(0.0, ROUTE_DEVIATION_CAP)
}

#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    config: QualityConfig,
}

impl QualityScorer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn score(&self, input: &QualityInput<'_>) -> QualityScore {
        let metrics = input.passenger_metrics;
        let avg_savings = mean(input.savings_percent.iter().copied());
        let avg_extra = mean(metrics.iter().map(|m| m.extra_time_minutes));
        let avg_detour = mean(metrics.iter().map(|m| m.detour_percent));

        let breakdown = ScoreBreakdown {
            price_saving: price_saving_score(avg_savings),
            time_efficiency: time_efficiency_score(avg_extra),
            route_deviation: route_deviation_score(avg_detour),
            compatibility: self.compatibility_score(input),
        };
        let overall = breakdown.total().clamp(0.0, 100.0);

        let violations = self.validate_constraints(input.cluster_size, metrics);
        let stability_tier = self.stability_tier(input.cluster_size, metrics);
        let recommendation = if violations.is_empty() {
            Recommendation::from_score(overall)
        } else {
            Recommendation::Reject
        };

        let mut warnings = violations.clone();
        if avg_savings < 10.0 {
            warnings.push(format!("average saving is only {:.1}%", avg_savings));
        }
        if stability_tier == StabilityTier::Rejected && violations.is_empty() {
            warnings.push("pair exceeds the two-rider detour or extra-time limits".to_string());
        }
        if input.total_route_km <= 0.0 {
            warnings.push("route has no length".to_string());
        }

        QualityScore {
            overall,
            breakdown,
            stability_tier,
            recommendation,
            warnings,
            violations,
        }
    }

    /// 0–10: base 50 of 100, up to 30 for a shared corridor, up to 20 for manageable luggage.
    pub fn compatibility_score(&self, input: &QualityInput<'_>) -> f64 {
        let corridor = if input.destinations.is_empty() {
            CORRIDOR_BONUS
        } else {
            let farthest = max_of(
                input
                    .destinations
                    .iter()
                    .map(|d| haversine_km(input.centroid, *d)),
            );
            fade(
                farthest,
                self.config.corridor_full_km,
                self.config.corridor_partial_km,
                CORRIDOR_BONUS,
            )
        };

        let luggage = match input.luggage_counts.iter().max() {
            None => LUGGAGE_BONUS,
            Some(&heaviest) => fade(
                heaviest as f64,
                self.config.luggage_full as f64,
                self.config.luggage_partial as f64,
                LUGGAGE_BONUS,
            ),
        };

        ((COMPATIBILITY_BASE + corridor + luggage) / 10.0).clamp(0.0, COMPATIBILITY_CAP)
    }

    /// Size ≥ 3 is EXCELLENT; a pair is GOOD only if its worst rider stays
    /// within the pair limits.
    pub fn stability_tier(
        &self,
        cluster_size: usize,
        metrics: &[PassengerMetrics],
    ) -> StabilityTier {
        if cluster_size >= 3 {
            return StabilityTier::Excellent;
        }
        if cluster_size == 2 {
            let max_detour = max_of(metrics.iter().map(|m| m.detour_percent));
            let max_extra = max_of(metrics.iter().map(|m| m.extra_time_minutes));
            if max_detour <= self.config.pair_max_detour_percent
                && max_extra <= self.config.pair_max_extra_time_minutes
            {
                return StabilityTier::Good;
            }
        }
        StabilityTier::Rejected
    }

    /// Hard violations, independent of the numeric score.
    pub fn validate_constraints(
        &self,
        cluster_size: usize,
        metrics: &[PassengerMetrics],
    ) -> Vec<String> {
        let mut violations = Vec::new();
        if cluster_size < 2 {
            violations.push(format!("group of {} is below the minimum of 2", cluster_size));
        }
        for m in metrics {
            if m.detour_percent > self.config.max_detour_percent {
                violations.push(format!(
                    "booking {} detour {:.1}% exceeds {:.0}%",
                    m.booking_id, m.detour_percent, self.config.max_detour_percent
                ));
            }
            if m.extra_time_minutes > self.config.max_extra_time_minutes {
                violations.push(format!(
                    "booking {} extra time {:.1} min exceeds {:.0} min",
                    m.booking_id, m.extra_time_minutes, self.config.max_extra_time_minutes
                ));
            }
        }
        violations
    }
}

/// Score with the default thresholds.
pub fn calculate_quality_score(input: &QualityInput<'_>) -> QualityScore {
    QualityScorer::default().score(input)
}
