//! Fair price split for a shared vehicle.
//!
//! Each rider pays two components:
//!
//! - **Driver cost**: the whole route's driver compensation, split equally.
//! - **Platform fee**: the rider's own on-board kilometres at a tiered per-km rate.
//!
//! Amounts are computed in integer cents. Per-rider rounding can leave the
//! summed prices a cent or two away from the group's grand total; that
//! remainder (the penny adjustment) goes to the first rider in input order,
//! so the prices always add up exactly.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::InputError;

/// Driver compensation per route kilometre.
pub const DEFAULT_DRIVER_RATE_PER_KM: f64 = 2.00;

/// Platform rate for rides up to 50 km.
pub const DEFAULT_PLATFORM_RATE_SHORT: f64 = 0.30;
/// Platform rate for rides above 50 km and below 100 km.
pub const DEFAULT_PLATFORM_RATE_MEDIUM: f64 = 0.25;
/// Platform rate for rides of 100 km or more.
pub const DEFAULT_PLATFORM_RATE_LONG: f64 = 0.20;

/// A platform-fee band. The band applies from `min_km` upwards until the next band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlatformFeeTier {
    pub min_km: f64,
    /// Whether a distance exactly equal to `min_km` already belongs to this band.
    pub inclusive: bool,
    pub rate_per_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub driver_rate_per_km: f64,
    /// Bands sorted by `min_km`; the first one must start at 0.
    pub platform_tiers: Vec<PlatformFeeTier>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            driver_rate_per_km: DEFAULT_DRIVER_RATE_PER_KM,
            platform_tiers: vec![
                PlatformFeeTier {
                    min_km: 0.0,
                    inclusive: true,
                    rate_per_km: DEFAULT_PLATFORM_RATE_SHORT,
                },
                PlatformFeeTier {
                    min_km: 50.0,
                    inclusive: false,
                    rate_per_km: DEFAULT_PLATFORM_RATE_MEDIUM,
                },
                PlatformFeeTier {
                    min_km: 100.0,
                    inclusive: true,
                    rate_per_km: DEFAULT_PLATFORM_RATE_LONG,
                },
            ],
        }
    }
}

impl PricingConfig {
    /// Per-km platform rate for a ride of `km`, applied to the whole distance.
    pub fn platform_rate(&self, km: f64) -> f64 {
        self.platform_tiers
            .iter()
            .filter(|tier| {
                if tier.inclusive {
                    km >= tier.min_km
                } else {
                    km > tier.min_km
                }
            })
            .last()
            .or(self.platform_tiers.first())
            .map_or(0.0, |tier| tier.rate_per_km)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub driver_rate: f64,
    pub platform_rate: f64,
    pub penny_adjustment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerPricing {
    pub booking_id: String,
    pub km_onboard: f64,
    pub driver_cost: f64,
    pub platform_fee: f64,
    pub total_price: f64,
    pub share_percent: f64,
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingValidation {
    pub sum_matches_total: bool,
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterPricing {
    pub total_route_km: f64,
    pub total_driver_cost: f64,
    pub total_platform_fee: f64,
    pub grand_total: f64,
    pub passengers: Vec<PassengerPricing>,
    pub validation: PricingValidation,
}

impl ClusterPricing {
    pub fn passenger(&self, booking_id: &str) -> Option<&PassengerPricing> {
        self.passengers.iter().find(|p| p.booking_id == booking_id)
    }
}

/// Kilometres a rider spent on board, the per-rider input to pricing.
#[derive(Debug, Clone, PartialEq)]
pub struct PassengerKm {
    pub booking_id: String,
    pub km_onboard: f64,
}

impl PassengerKm {
    pub fn new(booking_id: impl Into<String>, km_onboard: f64) -> Self {
        Self {
            booking_id: booking_id.into(),
            km_onboard,
        }
    }
}

/// Round a currency amount to whole cents, half away from zero.
pub fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Split the cost of a shared route across its riders.
    pub fn calculate(
        &self,
        total_route_km: f64,
        passengers: &[PassengerKm],
    ) -> Result<ClusterPricing, InputError> {
        if passengers.is_empty() {
            return Err(InputError::NoPassengers);
        }
        validate_km("total route", total_route_km)?;
        for passenger in passengers {
            validate_km(&passenger.booking_id, passenger.km_onboard)?;
        }

        let driver_rate = self.config.driver_rate_per_km;
        let riders = passengers.len() as f64;
        let exact_driver_total = total_route_km * driver_rate;
        let driver_share_cents = to_cents(exact_driver_total / riders);

        let fees: Vec<(f64, f64)> = passengers
            .iter()
            .map(|p| {
                let rate = self.config.platform_rate(p.km_onboard);
                (rate, p.km_onboard * rate)
            })
            .collect();
        let exact_fee_total: f64 = fees.iter().map(|(_, fee)| fee).sum();

        let total_driver_cents = to_cents(exact_driver_total);
        let total_fee_cents = to_cents(exact_fee_total);
        let grand_total_cents = total_driver_cents + total_fee_cents;

        let mut totals_cents: Vec<i64> = fees
            .iter()
            .map(|(_, fee)| driver_share_cents + to_cents(*fee))
            .collect();
        let penny_cents = grand_total_cents - totals_cents.iter().sum::<i64>();
        totals_cents[0] += penny_cents;

        let sum_cents: i64 = totals_cents.iter().sum();
        let difference_cents = sum_cents - grand_total_cents;
        if difference_cents != 0 {
            error!(
                difference_cents,
                riders = passengers.len(),
                "price split does not add up to the grand total"
            );
        }

        let passengers = passengers
            .iter()
            .zip(&fees)
            .zip(&totals_cents)
            .enumerate()
            .map(|(idx, ((passenger, (rate, fee)), total))| PassengerPricing {
                booking_id: passenger.booking_id.clone(),
                km_onboard: passenger.km_onboard,
                driver_cost: from_cents(driver_share_cents),
                platform_fee: from_cents(to_cents(*fee)),
                total_price: from_cents(*total),
                share_percent: if grand_total_cents > 0 {
                    *total as f64 / grand_total_cents as f64 * 100.0
                } else {
                    100.0 / riders
                },
                breakdown: PriceBreakdown {
                    driver_rate,
                    platform_rate: *rate,
                    penny_adjustment: if idx == 0 { from_cents(penny_cents) } else { 0.0 },
                },
            })
            .collect();

        Ok(ClusterPricing {
            total_route_km,
            total_driver_cost: from_cents(total_driver_cents),
            total_platform_fee: from_cents(total_fee_cents),
            grand_total: from_cents(grand_total_cents),
            passengers,
            validation: PricingValidation {
                sum_matches_total: difference_cents == 0,
                difference: from_cents(difference_cents),
            },
        })
    }

    /// Price of riding alone over `direct_km`: whole driver cost plus own platform fee.
    pub fn solo_price(&self, direct_km: f64) -> f64 {
        let km = direct_km.max(0.0);
        let driver = to_cents(km * self.config.driver_rate_per_km);
        let fee = to_cents(km * self.config.platform_rate(km));
        from_cents(driver + fee)
    }
}

fn validate_km(what: &str, km: f64) -> Result<(), InputError> {
    if km.is_finite() && km >= 0.0 {
        Ok(())
    } else {
        Err(InputError::InvalidDistance {
            what: what.to_string(),
            value: km,
        })
    }
}

/// Price a group with the default rates.
pub fn calculate_pricing(
    total_route_km: f64,
    passengers: &[PassengerKm],
) -> Result<ClusterPricing, InputError> {
    PricingEngine::default().calculate(total_route_km, passengers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn riders(kms: &[f64]) -> Vec<PassengerKm> {
        kms.iter()
            .enumerate()
            .map(|(i, km)| PassengerKm::new(format!("b{i}"), *km))
            .collect()
    }

    fn sum_cents(pricing: &ClusterPricing) -> i64 {
        pricing.passengers.iter().map(|p| to_cents(p.total_price)).sum()
    }

    #[test]
    fn three_riders_share_driver_cost_equally() {
        let pricing = calculate_pricing(36.5, &riders(&[26.0, 28.0, 30.0])).expect("pricing");

        // 36.5 km × 2.00 = 73.00, a third each is 24.33.
        assert_eq!(pricing.total_driver_cost, 73.0);
        for p in &pricing.passengers {
            assert_eq!(p.driver_cost, 24.33);
            assert_eq!(p.breakdown.platform_rate, DEFAULT_PLATFORM_RATE_SHORT);
        }
        assert_eq!(pricing.passengers[0].platform_fee, 7.8);
        assert_eq!(pricing.passengers[2].platform_fee, 9.0);

        // 73.00 + 25.20 = 98.20; 3 × 24.33 + 25.20 = 98.19, one cent to the first rider.
        assert_eq!(pricing.grand_total, 98.2);
        assert_eq!(pricing.passengers[0].breakdown.penny_adjustment, 0.01);
        assert_eq!(pricing.passengers[0].total_price, 32.14);
        assert_eq!(pricing.passengers[1].breakdown.penny_adjustment, 0.0);
        assert_eq!(sum_cents(&pricing), to_cents(pricing.grand_total));
        assert!(pricing.validation.sum_matches_total);
        assert_eq!(pricing.validation.difference, 0.0);
    }

    #[test]
    fn platform_tiers_follow_distance_bands() {
        let config = PricingConfig::default();
        assert_eq!(config.platform_rate(10.0), DEFAULT_PLATFORM_RATE_SHORT);
        assert_eq!(config.platform_rate(50.0), DEFAULT_PLATFORM_RATE_SHORT);
        assert_eq!(config.platform_rate(50.5), DEFAULT_PLATFORM_RATE_MEDIUM);
        assert_eq!(config.platform_rate(99.9), DEFAULT_PLATFORM_RATE_MEDIUM);
        assert_eq!(config.platform_rate(100.0), DEFAULT_PLATFORM_RATE_LONG);
        assert_eq!(config.platform_rate(0.0), DEFAULT_PLATFORM_RATE_SHORT);
    }

    #[test]
    fn zero_passengers_is_an_input_error() {
        assert_eq!(calculate_pricing(10.0, &[]), Err(InputError::NoPassengers));
        assert!(matches!(
            calculate_pricing(f64::NAN, &riders(&[1.0])),
            Err(InputError::InvalidDistance { .. })
        ));
    }

    #[test]
    fn random_groups_always_add_up_to_the_cent() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let count = rng.gen_range(1..=7);
            let kms: Vec<f64> = (0..count).map(|_| rng.gen_range(0.5..140.0)).collect();
            let route_km = kms.iter().cloned().fold(0.0, f64::max) + rng.gen_range(0.0..15.0);
            let pricing = calculate_pricing(route_km, &riders(&kms)).expect("pricing");

            assert!(pricing.validation.sum_matches_total);
            assert_eq!(sum_cents(&pricing), to_cents(pricing.grand_total));
            assert_eq!(
                to_cents(pricing.grand_total),
                to_cents(pricing.total_driver_cost) + to_cents(pricing.total_platform_fee)
            );
            let first_driver = pricing.passengers[0].driver_cost;
            assert!(pricing.passengers.iter().all(|p| p.driver_cost == first_driver));
        }
    }

    #[test]
    fn solo_price_charges_whole_route() {
        let engine = PricingEngine::default();
        // 20 km × 2.00 + 20 km × 0.30
        assert_eq!(engine.solo_price(20.0), 46.0);
        assert_eq!(engine.solo_price(-1.0), 0.0);
    }
}
