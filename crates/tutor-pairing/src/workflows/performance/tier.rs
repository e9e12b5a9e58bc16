use serde::{Deserialize, Serialize};

use super::super::pairing::domain::{PairingTier, TierOverride, Tutor};
use super::super::pairing::error::PairingError;
use super::scoring::TierThresholds;

/// Why a tier decision landed where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierBasis {
    Override,
    Retained,
    Computed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDecision {
    pub tier: PairingTier,
    pub max_concurrent_students: u32,
    pub basis: TierBasis,
}

impl TierDecision {
    fn new(tier: PairingTier, basis: TierBasis) -> Self {
        Self {
            tier,
            max_concurrent_students: tier.max_concurrent_students(),
            basis,
        }
    }
}

/// Maps performance scores to capacity tiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TierPolicy {
    thresholds: TierThresholds,
}

impl TierPolicy {
    pub fn new(thresholds: TierThresholds) -> Self {
        Self { thresholds }
    }

    pub fn tier_for_score(&self, score: f64) -> PairingTier {
        if score > self.thresholds.tier_three_above_score {
            PairingTier::Three
        } else if score >= self.thresholds.tier_two_min_score {
            PairingTier::Two
        } else {
            PairingTier::One
        }
    }

    /// Override first, then the sample-size gate, then the score thresholds.
    pub fn tier_for(
        &self,
        score: f64,
        has_minimum_data: bool,
        current_tier: PairingTier,
        manual_override: Option<&TierOverride>,
    ) -> TierDecision {
        if let Some(manual) = manual_override {
            return TierDecision::new(manual.tier, TierBasis::Override);
        }
        if !has_minimum_data {
            return TierDecision::new(current_tier, TierBasis::Retained);
        }
        TierDecision::new(self.tier_for_score(score), TierBasis::Computed)
    }
}

/// Reject a tier whose slot limit is below the tutor's current student load.
pub fn ensure_capacity(tutor: &Tutor, tier: PairingTier) -> Result<(), PairingError> {
    let limit = tier.max_concurrent_students();
    if tutor.current_student_count > limit {
        return Err(PairingError::CapacityViolation {
            tutor_id: tutor.id.clone(),
            students: tutor.current_student_count,
            limit,
        });
    }
    Ok(())
}
