use serde::{Deserialize, Serialize};

/// Relative weight of each metric in the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub attendance: f64,
    pub assignments: f64,
    pub exams: f64,
    pub reviews: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            attendance: 0.25,
            assignments: 0.25,
            exams: 0.25,
            reviews: 0.25,
        }
    }
}

/// Score cut points. Tier 2 starts at `tier_two_min_score`; tier 3 needs a score
/// strictly above `tier_three_above_score`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub tier_two_min_score: f64,
    pub tier_three_above_score: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            tier_two_min_score: 50.0,
            tier_three_above_score: 80.0,
        }
    }
}

/// Rubric configuration for performance scoring and tiering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub min_completed_sessions: u32,
    pub min_graded_assignments: u32,
    pub thresholds: TierThresholds,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            min_completed_sessions: 3,
            min_graded_assignments: 1,
            thresholds: TierThresholds::default(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), String> {
        let weights = [
            self.weights.attendance,
            self.weights.assignments,
            self.weights.exams,
            self.weights.reviews,
        ];
        if weights.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
            return Err("weights must be finite and non-negative".to_string());
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err("weights must not all be zero".to_string());
        }

        let TierThresholds {
            tier_two_min_score,
            tier_three_above_score,
        } = self.thresholds;
        let in_range = |value: f64| (0.0..=100.0).contains(&value);
        if !in_range(tier_two_min_score) || !in_range(tier_three_above_score) {
            return Err("tier thresholds must lie within 0-100".to_string());
        }
        if tier_two_min_score > tier_three_above_score {
            return Err(format!(
                "tier two minimum {tier_two_min_score} exceeds tier three cut {tier_three_above_score}"
            ));
        }
        Ok(())
    }
}
