mod config;
mod rules;

pub use config::{ScoringConfig, ScoringWeights, TierThresholds};

use serde::{Deserialize, Serialize};

use super::super::pairing::domain::{PerformanceMetrics, Session, TutorId};

/// Stateless evaluator that applies the scoring configuration to session history.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, tutor_id: &TutorId, sessions: &[Session]) -> PerformanceScore {
        let tally = rules::tally_sessions(sessions);
        let (metrics, components, raw_score) = rules::score_tally(&tally, &self.config);

        PerformanceScore {
            tutor_id: tutor_id.clone(),
            score: (raw_score * 100.0).round() / 100.0,
            raw_score,
            has_minimum_data: metrics.has_minimum_data,
            metrics,
            components,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceMetric {
    Attendance,
    Assignments,
    Exams,
    Reviews,
}

impl PerformanceMetric {
    pub const fn label(self) -> &'static str {
        match self {
            PerformanceMetric::Attendance => "attendance",
            PerformanceMetric::Assignments => "assignments",
            PerformanceMetric::Exams => "exams",
            PerformanceMetric::Reviews => "reviews",
        }
    }
}

/// Discrete contribution to a score, kept for admin audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComponent {
    pub metric: PerformanceMetric,
    pub value: f64,
    pub weight: f64,
    pub samples: u32,
    pub notes: String,
}

/// Composite score plus the metrics and components it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceScore {
    pub tutor_id: TutorId,
    /// Rounded to two decimals for display and storage.
    pub score: f64,
    /// Unrounded composite; tier thresholds compare against this.
    #[serde(skip)]
    pub raw_score: f64,
    pub has_minimum_data: bool,
    pub metrics: PerformanceMetrics,
    pub components: Vec<MetricComponent>,
}
