//! Tutor performance scoring and capacity tiers.
//!
//! Scores are a weighted mean of attendance, assignment, exam, and review
//! percentages over completed sessions. The tier policy maps scores onto slot
//! limits, honouring admin overrides and refusing any downgrade below a
//! tutor's current student load.

pub mod import;
pub mod router;
pub mod scoring;
pub mod service;
pub mod tier;

#[cfg(test)]
mod tests;

pub use import::{SessionCsvImporter, SessionImportError};
pub use router::performance_router;
pub use scoring::{
    MetricComponent, PerformanceMetric, PerformanceScore, ScoringConfig, ScoringEngine,
    ScoringWeights, TierThresholds,
};
pub use service::{
    PerformanceRefresh, PerformanceReview, PerformanceUpdate, SessionOutcome, SessionRecorded,
    TierOverrideRequest, TutorPerformanceService,
};
pub use tier::{ensure_capacity, TierBasis, TierDecision, TierPolicy};
