use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::super::pairing::domain::{
    AuditAction, AuditLogEntry, InterviewStatus, PairingTier, Session, SessionId, SessionStatus,
    TierOverride, Tutor, TutorId, TutorStatus, UserRole,
};
use super::super::pairing::error::{EntityKind, PairingError};
use super::super::pairing::repository::{
    commit_with_retry, notify_best_effort, Notification, NotificationTemplate, Notifier,
    PairingStore, StoreWrite, WriteBatch,
};
use super::scoring::{PerformanceScore, ScoringConfig, ScoringEngine};
use super::tier::{ensure_capacity, TierDecision, TierPolicy};

const SYSTEM_ACTOR: &str = "system";

/// Score plus the tier it would produce, without writing anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReview {
    pub score: PerformanceScore,
    pub current_tier: PairingTier,
    pub decision: TierDecision,
    pub capacity_safe: bool,
}

/// Stored result of a recalculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceUpdate {
    pub tutor_id: TutorId,
    pub score: PerformanceScore,
    pub previous_tier: PairingTier,
    pub decision: TierDecision,
    pub tier_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PerformanceRefresh {
    Updated(PerformanceUpdate),
    Deferred { reason: String },
}

/// Review and grade data captured after a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    #[serde(default)]
    pub student_attended: Option<bool>,
    #[serde(default)]
    pub student_rating: Option<u8>,
    #[serde(default)]
    pub assignment_score: Option<f64>,
    #[serde(default)]
    pub exam_score: Option<f64>,
}

impl SessionOutcome {
    pub fn validate(&self) -> Result<(), PairingError> {
        if let Some(rating) = self.student_rating {
            if !(1..=5).contains(&rating) {
                return Err(PairingError::Validation(format!(
                    "student rating must be between 1 and 5 (found {rating})"
                )));
            }
        }
        for (field, value) in [
            ("assignment_score", self.assignment_score),
            ("exam_score", self.exam_score),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                    return Err(PairingError::Validation(format!(
                        "{field} must be between 0 and 100 (found {value})"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecorded {
    pub session: Session,
    pub refresh: PerformanceRefresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierOverrideRequest {
    pub tier: PairingTier,
    pub admin_id: String,
    pub reason: String,
}

/// Service composing the scoring engine, tier policy, store, and notifier.
pub struct TutorPerformanceService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    engine: ScoringEngine,
    policy: TierPolicy,
    max_commit_attempts: u32,
}

impl<S, N> TutorPerformanceService<S, N>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifier: Arc<N>,
        config: ScoringConfig,
        max_commit_attempts: u32,
    ) -> Self {
        let policy = TierPolicy::new(config.thresholds);
        Self {
            store,
            notifier,
            engine: ScoringEngine::new(config),
            policy,
            max_commit_attempts,
        }
    }

    pub fn policy(&self) -> &TierPolicy {
        &self.policy
    }

    pub fn compute_score(&self, tutor_id: &TutorId) -> Result<PerformanceScore, PairingError> {
        self.load_tutor(tutor_id)?;
        let sessions = self.store.sessions_for_tutor(tutor_id)?;
        Ok(self.engine.score(tutor_id, &sessions))
    }

    pub fn review(&self, tutor_id: &TutorId) -> Result<PerformanceReview, PairingError> {
        let tutor = self.load_tutor(tutor_id)?;
        let sessions = self.store.sessions_for_tutor(tutor_id)?;
        let score = self.engine.score(tutor_id, &sessions);
        let decision = self.policy.tier_for(
            score.raw_score,
            score.has_minimum_data,
            tutor.pairing_tier,
            tutor.tier_override.as_ref(),
        );

        Ok(PerformanceReview {
            capacity_safe: ensure_capacity(&tutor, decision.tier).is_ok(),
            current_tier: tutor.pairing_tier,
            score,
            decision,
        })
    }

    /// Recompute score and tier and store both on the tutor.
    pub fn recalculate(
        &self,
        tutor_id: &TutorId,
        now: DateTime<Utc>,
    ) -> Result<PerformanceUpdate, PairingError> {
        let update = commit_with_retry(
            &*self.store,
            self.max_commit_attempts,
            "recalculate_performance",
            || {
                let mut tutor = self.load_tutor(tutor_id)?;
                let sessions = self.store.sessions_for_tutor(tutor_id)?;
                let score = self.engine.score(tutor_id, &sessions);
                let previous_tier = tutor.pairing_tier;
                let decision = self.policy.tier_for(
                    score.raw_score,
                    score.has_minimum_data,
                    previous_tier,
                    tutor.tier_override.as_ref(),
                );
                let tier_changed = decision.tier != previous_tier;
                if tier_changed {
                    ensure_capacity(&tutor, decision.tier)?;
                }

                tutor.performance_score = score.score;
                tutor.performance_metrics = score.metrics.clone();
                tutor.apply_tier(decision.tier);

                let mut batch = WriteBatch::new();
                batch.push(StoreWrite::PutTutor(tutor));
                if tier_changed {
                    batch.push(StoreWrite::AppendAudit(AuditLogEntry::tier_change(
                        SYSTEM_ACTOR,
                        tutor_id.clone(),
                        AuditAction::TierRecalculated,
                        previous_tier,
                        decision.tier,
                        format!("performance score {:.2}", score.score),
                        now,
                    )));
                }

                Ok((
                    batch,
                    PerformanceUpdate {
                        tutor_id: tutor_id.clone(),
                        score,
                        previous_tier,
                        decision,
                        tier_changed,
                    },
                ))
            },
        )?;

        info!(
            tutor_id = %tutor_id,
            score = update.score.score,
            has_minimum_data = update.score.has_minimum_data,
            tier = update.decision.tier.number(),
            "performance recalculated"
        );
        if update.tier_changed {
            self.notify_tier_change(tutor_id, update.previous_tier, update.decision.tier);
        }
        Ok(update)
    }

    /// Store review/grade data for a session, then refresh the tutor's tier.
    ///
    /// The session write stands even if the refresh is rejected; the refresh result
    /// says whether score and tier caught up.
    pub fn record_session_outcome(
        &self,
        session_id: &SessionId,
        outcome: SessionOutcome,
        now: DateTime<Utc>,
    ) -> Result<SessionRecorded, PairingError> {
        outcome.validate()?;

        let session = commit_with_retry(
            &*self.store,
            self.max_commit_attempts,
            "record_session_outcome",
            || {
                let mut session = self
                    .store
                    .session(session_id)?
                    .ok_or_else(|| PairingError::not_found(EntityKind::Session, session_id))?;
                if session.status == SessionStatus::Cancelled {
                    return Err(PairingError::Validation(format!(
                        "session '{session_id}' was cancelled"
                    )));
                }

                session.status = SessionStatus::Completed;
                if outcome.student_attended.is_some() {
                    session.student_attended = outcome.student_attended;
                }
                if outcome.student_rating.is_some() {
                    session.student_rating = outcome.student_rating;
                }
                if outcome.assignment_score.is_some() {
                    session.assignment_score = outcome.assignment_score;
                }
                if outcome.exam_score.is_some() {
                    session.exam_score = outcome.exam_score;
                }

                let batch = WriteBatch::new().with(StoreWrite::PutSession(session.clone()));
                session.version += 1;
                Ok((batch, session))
            },
        )?;

        let refresh = match self.recalculate(&session.tutor_id, now) {
            Ok(update) => PerformanceRefresh::Updated(update),
            Err(err) => {
                warn!(
                    tutor_id = %session.tutor_id,
                    session_id = %session.id,
                    error = %err,
                    "performance refresh deferred"
                );
                PerformanceRefresh::Deferred {
                    reason: err.to_string(),
                }
            }
        };

        Ok(SessionRecorded { session, refresh })
    }

    /// Pin a tier until explicitly cleared.
    pub fn override_tier(
        &self,
        tutor_id: &TutorId,
        request: TierOverrideRequest,
        now: DateTime<Utc>,
    ) -> Result<Tutor, PairingError> {
        if request.admin_id.trim().is_empty() {
            return Err(PairingError::Validation(
                "tier override requires an admin id".to_string(),
            ));
        }
        if request.reason.trim().is_empty() {
            return Err(PairingError::Validation(
                "tier override requires a reason".to_string(),
            ));
        }

        let (tutor, previous_tier) = commit_with_retry(
            &*self.store,
            self.max_commit_attempts,
            "override_tier",
            || {
                let mut tutor = self.load_tutor(tutor_id)?;
                ensure_capacity(&tutor, request.tier)?;
                let previous_tier = tutor.pairing_tier;

                tutor.tier_override = Some(TierOverride {
                    tier: request.tier,
                    set_by: request.admin_id.clone(),
                    reason: request.reason.clone(),
                    set_at: now,
                });
                tutor.apply_tier(request.tier);

                let batch = WriteBatch::new()
                    .with(StoreWrite::PutTutor(tutor.clone()))
                    .with(StoreWrite::AppendAudit(AuditLogEntry::tier_change(
                        request.admin_id.clone(),
                        tutor_id.clone(),
                        AuditAction::TierOverrideSet,
                        previous_tier,
                        request.tier,
                        request.reason.clone(),
                        now,
                    )));
                tutor.version += 1;
                Ok((batch, (tutor, previous_tier)))
            },
        )?;

        info!(
            tutor_id = %tutor_id,
            admin_id = %request.admin_id,
            from = previous_tier.number(),
            to = tutor.pairing_tier.number(),
            "tier override set"
        );
        if previous_tier != tutor.pairing_tier {
            self.notify_tier_change(tutor_id, previous_tier, tutor.pairing_tier);
        }
        Ok(tutor)
    }

    /// Drop the override and fall back to the tier implied by stored metrics.
    pub fn clear_tier_override(
        &self,
        tutor_id: &TutorId,
        admin_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Tutor, PairingError> {
        let (tutor, previous_tier) = commit_with_retry(
            &*self.store,
            self.max_commit_attempts,
            "clear_tier_override",
            || {
                let mut tutor = self.load_tutor(tutor_id)?;
                if tutor.tier_override.is_none() {
                    return Err(PairingError::Validation(format!(
                        "tutor '{tutor_id}' has no tier override in force"
                    )));
                }

                let previous_tier = tutor.pairing_tier;
                let decision = self.policy.tier_for(
                    tutor.performance_score,
                    tutor.performance_metrics.has_minimum_data,
                    previous_tier,
                    None,
                );
                ensure_capacity(&tutor, decision.tier)?;

                tutor.tier_override = None;
                tutor.apply_tier(decision.tier);

                let batch = WriteBatch::new()
                    .with(StoreWrite::PutTutor(tutor.clone()))
                    .with(StoreWrite::AppendAudit(AuditLogEntry::tier_change(
                        admin_id,
                        tutor_id.clone(),
                        AuditAction::TierOverrideCleared,
                        previous_tier,
                        decision.tier,
                        format!("restored {:?} tier", decision.basis),
                        now,
                    )));
                tutor.version += 1;
                Ok((batch, (tutor, previous_tier)))
            },
        )?;

        info!(
            tutor_id = %tutor_id,
            admin_id,
            tier = tutor.pairing_tier.number(),
            "tier override cleared"
        );
        if previous_tier != tutor.pairing_tier {
            self.notify_tier_change(tutor_id, previous_tier, tutor.pairing_tier);
        }
        Ok(tutor)
    }

    /// Mark a tutor who passed an interview as matchable at tier 1.
    pub fn complete_onboarding(
        &self,
        tutor_id: &TutorId,
        now: DateTime<Utc>,
    ) -> Result<Tutor, PairingError> {
        let tutor = commit_with_retry(
            &*self.store,
            self.max_commit_attempts,
            "complete_onboarding",
            || {
                let mut tutor = self.load_tutor(tutor_id)?;
                if tutor.onboarding_completed {
                    return Err(PairingError::Validation(format!(
                        "tutor '{tutor_id}' already completed onboarding"
                    )));
                }
                if !matches!(tutor.tutor_status, TutorStatus::Passed | TutorStatus::Active) {
                    return Err(PairingError::Validation(format!(
                        "tutor '{tutor_id}' is {} and cannot onboard",
                        tutor.tutor_status.label()
                    )));
                }
                let passed_any = self
                    .store
                    .tutor_courses_for_tutor(tutor_id)?
                    .iter()
                    .any(|record| record.interview_status == InterviewStatus::Passed);
                if !passed_any {
                    return Err(PairingError::Validation(format!(
                        "tutor '{tutor_id}' has not passed an interview for any course"
                    )));
                }
                ensure_capacity(&tutor, PairingTier::One)?;

                tutor.onboarding_completed = true;
                tutor.tutor_status = TutorStatus::Active;
                tutor.apply_tier(PairingTier::One);

                let batch = WriteBatch::new().with(StoreWrite::PutTutor(tutor.clone()));
                tutor.version += 1;
                Ok((batch, tutor))
            },
        )?;

        info!(tutor_id = %tutor_id, onboarded_at = %now, "tutor onboarding completed");
        notify_best_effort(
            &*self.notifier,
            Notification::new(NotificationTemplate::OnboardingReady, tutor.id.as_str())
                .detail("email", &tutor.email)
                .detail("tier", tutor.pairing_tier.number()),
        );
        Ok(tutor)
    }

    pub fn audit_log(&self, tutor_id: &TutorId) -> Result<Vec<AuditLogEntry>, PairingError> {
        self.load_tutor(tutor_id)?;
        Ok(self.store.audit_log(tutor_id)?)
    }

    pub fn tutor(&self, tutor_id: &TutorId) -> Result<Tutor, PairingError> {
        self.load_tutor(tutor_id)
    }

    fn load_tutor(&self, tutor_id: &TutorId) -> Result<Tutor, PairingError> {
        self.store
            .tutor(tutor_id)?
            .filter(|tutor| tutor.role == UserRole::Tutor)
            .ok_or_else(|| PairingError::not_found(EntityKind::Tutor, tutor_id))
    }

    fn notify_tier_change(&self, tutor_id: &TutorId, from: PairingTier, to: PairingTier) {
        notify_best_effort(
            &*self.notifier,
            Notification::new(NotificationTemplate::TierChanged, tutor_id.as_str())
                .detail("previous_tier", from.number())
                .detail("new_tier", to.number())
                .detail("label", to.label())
                .detail("max_concurrent_students", to.max_concurrent_students()),
        );
    }
}
