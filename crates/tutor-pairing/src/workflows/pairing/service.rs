use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{
    CourseId, DeclineReason, Enrollment, EnrollmentStatus, Pairing, PairingId, StudentId,
    TutorId, TutorResponse, TutorStatus,
};
use super::error::{EntityKind, PairingError};
use super::lifecycle::{PairingAction, TutorDecision};
use super::matcher::{MatchCandidate, MatchRequest, MatchSnapshot, Matcher};
use super::reassignment::{declined_tutors, Reassignment, ReassignmentCoordinator};
use super::repository::{
    commit_with_retry, notify_best_effort, Notification, NotificationTemplate, Notifier,
    PairingStore, StoreWrite, WriteBatch,
};

/// Pairing lifecycle knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingConfig {
    pub response_window_hours: i64,
    pub max_commit_attempts: u32,
}

impl PairingConfig {
    pub fn response_window(&self) -> Result<Duration, PairingError> {
        Duration::try_hours(self.response_window_hours)
            .filter(|window| *window > Duration::zero())
            .ok_or_else(|| {
                PairingError::Validation(format!(
                    "response window of {} hours is out of range",
                    self.response_window_hours
                ))
            })
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            response_window_hours: 48,
            max_commit_attempts: 3,
        }
    }
}

/// Pairing and enrollment as stored after an accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedPairing {
    pub pairing: Pairing,
    pub enrollment: Enrollment,
}

/// Declined pairing plus whatever the reassignment round produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclineOutcome {
    pub declined: Pairing,
    pub reassignment: Reassignment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ResponseOutcome {
    Accepted(AcceptedPairing),
    Declined(DeclineOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryFailure {
    pub pairing_id: PairingId,
    pub error: String,
}

/// Summary of one expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirySweep {
    pub expired: Vec<DeclineOutcome>,
    pub failed: Vec<ExpiryFailure>,
}

/// Service composing the matcher, lifecycle rules, store, and notifier.
pub struct PairingService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    matcher: Matcher,
    config: PairingConfig,
}

impl<S, N> PairingService<S, N>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, config: PairingConfig) -> Self {
        Self {
            store,
            notifier,
            matcher: Matcher::new(),
            config,
        }
    }

    pub fn config(&self) -> &PairingConfig {
        &self.config
    }

    /// Select a tutor without creating anything.
    pub fn find_tutor(&self, request: &MatchRequest) -> Result<MatchCandidate, PairingError> {
        let snapshot = self.load_snapshot(&request.course_id)?;
        let excluded: BTreeSet<TutorId> = request.excluded_tutor_ids.iter().cloned().collect();

        match self
            .matcher
            .select(&snapshot, &request.course_id, &excluded)
        {
            Ok(candidate) => {
                debug!(
                    student_id = %request.student_id,
                    course_id = %request.course_id,
                    tutor_id = %candidate.tutor_id,
                    available_slots = candidate.available_slots,
                    "matched tutor"
                );
                Ok(candidate)
            }
            Err(reason) => {
                info!(
                    student_id = %request.student_id,
                    course_id = %request.course_id,
                    ?reason,
                    "no eligible tutor"
                );
                Err(reason.into())
            }
        }
    }

    /// Match the enrollment to a tutor and store a pending offer.
    pub fn request_pairing(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
        now: DateTime<Utc>,
    ) -> Result<Pairing, PairingError> {
        let window = self.config.response_window()?;
        let pairing = commit_with_retry(
            &*self.store,
            self.config.max_commit_attempts,
            "request_pairing",
            || {
                let mut enrollment = self.load_enrollment(student_id, course_id)?;
                if enrollment.status != EnrollmentStatus::PendingPairing {
                    return Err(PairingError::Validation(format!(
                        "enrollment of student '{student_id}' in course '{course_id}' is {}",
                        enrollment.status.label()
                    )));
                }

                let history = self.store.pairings_for_enrollment(student_id, course_id)?;
                if let Some(open) = history.iter().find(|pairing| pairing.is_open()) {
                    return Err(PairingError::Validation(format!(
                        "pairing '{}' is still {} for this enrollment",
                        open.id, open.status
                    )));
                }

                let excluded = declined_tutors(&history, None);
                let snapshot = self.load_snapshot(course_id)?;
                let candidate = self.matcher.select(&snapshot, course_id, &excluded)?;
                let attempt = history
                    .iter()
                    .map(|pairing| pairing.assignment_attempt)
                    .max()
                    .unwrap_or(0)
                    + 1;

                let pairing = Pairing::offer(
                    student_id.clone(),
                    candidate.tutor_id,
                    course_id.clone(),
                    now,
                    window,
                    attempt,
                )?;
                enrollment.current_pairing_id = Some(pairing.id.clone());

                let batch = WriteBatch::new()
                    .with(StoreWrite::PutPairing(pairing.clone()))
                    .with(StoreWrite::PutEnrollment(enrollment));
                Ok((batch, committed_pairing(pairing)))
            },
        )?;

        info!(
            pairing_id = %pairing.id,
            tutor_id = %pairing.tutor_id,
            student_id = %pairing.student_id,
            attempt = pairing.assignment_attempt,
            "pairing requested"
        );
        self.notify_offer(&pairing);
        Ok(pairing)
    }

    /// Apply the assigned tutor's answer to a pending pairing.
    pub fn respond(
        &self,
        pairing_id: &PairingId,
        responder: &TutorId,
        decision: TutorDecision,
        now: DateTime<Utc>,
    ) -> Result<ResponseOutcome, PairingError> {
        match decision {
            TutorDecision::Accept => self
                .accept(pairing_id, responder, now)
                .map(ResponseOutcome::Accepted),
            TutorDecision::Decline => self
                .decline(pairing_id, Some(responder), DeclineReason::Tutor, now)
                .map(ResponseOutcome::Declined),
        }
    }

    fn accept(
        &self,
        pairing_id: &PairingId,
        responder: &TutorId,
        now: DateTime<Utc>,
    ) -> Result<AcceptedPairing, PairingError> {
        let accepted = commit_with_retry(
            &*self.store,
            self.config.max_commit_attempts,
            "accept_pairing",
            || {
                let mut pairing = self.load_pairing(pairing_id)?;
                ensure_responder(&pairing, responder)?;
                pairing.status = pairing.status.apply(PairingAction::Accept)?;
                pairing.tutor_response = Some(TutorResponse::Accepted);
                pairing.responded_at = Some(now);

                let mut enrollment = self.load_enrollment(&pairing.student_id, &pairing.course_id)?;
                if enrollment.status != EnrollmentStatus::PendingPairing {
                    return Err(PairingError::Validation(format!(
                        "enrollment is {} and cannot take a tutor",
                        enrollment.status.label()
                    )));
                }
                enrollment.status = EnrollmentStatus::Active;
                enrollment.tutor_id = Some(pairing.tutor_id.clone());
                enrollment.current_pairing_id = Some(pairing.id.clone());

                let batch = WriteBatch::new()
                    .with(StoreWrite::PutPairing(pairing.clone()))
                    .with(StoreWrite::IncrementStudents {
                        tutor_id: pairing.tutor_id.clone(),
                    })
                    .with(StoreWrite::PutEnrollment(enrollment.clone()));

                enrollment.version += 1;
                Ok((
                    batch,
                    AcceptedPairing {
                        pairing: committed_pairing(pairing),
                        enrollment,
                    },
                ))
            },
        )?;

        info!(
            pairing_id = %accepted.pairing.id,
            tutor_id = %accepted.pairing.tutor_id,
            student_id = %accepted.pairing.student_id,
            "pairing accepted"
        );
        notify_best_effort(
            &*self.notifier,
            Notification::new(
                NotificationTemplate::PairingAccepted,
                accepted.pairing.student_id.as_str(),
            )
            .detail("pairing_id", &accepted.pairing.id)
            .detail("tutor_id", &accepted.pairing.tutor_id)
            .detail("course_id", &accepted.pairing.course_id),
        );
        Ok(accepted)
    }

    fn decline(
        &self,
        pairing_id: &PairingId,
        responder: Option<&TutorId>,
        reason: DeclineReason,
        now: DateTime<Utc>,
    ) -> Result<DeclineOutcome, PairingError> {
        let coordinator =
            ReassignmentCoordinator::new(&self.matcher, self.config.response_window()?);
        let outcome = commit_with_retry(
            &*self.store,
            self.config.max_commit_attempts,
            "decline_pairing",
            || {
                let mut pairing = self.load_pairing(pairing_id)?;
                if let Some(responder) = responder {
                    ensure_responder(&pairing, responder)?;
                }
                let action = match reason {
                    DeclineReason::Tutor => PairingAction::Decline,
                    DeclineReason::Expired => PairingAction::Expire,
                };
                pairing.status = pairing.status.apply(action)?;
                pairing.decline_reason = Some(reason);
                if reason == DeclineReason::Tutor {
                    pairing.tutor_response = Some(TutorResponse::Declined);
                    pairing.responded_at = Some(now);
                }

                let mut enrollment = self.load_enrollment(&pairing.student_id, &pairing.course_id)?;
                let history = self
                    .store
                    .pairings_for_enrollment(&pairing.student_id, &pairing.course_id)?;
                let snapshot = self.load_snapshot(&pairing.course_id)?;
                let reassignment = coordinator.plan(&pairing, &history, &snapshot, now)?;

                let mut batch = WriteBatch::new();
                batch.push(StoreWrite::PutPairing(pairing.clone()));
                enrollment.current_pairing_id =
                    reassignment.new_pairing().map(|next| next.id.clone());
                batch.push(StoreWrite::PutEnrollment(enrollment));

                let reassignment = match reassignment {
                    Reassignment::Reassigned { pairing: next } => {
                        batch.push(StoreWrite::PutPairing(next.clone()));
                        Reassignment::Reassigned {
                            pairing: committed_pairing(next),
                        }
                    }
                    unassigned => unassigned,
                };

                Ok((
                    batch,
                    DeclineOutcome {
                        declined: committed_pairing(pairing),
                        reassignment,
                    },
                ))
            },
        )?;

        info!(
            pairing_id = %outcome.declined.id,
            tutor_id = %outcome.declined.tutor_id,
            ?reason,
            reassigned = outcome.reassignment.new_pairing().is_some(),
            "pairing declined"
        );
        self.notify_decline(&outcome);
        Ok(outcome)
    }

    /// `accepted -> active` once tutoring starts.
    pub fn activate(&self, pairing_id: &PairingId) -> Result<Pairing, PairingError> {
        let pairing = commit_with_retry(
            &*self.store,
            self.config.max_commit_attempts,
            "activate_pairing",
            || {
                let mut pairing = self.load_pairing(pairing_id)?;
                pairing.status = pairing.status.apply(PairingAction::Activate)?;
                let batch = WriteBatch::new().with(StoreWrite::PutPairing(pairing.clone()));
                Ok((batch, committed_pairing(pairing)))
            },
        )?;

        info!(pairing_id = %pairing.id, "pairing active");
        Ok(pairing)
    }

    /// `active -> completed`; frees the tutor's slot and closes the enrollment.
    pub fn complete(&self, pairing_id: &PairingId) -> Result<Pairing, PairingError> {
        let pairing = commit_with_retry(
            &*self.store,
            self.config.max_commit_attempts,
            "complete_pairing",
            || {
                let mut pairing = self.load_pairing(pairing_id)?;
                pairing.status = pairing.status.apply(PairingAction::Complete)?;

                let mut batch = WriteBatch::new();
                batch.push(StoreWrite::PutPairing(pairing.clone()));
                batch.push(StoreWrite::ReleaseStudent {
                    tutor_id: pairing.tutor_id.clone(),
                });
                if let Some(mut enrollment) = self
                    .store
                    .enrollment(&pairing.student_id, &pairing.course_id)?
                {
                    enrollment.status = EnrollmentStatus::Completed;
                    enrollment.progress = 100;
                    batch.push(StoreWrite::PutEnrollment(enrollment));
                }
                Ok((batch, committed_pairing(pairing)))
            },
        )?;

        info!(
            pairing_id = %pairing.id,
            tutor_id = %pairing.tutor_id,
            "pairing completed"
        );
        Ok(pairing)
    }

    /// Decline every pending pairing past its response window and reassign it.
    ///
    /// Nothing expires on its own; an external scheduler decides when to sweep.
    /// A store failure ends the sweep early but keeps what was already committed.
    pub fn expire_stale_pairings(&self, now: DateTime<Utc>) -> Result<ExpirySweep, PairingError> {
        let mut sweep = ExpirySweep::default();

        for pairing in self.store.pending_pairings()? {
            if !pairing.is_expired(now) {
                continue;
            }

            match self.decline(&pairing.id, None, DeclineReason::Expired, now) {
                Ok(outcome) => sweep.expired.push(outcome),
                Err(PairingError::InvalidTransition { .. }) => {
                    debug!(pairing_id = %pairing.id, "pairing answered before expiry");
                }
                Err(err @ PairingError::Storage(_)) => {
                    warn!(pairing_id = %pairing.id, error = %err, "store failed, stopping sweep");
                    sweep.failed.push(ExpiryFailure {
                        pairing_id: pairing.id.clone(),
                        error: err.to_string(),
                    });
                    break;
                }
                Err(err) => {
                    warn!(pairing_id = %pairing.id, error = %err, "could not expire pairing");
                    sweep.failed.push(ExpiryFailure {
                        pairing_id: pairing.id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        if !sweep.expired.is_empty() {
            info!(expired = sweep.expired.len(), "expired stale pairings");
        }
        Ok(sweep)
    }

    pub fn get(&self, pairing_id: &PairingId) -> Result<Pairing, PairingError> {
        self.load_pairing(pairing_id)
    }

    fn load_snapshot(&self, course_id: &CourseId) -> Result<MatchSnapshot, PairingError> {
        Ok(MatchSnapshot {
            tutors: self.store.tutors_with_status(TutorStatus::Active)?,
            tutor_courses: self.store.tutor_courses_for_course(course_id)?,
        })
    }

    fn load_pairing(&self, pairing_id: &PairingId) -> Result<Pairing, PairingError> {
        self.store
            .pairing(pairing_id)?
            .ok_or_else(|| PairingError::not_found(EntityKind::Pairing, pairing_id))
    }

    fn load_enrollment(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Enrollment, PairingError> {
        self.store.enrollment(student_id, course_id)?.ok_or_else(|| {
            PairingError::not_found(EntityKind::Enrollment, format!("{student_id}/{course_id}"))
        })
    }

    fn notify_offer(&self, pairing: &Pairing) {
        notify_best_effort(
            &*self.notifier,
            Notification::new(
                NotificationTemplate::PairingRequested,
                pairing.tutor_id.as_str(),
            )
            .detail("pairing_id", &pairing.id)
            .detail("student_id", &pairing.student_id)
            .detail("course_id", &pairing.course_id)
            .detail("expires_at", pairing.expires_at.to_rfc3339()),
        );
    }

    fn notify_decline(&self, outcome: &DeclineOutcome) {
        let declined = &outcome.declined;
        let reason = match declined.decline_reason {
            Some(DeclineReason::Expired) => "expired",
            _ => "tutor",
        };
        notify_best_effort(
            &*self.notifier,
            Notification::new(NotificationTemplate::PairingDeclined, Notification::ADMINS)
                .detail("pairing_id", &declined.id)
                .detail("tutor_id", &declined.tutor_id)
                .detail("student_id", &declined.student_id)
                .detail("reason", reason),
        );

        match &outcome.reassignment {
            Reassignment::Reassigned { pairing } => self.notify_offer(pairing),
            Reassignment::Unassigned {
                reason,
                excluded_tutor_ids,
            } => notify_best_effort(
                &*self.notifier,
                Notification::new(NotificationTemplate::PairingUnassigned, Notification::ADMINS)
                    .detail("student_id", &declined.student_id)
                    .detail("course_id", &declined.course_id)
                    .detail("reason", reason)
                    .detail("excluded_tutors", excluded_tutor_ids.len()),
            ),
        }
    }
}

fn ensure_responder(pairing: &Pairing, responder: &TutorId) -> Result<(), PairingError> {
    if &pairing.tutor_id == responder {
        Ok(())
    } else {
        Err(PairingError::Unauthorized {
            pairing_id: pairing.id.clone(),
            responder: responder.clone(),
        })
    }
}

/// The store bumps the version of every document it writes.
fn committed_pairing(mut pairing: Pairing) -> Pairing {
    pairing.version += 1;
    pairing
}
