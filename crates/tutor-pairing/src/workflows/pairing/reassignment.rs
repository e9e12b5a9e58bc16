use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Pairing, PairingStatus, TutorId};
use super::error::{NoEligibleTutor, PairingError};
use super::matcher::{MatchSnapshot, Matcher};

/// Result of looking for a replacement after a decline or expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reassignment {
    Reassigned {
        pairing: Pairing,
    },
    Unassigned {
        reason: NoEligibleTutor,
        excluded_tutor_ids: Vec<TutorId>,
    },
}

impl Reassignment {
    pub fn new_pairing(&self) -> Option<&Pairing> {
        match self {
            Reassignment::Reassigned { pairing } => Some(pairing),
            Reassignment::Unassigned { .. } => None,
        }
    }
}

/// Every tutor that already passed on this enrollment, including the one declining now.
pub fn declined_tutors(history: &[Pairing], declining: Option<&TutorId>) -> BTreeSet<TutorId> {
    history
        .iter()
        .filter(|pairing| pairing.status == PairingStatus::Declined)
        .map(|pairing| pairing.tutor_id.clone())
        .chain(declining.cloned())
        .collect()
}

/// Re-runs the matcher with an exclusion set accumulated across decline rounds.
#[derive(Debug, Clone, Copy)]
pub struct ReassignmentCoordinator<'a> {
    matcher: &'a Matcher,
    response_window: Duration,
}

impl<'a> ReassignmentCoordinator<'a> {
    pub fn new(matcher: &'a Matcher, response_window: Duration) -> Self {
        Self {
            matcher,
            response_window,
        }
    }

    /// Build (but do not store) the follow-up offer for a declined pairing.
    pub fn plan(
        &self,
        declined: &Pairing,
        history: &[Pairing],
        snapshot: &MatchSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Reassignment, PairingError> {
        let excluded = declined_tutors(history, Some(&declined.tutor_id));
        let latest_attempt = history
            .iter()
            .map(|pairing| pairing.assignment_attempt)
            .chain(std::iter::once(declined.assignment_attempt))
            .max()
            .unwrap_or(declined.assignment_attempt);

        let reassignment = match self.matcher.select(snapshot, &declined.course_id, &excluded) {
            Ok(candidate) => Reassignment::Reassigned {
                pairing: Pairing::offer(
                    declined.student_id.clone(),
                    candidate.tutor_id,
                    declined.course_id.clone(),
                    now,
                    self.response_window,
                    latest_attempt + 1,
                )?,
            },
            Err(reason) => Reassignment::Unassigned {
                reason,
                excluded_tutor_ids: excluded.into_iter().collect(),
            },
        };
        Ok(reassignment)
    }
}
