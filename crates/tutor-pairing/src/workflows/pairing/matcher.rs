use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{CourseId, PairingTier, StudentId, Tutor, TutorCourse, TutorId};
use super::error::NoEligibleTutor;

/// Input to a match attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub student_id: StudentId,
    pub course_id: CourseId,
    #[serde(default)]
    pub excluded_tutor_ids: Vec<TutorId>,
}

/// Tutors and qualification records read for one course.
#[derive(Debug, Clone, Default)]
pub struct MatchSnapshot {
    pub tutors: Vec<Tutor>,
    pub tutor_courses: Vec<TutorCourse>,
}

/// Selected tutor plus diagnostics for the admin UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub tutor_id: TutorId,
    pub available_slots: u32,
    pub pairing_tier: PairingTier,
    pub registered_at: DateTime<Utc>,
}

/// First-come-first-served tutor selection. Pure: reads the snapshot, writes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher;

impl Matcher {
    pub fn new() -> Self {
        Self
    }

    pub fn select(
        &self,
        snapshot: &MatchSnapshot,
        course_id: &CourseId,
        excluded: &BTreeSet<TutorId>,
    ) -> Result<MatchCandidate, NoEligibleTutor> {
        let mut active: Vec<&Tutor> = snapshot
            .tutors
            .iter()
            .filter(|tutor| tutor.is_active_tutor())
            .collect();
        if active.is_empty() {
            return Err(NoEligibleTutor::NoActiveTutors);
        }

        // Earliest registration wins; id keeps equal timestamps deterministic.
        active.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let qualified: HashSet<&TutorId> = snapshot
            .tutor_courses
            .iter()
            .filter(|record| record.qualifies(course_id))
            .map(|record| &record.tutor_id)
            .collect();
        let teaching: Vec<&Tutor> = active
            .into_iter()
            .filter(|tutor| qualified.contains(&tutor.id))
            .collect();
        if teaching.is_empty() {
            return Err(NoEligibleTutor::NoCourseMatch);
        }

        teaching
            .into_iter()
            .find(|tutor| tutor.has_capacity() && !excluded.contains(&tutor.id))
            .map(|tutor| MatchCandidate {
                tutor_id: tutor.id.clone(),
                available_slots: tutor.available_slots(),
                pairing_tier: tutor.pairing_tier,
                registered_at: tutor.created_at,
            })
            .ok_or(NoEligibleTutor::NoCapacity)
    }
}
