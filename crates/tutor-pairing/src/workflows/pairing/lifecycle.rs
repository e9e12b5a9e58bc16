use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::PairingStatus;

/// Events that move a pairing through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingAction {
    Accept,
    Decline,
    Expire,
    Activate,
    Complete,
}

impl PairingAction {
    pub const fn label(self) -> &'static str {
        match self {
            PairingAction::Accept => "accept",
            PairingAction::Decline => "decline",
            PairingAction::Expire => "expire",
            PairingAction::Activate => "activate",
            PairingAction::Complete => "complete",
        }
    }
}

impl fmt::Display for PairingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A tutor's answer to a pending pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TutorDecision {
    Accept,
    Decline,
}

impl From<TutorDecision> for PairingAction {
    fn from(value: TutorDecision) -> Self {
        match value {
            TutorDecision::Accept => PairingAction::Accept,
            TutorDecision::Decline => PairingAction::Decline,
        }
    }
}

/// Rejected lifecycle move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: PairingStatus,
    pub action: PairingAction,
}

impl PairingStatus {
    /// Exhaustive transition table; `declined` and `completed` have no exits.
    pub fn apply(self, action: PairingAction) -> Result<PairingStatus, InvalidTransition> {
        use PairingAction as A;
        use PairingStatus as S;

        match (self, action) {
            (S::Pending, A::Accept) => Ok(S::Accepted),
            (S::Pending, A::Decline | A::Expire) => Ok(S::Declined),
            (S::Accepted, A::Activate) => Ok(S::Active),
            (S::Active, A::Complete) => Ok(S::Completed),
            (from, action) => Err(InvalidTransition { from, action }),
        }
    }
}
