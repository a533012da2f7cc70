use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// The two lifecycle flags held by the contract. `finalized` implies `started`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionStatus {
    pub started: bool,
    pub finalized: bool,
}

impl ElectionStatus {
    pub fn phase(&self) -> ElectionPhase {
        if self.finalized {
            ElectionPhase::Finalized
        } else if self.started {
            ElectionPhase::InProgress
        } else {
            ElectionPhase::NotStarted
        }
    }
}

/// States in the election lifecycle. Each transition is a one-way admin action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElectionPhase {
    /// Candidates may still be added.
    NotStarted,
    /// Registered voters may vote.
    InProgress,
    /// Counting is over and the winner is fixed.
    Finalized,
}

impl ElectionPhase {
    /// The status line shown to visitors.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::NotStarted => "The election has not started yet.",
            Self::InProgress => "The election is currently in progress.",
            Self::Finalized => "The election has ended.",
        }
    }
}

impl Display for ElectionPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Finalized => "Finalized",
        };
        write!(f, "{label}")
    }
}

/// A candidate as last read from the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Position assigned by the contract on creation.
    pub index: u64,
    pub name: String,
    pub vote_count: u64,
}

/// Per-account registration state. `has_voted` implies `is_registered`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterStatus {
    pub is_registered: bool,
    pub has_voted: bool,
}

/// The winner reported by a finalized contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub name: String,
    pub vote_total: u64,
}

impl Display for Winner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} with {} votes", self.name, self.vote_total)
    }
}
