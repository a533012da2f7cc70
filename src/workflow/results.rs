use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::contract::{self, ContractError, VotingContract};
use crate::model::{Candidate, Winner};

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateResult {
    pub index: u64,
    pub name: String,
    pub votes: u64,
    /// Percentage of all votes cast, `0.0` while nobody has voted.
    pub share: f64,
}

/// The line summarising the election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Headline {
    /// Fixed by the contract once finalized.
    Winner(Winner),
    /// Whoever is ahead so far. Ties go to the later candidate.
    Leading(String),
    /// No candidates yet.
    Undecided,
}

impl Display for Headline {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Winner(winner) => write!(f, "{winner}"),
            Self::Leading(name) => write!(f, "{name} is currently leading"),
            Self::Undecided => write!(f, "N/A"),
        }
    }
}

/// A snapshot of the tally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Results {
    pub finalized: bool,
    pub total_votes: u64,
    pub candidates: Vec<CandidateResult>,
    pub headline: Headline,
}

impl Results {
    /// Read everything needed for a snapshot from the contract.
    pub async fn load<C: VotingContract + ?Sized>(contract: &C) -> contract::Result<Self> {
        let finalized = contract.election_finalized().await?;
        let candidates = contract.candidates().await?;
        let winner = if finalized {
            Some(contract.get_winner().await?)
        } else {
            None
        };
        Self::tally(finalized, &candidates, winner)
    }

    /// Summarise a candidate list. Fails if the counts cannot all be genuine,
    /// i.e. their sum overflows.
    pub fn tally(
        finalized: bool,
        candidates: &[Candidate],
        winner: Option<Winner>,
    ) -> contract::Result<Self> {
        let total_votes = candidates
            .iter()
            .try_fold(0u64, |total, c| total.checked_add(c.vote_count))
            .ok_or_else(|| ContractError::Malformed("vote counts overflow".to_string()))?;
        let rows = candidates
            .iter()
            .map(|c| CandidateResult {
                index: c.index,
                name: c.name.clone(),
                votes: c.vote_count,
                share: if total_votes == 0 {
                    0.0
                } else {
                    c.vote_count as f64 / total_votes as f64 * 100.0
                },
            })
            .collect();

        let leader = candidates
            .iter()
            .reduce(|ahead, next| {
                if ahead.vote_count > next.vote_count {
                    ahead
                } else {
                    next
                }
            })
            .map(|c| c.name.clone());
        let headline = match (winner, leader) {
            (Some(winner), _) => Headline::Winner(winner),
            (None, Some(name)) => Headline::Leading(name),
            (None, None) => Headline::Undecided,
        };

        Ok(Self {
            finalized,
            total_votes,
            candidates: rows,
            headline,
        })
    }
}
