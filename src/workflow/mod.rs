//! Client-side workflows over the election contract.
//!
//! Workflows cache what they last read and only advance their state once a
//! transaction is confirmed. Every failure leaves them as they were before
//! the call, so the same action can simply be tried again.

use thiserror::Error;

use crate::contract::ContractError;
use crate::hasher::HasherError;

pub mod admin;
pub mod dashboard;
pub mod results;
pub mod voter;

pub use admin::AdminWorkflow;
pub use dashboard::{Action, Dashboard, Notice, NoticeKind, Session, WalletEvent};
pub use results::{CandidateResult, Headline, Results};
pub use voter::{VoterState, VoterWorkflow};

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Actions the client refuses to attempt, mirroring controls a page would disable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Precondition {
    #[error("Connect a wallet first.")]
    NotConnected,
    #[error("Voter status has not been loaded yet.")]
    StatusUnknown,
    #[error("Election status has not been loaded yet.")]
    ElectionUnknown,
    #[error("You are already registered.")]
    AlreadyRegistered,
    #[error("You are not registered to vote.")]
    NotRegistered,
    #[error("You have already voted.")]
    AlreadyVoted,
    #[error("Please select a candidate to vote for.")]
    NoCandidateSelected,
    #[error("Candidate #{0} does not exist.")]
    UnknownCandidate(u64),
    #[error("Identity is required.")]
    EmptyIdentity,
    #[error("Candidate name is required.")]
    EmptyCandidateName,
    #[error("Access denied. Only the contract owner can manage the election.")]
    NotAdmin,
    #[error("The election has already started.")]
    ElectionStarted,
    #[error("The election has not started yet.")]
    ElectionNotStarted,
    #[error("The election has already been finalized.")]
    ElectionFinalized,
}

/// Everything that can go wrong in a workflow. None of it is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// The node could not be reached or answered nonsense.
    #[error("{0}")]
    Unavailable(String),
    /// The contract refused, with its reason if it gave one.
    #[error("{}", .0.as_deref().unwrap_or("Transaction failed."))]
    Rejected(Option<String>),
    #[error(transparent)]
    Hashing(#[from] HasherError),
    #[error(transparent)]
    Precondition(#[from] Precondition),
}

impl WorkflowError {
    /// Whether the failure came from an unreachable node or relay rather than a refusal.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Hashing(HasherError::Unavailable(_))
        )
    }
}

impl From<ContractError> for WorkflowError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::Reverted(reason) => Self::Rejected(reason),
            other => Self::Unavailable(other.to_string()),
        }
    }
}
