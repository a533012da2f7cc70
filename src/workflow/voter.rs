use std::fmt::{Display, Formatter};

use log::{info, warn};
use serde::Serialize;

use super::{Precondition, Result};
use crate::contract::VotingContract;
use crate::hasher::IdentityHasher;
use crate::model::{Candidate, TxReceipt, VoterStatus};

/// Where the connected account stands in the election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VoterState {
    /// Nothing has been read yet.
    Unknown,
    NotRegistered,
    RegisteredNotVoted,
    /// Terminal for this account.
    RegisteredVoted,
}

impl From<VoterStatus> for VoterState {
    fn from(status: VoterStatus) -> Self {
        if status.has_voted {
            Self::RegisteredVoted
        } else if status.is_registered {
            Self::RegisteredNotVoted
        } else {
            Self::NotRegistered
        }
    }
}

impl Display for VoterState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Unknown => "Unknown",
            Self::NotRegistered => "Not registered",
            Self::RegisteredNotVoted => "Registered, not yet voted",
            Self::RegisteredVoted => "Voted",
        };
        write!(f, "{label}")
    }
}

/// Registration and voting for one account.
pub struct VoterWorkflow<C, H> {
    contract: C,
    hasher: H,
    state: VoterState,
    candidates: Vec<Candidate>,
}

impl<C: VotingContract, H: IdentityHasher> VoterWorkflow<C, H> {
    pub fn new(contract: C, hasher: H) -> Self {
        Self {
            contract,
            hasher,
            state: VoterState::Unknown,
            candidates: Vec::new(),
        }
    }

    pub fn state(&self) -> VoterState {
        self.state
    }

    /// Candidates as of the last successful read.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Re-read the candidates and this account's status.
    /// Nothing is replaced unless both reads succeed.
    pub async fn refresh(&mut self) -> Result<()> {
        let candidates = self.contract.candidates().await?;
        let status = self.contract.get_my_voting_status().await?;
        self.candidates = candidates;
        self.state = status.into();
        Ok(())
    }

    pub fn can_register(&self) -> bool {
        self.state == VoterState::NotRegistered
    }

    pub fn can_vote(&self, selected: Option<u64>) -> bool {
        self.state == VoterState::RegisteredNotVoted && selected.is_some()
    }

    /// Hash `identity` and register the connected account with it.
    ///
    /// The identity is only held for the duration of the call.
    pub async fn submit_registration(&mut self, identity: &str) -> Result<TxReceipt> {
        match self.state {
            VoterState::NotRegistered => {}
            VoterState::Unknown => return Err(Precondition::StatusUnknown.into()),
            VoterState::RegisteredNotVoted | VoterState::RegisteredVoted => {
                return Err(Precondition::AlreadyRegistered.into())
            }
        }
        if identity.is_empty() {
            return Err(Precondition::EmptyIdentity.into());
        }

        let hash = self.hasher.hash(identity).await?;
        let receipt = self.contract.register_myself(hash).await?.wait().await?;
        info!(
            "Registration confirmed in block {} ({})",
            receipt.block_number, receipt.hash
        );

        self.state = VoterState::RegisteredNotVoted;
        Ok(receipt)
    }

    /// Vote for the candidate at `selected`.
    ///
    /// `None` stands for "nothing selected" and never reaches the contract.
    pub async fn submit_vote(&mut self, selected: Option<u64>) -> Result<TxReceipt> {
        let index = selected.ok_or(Precondition::NoCandidateSelected)?;
        match self.state {
            VoterState::RegisteredNotVoted => {}
            VoterState::Unknown => return Err(Precondition::StatusUnknown.into()),
            VoterState::NotRegistered => return Err(Precondition::NotRegistered.into()),
            VoterState::RegisteredVoted => return Err(Precondition::AlreadyVoted.into()),
        }
        if !self.candidates.iter().any(|c| c.index == index) {
            return Err(Precondition::UnknownCandidate(index).into());
        }

        let receipt = self.contract.vote(index).await?.wait().await?;
        info!(
            "Vote for candidate #{index} confirmed in block {}",
            receipt.block_number
        );
        self.state = VoterState::RegisteredVoted;

        // The vote stands even if the counts can't be re-read right now.
        match self.contract.candidates().await {
            Ok(candidates) => self.candidates = candidates,
            Err(e) => warn!("Could not re-read candidates after voting: {e}"),
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use crate::contract::{memory::DevChain, Connector};
    use crate::hasher::{HasherError, LocalHasher};
    use crate::model::IdentityHash;
    use crate::workflow::WorkflowError;

    use super::*;

    /// A relay that can't be reached.
    struct OfflineHasher;

    #[rocket::async_trait]
    impl IdentityHasher for OfflineHasher {
        async fn hash(&self, _identity: &str) -> std::result::Result<IdentityHash, HasherError> {
            Err(HasherError::Unavailable("connection refused".to_string()))
        }
    }

    async fn registered_voter(
        chain: &DevChain,
        n: u8,
    ) -> VoterWorkflow<<DevChain as Connector>::Contract, LocalHasher> {
        let mut voter = VoterWorkflow::new(chain.connect(DevChain::account(n)), LocalHasher);
        voter.refresh().await.unwrap();
        voter
            .submit_registration(&format!("identity-{n}"))
            .await
            .unwrap();
        voter
    }

    #[ballot_test(started)]
    async fn register_then_vote(chain: DevChain) {
        let account = DevChain::account(1);
        let mut voter = VoterWorkflow::new(chain.connect(account), LocalHasher);
        assert_eq!(voter.state(), VoterState::Unknown);

        voter.refresh().await.unwrap();
        assert_eq!(voter.state(), VoterState::NotRegistered);
        assert!(voter.can_register());
        assert!(!voter.can_vote(Some(0)));

        voter.submit_registration("A1").await.unwrap();
        assert_eq!(voter.state(), VoterState::RegisteredNotVoted);
        assert!(!voter.can_register());
        assert!(voter.can_vote(Some(0)));
        assert!(!voter.can_vote(None));

        voter.submit_vote(Some(0)).await.unwrap();
        assert_eq!(voter.state(), VoterState::RegisteredVoted);
        let counts: Vec<_> = voter
            .candidates()
            .iter()
            .map(|c| (c.name.as_str(), c.vote_count))
            .collect();
        assert_eq!(counts, [("Alice", 1), ("Bob", 0)]);

        let status = chain.voter_status(account).await;
        assert!(status.is_registered && status.has_voted);

        // A fresh read agrees.
        let mut again = VoterWorkflow::new(chain.connect(account), LocalHasher);
        again.refresh().await.unwrap();
        assert_eq!(again.state(), VoterState::RegisteredVoted);
    }

    #[ballot_test(started)]
    async fn nothing_before_first_read(chain: DevChain) {
        let mut voter = VoterWorkflow::new(chain.connect(DevChain::account(1)), LocalHasher);
        let calls = chain.call_count();
        assert_eq!(
            voter.submit_registration("A1").await,
            Err(Precondition::StatusUnknown.into())
        );
        assert_eq!(
            voter.submit_vote(Some(0)).await,
            Err(Precondition::StatusUnknown.into())
        );
        assert_eq!(chain.call_count(), calls);
    }

    #[ballot_test(started)]
    async fn registering_twice_has_no_effect(chain: DevChain) {
        let mut voter = registered_voter(&chain, 1).await;
        let before = chain.voter_status(DevChain::account(1)).await;
        let calls = chain.call_count();

        assert_eq!(
            voter.submit_registration("another").await,
            Err(Precondition::AlreadyRegistered.into())
        );
        voter.submit_vote(Some(1)).await.unwrap();
        let voted = chain.voter_status(DevChain::account(1)).await;
        let calls_after_vote = chain.call_count();
        assert_eq!(
            voter.submit_registration("another").await,
            Err(Precondition::AlreadyRegistered.into())
        );

        assert!(before.is_registered && !before.has_voted);
        assert!(calls_after_vote > calls);
        assert_eq!(chain.call_count(), calls_after_vote);
        assert_eq!(chain.voter_status(DevChain::account(1)).await, voted);
    }

    #[ballot_test(started)]
    async fn no_selection_never_reaches_contract(chain: DevChain) {
        let mut voter = registered_voter(&chain, 1).await;
        let calls = chain.call_count();
        assert_eq!(
            voter.submit_vote(None).await,
            Err(Precondition::NoCandidateSelected.into())
        );
        assert_eq!(
            voter.submit_vote(Some(9)).await,
            Err(Precondition::UnknownCandidate(9).into())
        );
        assert_eq!(chain.call_count(), calls);
        assert_eq!(voter.state(), VoterState::RegisteredNotVoted);
    }

    #[ballot_test(started)]
    async fn hashing_failure_aborts_before_contract(chain: DevChain) {
        let mut voter = VoterWorkflow::new(chain.connect(DevChain::account(1)), OfflineHasher);
        voter.refresh().await.unwrap();
        let calls = chain.call_count();

        let err = voter.submit_registration("A1").await.unwrap_err();
        assert!(err.is_network());
        assert!(matches!(err, WorkflowError::Hashing(_)));
        assert_eq!(voter.state(), VoterState::NotRegistered);
        assert_eq!(chain.call_count(), calls);

        assert_eq!(
            voter.submit_registration("").await,
            Err(Precondition::EmptyIdentity.into())
        );
    }

    #[ballot_test(started)]
    async fn contract_rejection_surfaces_reason(chain: DevChain) {
        registered_voter(&chain, 1).await;

        // Same identity as account 1.
        let mut voter = VoterWorkflow::new(chain.connect(DevChain::account(2)), LocalHasher);
        voter.refresh().await.unwrap();
        let err = voter.submit_registration("identity-1").await.unwrap_err();
        assert_eq!(err.to_string(), "Identity hash has already been used");
        assert_eq!(voter.state(), VoterState::NotRegistered);
        assert_eq!(
            chain.voter_status(DevChain::account(2)).await,
            VoterStatus::default()
        );
    }

    #[ballot_test]
    async fn vote_before_start_is_refused(chain: DevChain) {
        let owner = chain.connect(DevChain::account(0));
        owner.add_candidate("Alice").await.unwrap().wait().await.unwrap();

        let mut voter = registered_voter(&chain, 1).await;
        let err = voter.submit_vote(Some(0)).await.unwrap_err();
        assert_eq!(
            err,
            WorkflowError::Rejected(Some("Election has not started".to_string()))
        );
        assert_eq!(voter.state(), VoterState::RegisteredNotVoted);
        assert_eq!(voter.candidates()[0].vote_count, 0);
    }

    #[ballot_test(started)]
    async fn network_failure_keeps_state(chain: DevChain) {
        let mut voter = registered_voter(&chain, 1).await;
        let candidates = voter.candidates().to_vec();

        chain.set_offline(true).await;
        let err = voter.submit_vote(Some(0)).await.unwrap_err();
        assert!(err.is_network());
        assert!(voter.refresh().await.unwrap_err().is_network());
        assert_eq!(voter.state(), VoterState::RegisteredNotVoted);
        assert_eq!(voter.candidates(), &candidates[..]);

        // Explicit retry once the node is back.
        chain.set_offline(false).await;
        voter.submit_vote(Some(0)).await.unwrap();
        assert_eq!(voter.state(), VoterState::RegisteredVoted);
    }

    #[ballot_test(started)]
    async fn voted_implies_registered(chain: DevChain) {
        for n in 1..=4u8 {
            let mut voter = registered_voter(&chain, n).await;
            if n % 2 == 0 {
                voter.submit_vote(Some(u64::from(n % 2))).await.unwrap();
            }
            let _ = voter.submit_registration("again").await;
            let _ = voter.submit_vote(Some(1)).await;
        }
        for n in 0..=5u8 {
            let status = chain.voter_status(DevChain::account(n)).await;
            assert!(!status.has_voted || status.is_registered);
        }
    }

    #[test]
    fn states_from_status() {
        assert_eq!(
            VoterState::from(VoterStatus::default()),
            VoterState::NotRegistered
        );
        assert_eq!(
            VoterState::from(VoterStatus {
                is_registered: true,
                has_voted: false
            }),
            VoterState::RegisteredNotVoted
        );
        assert_eq!(
            VoterState::from(VoterStatus {
                is_registered: true,
                has_voted: true
            }),
            VoterState::RegisteredVoted
        );
    }
}
