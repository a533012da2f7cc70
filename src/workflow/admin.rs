use log::{info, warn};

use super::{Precondition, Result};
use crate::contract::VotingContract;
use crate::hasher::{IdentityHasher, LocalHasher};
use crate::model::{Address, Candidate, ElectionPhase, ElectionStatus, TxReceipt};

/// Election management for the contract owner.
///
/// Non-owners get a workflow that refuses every write without touching the
/// contract, but can still read.
pub struct AdminWorkflow<C> {
    contract: C,
    is_admin: bool,
    status: Option<ElectionStatus>,
    candidates: Vec<Candidate>,
}

impl<C: VotingContract> AdminWorkflow<C> {
    pub fn new(contract: C, is_admin: bool) -> Self {
        Self {
            contract,
            is_admin,
            status: None,
            candidates: Vec::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Lifecycle flags as of the last successful read.
    pub fn status(&self) -> Option<ElectionStatus> {
        self.status
    }

    pub fn phase(&self) -> Option<ElectionPhase> {
        self.status.map(|s| s.phase())
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Re-read the lifecycle flags and candidate list. Nothing is replaced unless
    /// every read succeeds.
    pub async fn refresh(&mut self) -> Result<()> {
        let status = self.contract.election_status().await?;
        let candidates = self.contract.candidates().await?;
        self.status = Some(status);
        self.candidates = candidates;
        Ok(())
    }

    pub async fn add_candidate(&mut self, name: &str) -> Result<TxReceipt> {
        self.require_admin()?;
        if name.is_empty() {
            return Err(Precondition::EmptyCandidateName.into());
        }
        self.require_phase(ElectionPhase::NotStarted)?;

        let receipt = self.contract.add_candidate(name).await?.wait().await?;
        info!("Candidate '{name}' added in block {}", receipt.block_number);
        self.reread("adding a candidate").await;
        Ok(receipt)
    }

    /// Register `voter` under the hash of `identity`, computed with the same
    /// routine the relay uses.
    pub async fn register_voter(&mut self, voter: Address, identity: &str) -> Result<TxReceipt> {
        self.require_admin()?;
        if identity.is_empty() {
            return Err(Precondition::EmptyIdentity.into());
        }

        let hash = LocalHasher.hash(identity).await?;
        let receipt = self
            .contract
            .register_voter(voter, hash)
            .await?
            .wait()
            .await?;
        info!("Voter {voter:#x} registered in block {}", receipt.block_number);
        Ok(receipt)
    }

    pub async fn start_election(&mut self) -> Result<TxReceipt> {
        self.require_admin()?;
        self.require_phase(ElectionPhase::NotStarted)?;

        let receipt = self.contract.start_election().await?.wait().await?;
        info!("Election started in block {}", receipt.block_number);
        self.reread("starting the election").await;
        Ok(receipt)
    }

    pub async fn finalize_election(&mut self) -> Result<TxReceipt> {
        self.require_admin()?;
        self.require_phase(ElectionPhase::InProgress)?;

        let receipt = self.contract.finalize_election().await?.wait().await?;
        info!("Election finalized in block {}", receipt.block_number);
        self.reread("finalizing the election").await;
        Ok(receipt)
    }

    fn require_admin(&self) -> Result<()> {
        if self.is_admin {
            Ok(())
        } else {
            Err(Precondition::NotAdmin.into())
        }
    }

    /// Check the cached phase. The contract re-checks it, so a stale cache only
    /// means the refusal comes from the chain instead.
    fn require_phase(&self, expected: ElectionPhase) -> Result<()> {
        let phase = self.phase().ok_or(Precondition::ElectionUnknown)?;
        match (expected, phase) {
            (expected, phase) if expected == phase => Ok(()),
            (ElectionPhase::NotStarted, ElectionPhase::InProgress) => {
                Err(Precondition::ElectionStarted.into())
            }
            (_, ElectionPhase::NotStarted) => Err(Precondition::ElectionNotStarted.into()),
            (_, ElectionPhase::Finalized) => Err(Precondition::ElectionFinalized.into()),
            (_, ElectionPhase::InProgress) => Err(Precondition::ElectionStarted.into()),
        }
    }

    async fn reread(&mut self, after: &str) {
        if let Err(e) = self.refresh().await {
            warn!("Could not re-read the election after {after}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::contract::{memory::DevChain, Connector};
    use crate::model::IdentityHash;
    use crate::workflow::{VoterState, VoterWorkflow, WorkflowError};

    use super::*;

    async fn owner(chain: &DevChain) -> AdminWorkflow<<DevChain as Connector>::Contract> {
        let mut admin = AdminWorkflow::new(chain.connect(DevChain::account(0)), true);
        admin.refresh().await.unwrap();
        admin
    }

    #[ballot_test]
    async fn full_lifecycle(chain: DevChain) {
        let mut admin = owner(&chain).await;
        assert_eq!(admin.phase(), Some(ElectionPhase::NotStarted));

        admin.add_candidate("Alice").await.unwrap();
        admin.add_candidate("Bob").await.unwrap();
        assert_eq!(admin.candidates().len(), 2);

        admin.start_election().await.unwrap();
        assert_eq!(admin.phase(), Some(ElectionPhase::InProgress));

        admin.finalize_election().await.unwrap();
        assert_eq!(
            admin.status(),
            Some(ElectionStatus {
                started: true,
                finalized: true
            })
        );
    }

    #[ballot_test(started)]
    async fn no_candidates_after_start(chain: DevChain) {
        let mut admin = owner(&chain).await;
        let calls = chain.call_count();

        assert_eq!(
            admin.add_candidate("Carol").await,
            Err(Precondition::ElectionStarted.into())
        );
        assert_eq!(chain.call_count(), calls);

        // Another session may have started it behind a stale cache.
        let mut stale = AdminWorkflow::new(chain.connect(DevChain::account(0)), true);
        stale.status = Some(ElectionStatus::default());
        assert_eq!(
            stale.add_candidate("Carol").await,
            Err(WorkflowError::Rejected(Some(
                "Election has already started".to_string()
            )))
        );

        admin.refresh().await.unwrap();
        let names: Vec<_> = admin.candidates().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Alice", "Bob"]);
    }

    #[ballot_test]
    async fn phase_order(chain: DevChain) {
        let mut admin = owner(&chain).await;
        assert_eq!(
            admin.finalize_election().await,
            Err(Precondition::ElectionNotStarted.into())
        );

        // The contract wants at least one candidate.
        let err = admin.start_election().await.unwrap_err();
        assert_eq!(err.to_string(), "No candidates have been added");
        assert_eq!(admin.phase(), Some(ElectionPhase::NotStarted));

        admin.add_candidate("Alice").await.unwrap();
        admin.start_election().await.unwrap();
        assert_eq!(
            admin.start_election().await,
            Err(Precondition::ElectionStarted.into())
        );
        admin.finalize_election().await.unwrap();
        assert_eq!(
            admin.finalize_election().await,
            Err(Precondition::ElectionFinalized.into())
        );
        assert_eq!(
            admin.add_candidate("Bob").await,
            Err(Precondition::ElectionFinalized.into())
        );
    }

    #[ballot_test]
    async fn unread_status_is_refused(chain: DevChain) {
        let mut admin = AdminWorkflow::new(chain.connect(DevChain::account(0)), true);
        assert_eq!(
            admin.start_election().await,
            Err(Precondition::ElectionUnknown.into())
        );
        assert_eq!(
            admin.add_candidate("").await,
            Err(Precondition::EmptyCandidateName.into())
        );
    }

    #[ballot_test]
    async fn outsiders_cannot_manage(chain: DevChain) {
        let mut admin = AdminWorkflow::new(chain.connect(DevChain::account(7)), false);
        admin.refresh().await.unwrap();
        let calls = chain.call_count();

        let refused: WorkflowError = Precondition::NotAdmin.into();
        assert_eq!(admin.add_candidate("Mallory").await, Err(refused.clone()));
        assert_eq!(
            admin.register_voter(DevChain::account(8), "A1").await,
            Err(refused.clone())
        );
        assert_eq!(admin.start_election().await, Err(refused.clone()));
        assert_eq!(admin.finalize_election().await, Err(refused));
        assert_eq!(chain.call_count(), calls);

        // A wrongly cached flag is still caught by the contract.
        let mut pretender = AdminWorkflow::new(chain.connect(DevChain::account(7)), true);
        pretender.refresh().await.unwrap();
        let err = pretender.add_candidate("Mallory").await.unwrap_err();
        assert_eq!(err.to_string(), "Only the owner can perform this action");
    }

    #[ballot_test(started)]
    async fn registered_identity_matches_self_registration(chain: DevChain) {
        let mut admin = owner(&chain).await;
        let voter = DevChain::account(5);
        admin.register_voter(voter, "A1").await.unwrap();
        assert!(chain.voter_status(voter).await.is_registered);

        let err = admin.register_voter(voter, "B2").await.unwrap_err();
        assert_eq!(err.to_string(), "Voter is already registered");

        // Self-registering with the same identity collides, so both paths hash alike.
        let mut other = VoterWorkflow::new(chain.connect(DevChain::account(6)), LocalHasher);
        other.refresh().await.unwrap();
        let err = other.submit_registration("A1").await.unwrap_err();
        assert_eq!(err.to_string(), "Identity hash has already been used");
        assert_eq!(other.state(), VoterState::NotRegistered);

        // And the pre-registered voter can go straight to voting.
        let mut registered = VoterWorkflow::new(chain.connect(voter), LocalHasher);
        registered.refresh().await.unwrap();
        assert_eq!(registered.state(), VoterState::RegisteredNotVoted);
        assert_ne!(IdentityHash::of("A1"), IdentityHash::of("B2"));
    }
}
