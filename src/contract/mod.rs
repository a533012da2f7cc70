//! The capability interface of the on-chain election contract, and the
//! proxies that implement it.

use std::future::Future;

use rocket::futures::future::{self, BoxFuture, FutureExt};
use thiserror::Error;

use crate::model::{
    Address, Candidate, ElectionStatus, IdentityHash, TxHash, TxReceipt, VoterStatus, Winner,
};

pub mod memory;
pub mod rpc;

pub type Result<T> = std::result::Result<T, ContractError>;

/// Upper bound on the candidate count a contract may report before
/// [`VotingContract::candidates`] refuses to enumerate them.
pub const MAX_CANDIDATES: u64 = 1024;

/// Failures talking to the contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// The node could not be reached or did not answer sensibly at the transport level.
    #[error("Network error: {0}")]
    Unavailable(String),
    /// The contract refused the call, with its reason if one was given.
    #[error("{}", .0.as_deref().unwrap_or("Transaction failed."))]
    Reverted(Option<String>),
    /// The node rejected the request for a reason other than a revert.
    #[error("Node error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// The node answered with data that could not be decoded.
    #[error("Malformed contract response: {0}")]
    Malformed(String),
}

impl ContractError {
    pub fn reverted(reason: impl Into<String>) -> Self {
        Self::Reverted(Some(reason.into()))
    }
}

/// A submitted transaction that has not necessarily been mined yet.
///
/// The effects of the transaction must not be assumed until [`PendingTx::wait`]
/// returns successfully.
pub struct PendingTx {
    hash: TxHash,
    confirmation: BoxFuture<'static, Result<TxReceipt>>,
}

impl PendingTx {
    pub fn new<F>(hash: TxHash, confirmation: F) -> Self
    where
        F: Future<Output = Result<TxReceipt>> + Send + 'static,
    {
        Self {
            hash,
            confirmation: confirmation.boxed(),
        }
    }

    /// A transaction that was mined as part of its submission.
    pub fn confirmed(receipt: TxReceipt) -> Self {
        Self::new(receipt.hash, future::ready(Ok(receipt)))
    }

    pub fn hash(&self) -> TxHash {
        self.hash
    }

    /// Wait until the transaction is mined.
    pub async fn wait(self) -> Result<TxReceipt> {
        self.confirmation.await
    }
}

impl std::fmt::Debug for PendingTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTx").field("hash", &self.hash).finish()
    }
}

/// Read and write access to the election contract, bound to one account.
///
/// Reads that depend on the caller (`get_my_voting_status`) and every write
/// act as that account. The contract itself is the authority on every
/// business rule; implementations must surface its refusals as
/// [`ContractError::Reverted`].
#[rocket::async_trait]
pub trait VotingContract: Send + Sync {
    async fn election_started(&self) -> Result<bool>;

    async fn election_finalized(&self) -> Result<bool>;

    async fn total_candidates(&self) -> Result<u64>;

    async fn get_candidate(&self, index: u64) -> Result<Candidate>;

    async fn get_my_voting_status(&self) -> Result<VoterStatus>;

    async fn get_winner(&self) -> Result<Winner>;

    async fn owner(&self) -> Result<Address>;

    async fn add_candidate(&self, name: &str) -> Result<PendingTx>;

    async fn register_voter(&self, voter: Address, hash: IdentityHash) -> Result<PendingTx>;

    async fn register_myself(&self, hash: IdentityHash) -> Result<PendingTx>;

    async fn vote(&self, index: u64) -> Result<PendingTx>;

    async fn start_election(&self) -> Result<PendingTx>;

    async fn finalize_election(&self) -> Result<PendingTx>;

    /// Read both lifecycle flags.
    async fn election_status(&self) -> Result<ElectionStatus> {
        let started = self.election_started().await?;
        let finalized = self.election_finalized().await?;
        Ok(ElectionStatus { started, finalized })
    }

    /// Read every candidate in index order.
    async fn candidates(&self) -> Result<Vec<Candidate>> {
        let total = self.total_candidates().await?;
        if total > MAX_CANDIDATES {
            return Err(ContractError::Malformed(format!(
                "implausible candidate count {total}"
            )));
        }
        let mut candidates = Vec::with_capacity(total as usize);
        for index in 0..total {
            candidates.push(self.get_candidate(index).await?);
        }
        Ok(candidates)
    }
}

/// The wallet boundary: hands out contract proxies that act as a given account.
pub trait Connector: Send + Sync {
    type Contract: VotingContract + Clone + 'static;

    fn connect(&self, account: Address) -> Self::Contract;
}

#[cfg(test)]
mod tests {
    use super::memory::DevChain;
    use super::*;

    #[test]
    fn revert_messages() {
        assert_eq!(
            ContractError::reverted("You have already voted").to_string(),
            "You have already voted"
        );
        assert_eq!(
            ContractError::Reverted(None).to_string(),
            "Transaction failed."
        );
    }

    /// Reports a huge candidate count and counts the lookups it receives.
    struct Inflated(std::sync::atomic::AtomicU64);

    #[rocket::async_trait]
    impl VotingContract for Inflated {
        async fn election_started(&self) -> Result<bool> {
            Ok(true)
        }

        async fn election_finalized(&self) -> Result<bool> {
            Ok(false)
        }

        async fn total_candidates(&self) -> Result<u64> {
            Ok(u64::MAX)
        }

        async fn get_candidate(&self, index: u64) -> Result<Candidate> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Candidate {
                index,
                name: format!("#{index}"),
                vote_count: 0,
            })
        }

        async fn get_my_voting_status(&self) -> Result<VoterStatus> {
            Ok(VoterStatus::default())
        }

        async fn get_winner(&self) -> Result<Winner> {
            Err(ContractError::Reverted(None))
        }

        async fn owner(&self) -> Result<Address> {
            Ok(Address::zero())
        }

        async fn add_candidate(&self, _name: &str) -> Result<PendingTx> {
            Err(ContractError::Reverted(None))
        }

        async fn register_voter(&self, _voter: Address, _hash: IdentityHash) -> Result<PendingTx> {
            Err(ContractError::Reverted(None))
        }

        async fn register_myself(&self, _hash: IdentityHash) -> Result<PendingTx> {
            Err(ContractError::Reverted(None))
        }

        async fn vote(&self, _index: u64) -> Result<PendingTx> {
            Err(ContractError::Reverted(None))
        }

        async fn start_election(&self) -> Result<PendingTx> {
            Err(ContractError::Reverted(None))
        }

        async fn finalize_election(&self) -> Result<PendingTx> {
            Err(ContractError::Reverted(None))
        }
    }

    #[rocket::async_test]
    async fn implausible_candidate_count() {
        let contract = Inflated(Default::default());
        assert!(matches!(
            contract.candidates().await,
            Err(ContractError::Malformed(_))
        ));
        assert_eq!(contract.0.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[ballot_test(started)]
    async fn candidates_in_order(chain: DevChain) {
        let contract = chain.connect(DevChain::account(3));
        let candidates = contract.candidates().await.unwrap();
        let names: Vec<_> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Alice", "Bob"]);
        assert_eq!(candidates[1].index, 1);
        assert_eq!(
            contract.election_status().await.unwrap(),
            ElectionStatus {
                started: true,
                finalized: false
            }
        );
    }
}
