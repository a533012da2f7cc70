//! An in-memory stand-in for the deployed election contract.
//!
//! It enforces the same rules as the contract, so workflows can be exercised
//! without a node. Transactions are mined as soon as they are submitted.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ethers_core::utils::keccak256;
use rocket::tokio::sync::Mutex;

use super::{Connector, ContractError, PendingTx, Result, VotingContract};
use crate::model::{Address, Candidate, IdentityHash, TxHash, TxReceipt, VoterStatus, Winner};

const ONLY_OWNER: &str = "Only the owner can perform this action";
const ALREADY_STARTED: &str = "Election has already started";
const NOT_STARTED: &str = "Election has not started";
const ALREADY_FINALIZED: &str = "Election has already been finalized";
const NOT_FINALIZED: &str = "Election has not been finalized";
const ALREADY_REGISTERED: &str = "Voter is already registered";
const HASH_USED: &str = "Identity hash has already been used";

#[derive(Debug)]
struct ChainState {
    owner: Address,
    started: bool,
    finalized: bool,
    candidates: Vec<(String, u64)>,
    voters: HashMap<Address, VoterStatus>,
    used_hashes: HashSet<IdentityHash>,
    offline: bool,
    block_number: u64,
}

impl ChainState {
    fn only_owner(&self, caller: Address) -> Result<()> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(ContractError::reverted(ONLY_OWNER))
        }
    }

    fn register(&mut self, voter: Address, hash: IdentityHash) -> Result<()> {
        if self.finalized {
            return Err(ContractError::reverted(ALREADY_FINALIZED));
        }
        if self.voters.get(&voter).map_or(false, |s| s.is_registered) {
            return Err(ContractError::reverted(ALREADY_REGISTERED));
        }
        if self.used_hashes.contains(&hash) {
            return Err(ContractError::reverted(HASH_USED));
        }
        self.used_hashes.insert(hash);
        self.voters.insert(
            voter,
            VoterStatus {
                is_registered: true,
                has_voted: false,
            },
        );
        Ok(())
    }

    /// Mine a block containing one transaction from `sender`.
    fn mine(&mut self, sender: Address) -> PendingTx {
        self.block_number += 1;
        let mut preimage = sender.as_bytes().to_vec();
        preimage.extend_from_slice(&self.block_number.to_be_bytes());
        PendingTx::confirmed(TxReceipt {
            hash: TxHash::from(keccak256(&preimage)),
            block_number: self.block_number,
        })
    }
}

/// A shared in-memory election. Clones refer to the same chain.
#[derive(Debug, Clone)]
pub struct DevChain {
    state: Arc<Mutex<ChainState>>,
    calls: Arc<AtomicUsize>,
}

impl DevChain {
    /// A fresh election owned by `owner`.
    pub fn new(owner: Address) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState {
                owner,
                started: false,
                finalized: false,
                candidates: Vec::new(),
                voters: HashMap::new(),
                used_hashes: HashSet::new(),
                offline: false,
                block_number: 0,
            })),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A deterministic development account.
    pub fn account(n: u8) -> Address {
        let mut bytes = [0; 20];
        bytes[0] = 0xde;
        bytes[19] = n;
        Address::from(bytes)
    }

    /// While offline, every contract call fails as if the node were unreachable.
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    /// Number of contract calls made through any connected proxy.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Inspect any account's status directly.
    pub async fn voter_status(&self, voter: Address) -> VoterStatus {
        self.state
            .lock()
            .await
            .voters
            .get(&voter)
            .copied()
            .unwrap_or_default()
    }
}

impl Default for DevChain {
    fn default() -> Self {
        Self::new(Self::account(0))
    }
}

impl Connector for DevChain {
    type Contract = DevContract;

    fn connect(&self, account: Address) -> DevContract {
        DevContract {
            chain: self.clone(),
            account,
        }
    }
}

/// A proxy to a [`DevChain`] acting as one account.
#[derive(Debug, Clone)]
pub struct DevContract {
    chain: DevChain,
    account: Address,
}

impl DevContract {
    /// Run `f` against the chain state, counting the call and honouring offline mode.
    async fn with_state<T>(&self, f: impl FnOnce(&mut ChainState) -> Result<T>) -> Result<T> {
        self.chain.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.chain.state.lock().await;
        if state.offline {
            return Err(ContractError::Unavailable(
                "development chain is offline".to_string(),
            ));
        }
        f(&mut state)
    }
}

#[rocket::async_trait]
impl VotingContract for DevContract {
    async fn election_started(&self) -> Result<bool> {
        self.with_state(|state| Ok(state.started)).await
    }

    async fn election_finalized(&self) -> Result<bool> {
        self.with_state(|state| Ok(state.finalized)).await
    }

    async fn total_candidates(&self) -> Result<u64> {
        self.with_state(|state| Ok(state.candidates.len() as u64))
            .await
    }

    async fn get_candidate(&self, index: u64) -> Result<Candidate> {
        self.with_state(|state| {
            let (name, vote_count) = usize::try_from(index)
                .ok()
                .and_then(|i| state.candidates.get(i))
                .ok_or_else(|| ContractError::reverted("Invalid candidate"))?;
            Ok(Candidate {
                index,
                name: name.clone(),
                vote_count: *vote_count,
            })
        })
        .await
    }

    async fn get_my_voting_status(&self) -> Result<VoterStatus> {
        let account = self.account;
        self.with_state(|state| Ok(state.voters.get(&account).copied().unwrap_or_default()))
            .await
    }

    async fn get_winner(&self) -> Result<Winner> {
        self.with_state(|state| {
            if !state.finalized {
                return Err(ContractError::reverted(NOT_FINALIZED));
            }
            let mut winner: Option<&(String, u64)> = None;
            for candidate in &state.candidates {
                // Strictly greater, so the earliest candidate wins a tie.
                if winner.map_or(true, |w| candidate.1 > w.1) {
                    winner = Some(candidate);
                }
            }
            winner
                .map(|(name, votes)| Winner {
                    name: name.clone(),
                    vote_total: *votes,
                })
                .ok_or_else(|| ContractError::reverted("No candidates"))
        })
        .await
    }

    async fn owner(&self) -> Result<Address> {
        self.with_state(|state| Ok(state.owner)).await
    }

    async fn add_candidate(&self, name: &str) -> Result<PendingTx> {
        let caller = self.account;
        self.with_state(|state| {
            state.only_owner(caller)?;
            if state.started {
                return Err(ContractError::reverted(ALREADY_STARTED));
            }
            if name.is_empty() {
                return Err(ContractError::reverted("Candidate name cannot be empty"));
            }
            state.candidates.push((name.to_string(), 0));
            Ok(state.mine(caller))
        })
        .await
    }

    async fn register_voter(&self, voter: Address, hash: IdentityHash) -> Result<PendingTx> {
        let caller = self.account;
        self.with_state(|state| {
            state.only_owner(caller)?;
            state.register(voter, hash)?;
            Ok(state.mine(caller))
        })
        .await
    }

    async fn register_myself(&self, hash: IdentityHash) -> Result<PendingTx> {
        let caller = self.account;
        self.with_state(|state| {
            state.register(caller, hash)?;
            Ok(state.mine(caller))
        })
        .await
    }

    async fn vote(&self, index: u64) -> Result<PendingTx> {
        let caller = self.account;
        self.with_state(|state| {
            if !state.started {
                return Err(ContractError::reverted(NOT_STARTED));
            }
            if state.finalized {
                return Err(ContractError::reverted(ALREADY_FINALIZED));
            }
            let status = state.voters.get(&caller).copied().unwrap_or_default();
            if !status.is_registered {
                return Err(ContractError::reverted("You are not registered to vote"));
            }
            if status.has_voted {
                return Err(ContractError::reverted("You have already voted"));
            }
            let candidate = usize::try_from(index)
                .ok()
                .and_then(|i| state.candidates.get_mut(i))
                .ok_or_else(|| ContractError::reverted("Invalid candidate"))?;
            candidate.1 += 1;
            state.voters.insert(
                caller,
                VoterStatus {
                    is_registered: true,
                    has_voted: true,
                },
            );
            Ok(state.mine(caller))
        })
        .await
    }

    async fn start_election(&self) -> Result<PendingTx> {
        let caller = self.account;
        self.with_state(|state| {
            state.only_owner(caller)?;
            if state.started {
                return Err(ContractError::reverted(ALREADY_STARTED));
            }
            if state.candidates.is_empty() {
                return Err(ContractError::reverted("No candidates have been added"));
            }
            state.started = true;
            Ok(state.mine(caller))
        })
        .await
    }

    async fn finalize_election(&self) -> Result<PendingTx> {
        let caller = self.account;
        self.with_state(|state| {
            state.only_owner(caller)?;
            if !state.started {
                return Err(ContractError::reverted(NOT_STARTED));
            }
            if state.finalized {
                return Err(ContractError::reverted(ALREADY_FINALIZED));
            }
            state.finalized = true;
            Ok(state.mine(caller))
        })
        .await
    }
}
