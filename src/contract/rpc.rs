//! A contract proxy that talks to an Ethereum JSON-RPC node.
//!
//! Transactions are sent with `eth_sendTransaction`, so the connected account
//! must be managed (unlocked) by the node, as on a local development node.

use std::sync::Arc;
use std::time::Duration;

use ethers_contract::BaseContract;
use ethers_core::abi::{self, parse_abi, Detokenize, ParamType, Tokenize};
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Bytes, TransactionRequest, H256, U256, U64,
};
use ethers_core::utils::id;
use ethers_providers::{Http, Middleware, PendingTransaction, Provider, ProviderError, RpcError};
use log::{debug, info, warn};
use rocket::serde::json::Value;

use super::{Connector, ContractError, PendingTx, Result, VotingContract};
use crate::model::{Address, Candidate, IdentityHash, TxHash, TxReceipt, VoterStatus, Winner};

/// The parts of the election contract's interface this proxy uses.
const ELECTION_ABI: &[&str] = &[
    "function electionStarted() external view returns (bool)",
    "function electionFinalized() external view returns (bool)",
    "function totalCandidates() external view returns (uint256)",
    "function getCandidate(uint256 index) external view returns (string, uint256)",
    "function getMyVotingStatus() external view returns (bool, bool)",
    "function getWinner() external view returns (string, uint256)",
    "function owner() external view returns (address)",
    "function addCandidate(string name) external",
    "function registerVoter(address voter, bytes32 identityHash) external",
    "function registerMyself(bytes32 identityHash) external",
    "function vote(uint256 index) external",
    "function startElection() external",
    "function finalizeElection() external",
];

/// Prefix geth puts in front of revert reasons in error messages.
const REVERT_PREFIX: &str = "execution reverted: ";

fn malformed(err: impl std::fmt::Display) -> ContractError {
    ContractError::Malformed(err.to_string())
}

fn to_u64(value: U256) -> Result<u64> {
    u64::try_from(value).map_err(|_| malformed(format!("{value} does not fit into 64 bits")))
}

/// Decode a standard `Error(string)` revert payload.
fn decode_revert(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(id("Error(string)").as_slice())?;
    abi::decode(&[ParamType::String], payload)
        .ok()?
        .pop()?
        .into_string()
}

/// Find the revert payload, which nodes put either directly in `data` or nested deeper.
fn revert_data(data: &Value) -> Option<Bytes> {
    match data {
        Value::String(hex) => hex.parse().ok(),
        Value::Object(inner) => inner.get("data").and_then(revert_data),
        _ => None,
    }
}

/// Classify a JSON-RPC error object.
fn rpc_failure(code: i64, message: &str, data: Option<&Value>) -> ContractError {
    if let Some(reason) = data
        .and_then(revert_data)
        .and_then(|data| decode_revert(&data))
    {
        return ContractError::Reverted(Some(reason));
    }
    if let Some(reason) = message.strip_prefix(REVERT_PREFIX) {
        return ContractError::reverted(reason);
    }
    if message.contains("revert") {
        return ContractError::Reverted(None);
    }
    ContractError::Rpc {
        code,
        message: message.to_string(),
    }
}

impl From<ProviderError> for ContractError {
    fn from(err: ProviderError) -> Self {
        if let Some(response) = err.as_error_response() {
            rpc_failure(response.code, &response.message, response.data.as_ref())
        } else if err.as_serde_error().is_some() {
            malformed(err)
        } else {
            ContractError::Unavailable(err.to_string())
        }
    }
}

/// Where the node and the deployed contract live.
#[derive(Debug, Clone)]
pub struct RpcConnector {
    provider: Provider<Http>,
    abi: Arc<BaseContract>,
    contract: Address,
}

impl RpcConnector {
    /// `poll_interval` is how often a pending transaction is checked for a receipt.
    pub fn new(endpoint: &str, contract: Address, poll_interval: Duration) -> Result<Self> {
        let provider = Provider::<Http>::try_from(endpoint)
            .map_err(|e| ContractError::Unavailable(format!("invalid node URL {endpoint}: {e}")))?
            .interval(poll_interval);
        let abi = parse_abi(ELECTION_ABI).map_err(malformed)?;
        Ok(Self {
            provider,
            abi: Arc::new(BaseContract::from(abi)),
            contract,
        })
    }
}

impl Connector for RpcConnector {
    type Contract = RpcContract;

    fn connect(&self, account: Address) -> RpcContract {
        RpcContract {
            connector: self.clone(),
            account,
        }
    }
}

/// Wait for a submitted transaction to be mined. There is no timeout.
async fn confirm(provider: &Provider<Http>, hash: TxHash) -> Result<TxReceipt> {
    let receipt = PendingTransaction::new(hash, provider)
        .await?
        .ok_or_else(|| ContractError::Unavailable(format!("transaction {hash:#x} was dropped")))?;
    let block_number = receipt
        .block_number
        .ok_or_else(|| malformed(format!("receipt for {hash:#x} has no block number")))?
        .as_u64();
    if receipt.status == Some(U64::zero()) {
        warn!("Transaction {hash:#x} reverted in block {block_number}");
        return Err(ContractError::Reverted(None));
    }
    info!("Transaction {hash:#x} mined in block {block_number}");
    Ok(TxReceipt { hash, block_number })
}

/// A proxy to the deployed contract acting as one node-managed account.
#[derive(Debug, Clone)]
pub struct RpcContract {
    connector: RpcConnector,
    account: Address,
}

impl RpcContract {
    /// The transaction shared by calls, estimates and sends.
    fn transaction<T: Tokenize>(&self, method: &str, args: T) -> Result<TypedTransaction> {
        let data = self.connector.abi.encode(method, args).map_err(malformed)?;
        Ok(TransactionRequest::new()
            .from(self.account)
            .to(self.connector.contract)
            .data(data)
            .into())
    }

    async fn call<T: Tokenize, D: Detokenize>(&self, method: &str, args: T) -> Result<D> {
        let tx = self.transaction(method, args)?;
        debug!("eth_call {method}");
        let output = self.connector.provider.call(&tx, None).await?;
        self.connector
            .abi
            .decode_output(method, output)
            .map_err(malformed)
    }

    async fn send<T: Tokenize>(&self, method: &str, args: T) -> Result<PendingTx> {
        let mut tx = self.transaction(method, args)?;

        // Estimating first surfaces the revert reason before anything is submitted.
        let gas = self.connector.provider.estimate_gas(&tx, None).await?;
        tx.set_gas(gas);

        let pending = self.connector.provider.send_transaction(tx, None).await?;
        let hash = *pending;
        info!("Submitted {method} as {hash:#x}");

        let provider = self.connector.provider.clone();
        Ok(PendingTx::new(hash, async move {
            confirm(&provider, hash).await
        }))
    }
}

#[rocket::async_trait]
impl VotingContract for RpcContract {
    async fn election_started(&self) -> Result<bool> {
        self.call("electionStarted", ()).await
    }

    async fn election_finalized(&self) -> Result<bool> {
        self.call("electionFinalized", ()).await
    }

    async fn total_candidates(&self) -> Result<u64> {
        to_u64(self.call("totalCandidates", ()).await?)
    }

    async fn get_candidate(&self, index: u64) -> Result<Candidate> {
        let (name, votes): (String, U256) = self.call("getCandidate", U256::from(index)).await?;
        Ok(Candidate {
            index,
            name,
            vote_count: to_u64(votes)?,
        })
    }

    async fn get_my_voting_status(&self) -> Result<VoterStatus> {
        let (is_registered, has_voted): (bool, bool) =
            self.call("getMyVotingStatus", ()).await?;
        Ok(VoterStatus {
            is_registered,
            has_voted,
        })
    }

    async fn get_winner(&self) -> Result<Winner> {
        let (name, votes): (String, U256) = self.call("getWinner", ()).await?;
        Ok(Winner {
            name,
            vote_total: to_u64(votes)?,
        })
    }

    async fn owner(&self) -> Result<Address> {
        self.call("owner", ()).await
    }

    async fn add_candidate(&self, name: &str) -> Result<PendingTx> {
        self.send("addCandidate", name.to_string()).await
    }

    async fn register_voter(&self, voter: Address, hash: IdentityHash) -> Result<PendingTx> {
        self.send("registerVoter", (voter, H256::from(*hash.as_bytes())))
            .await
    }

    async fn register_myself(&self, hash: IdentityHash) -> Result<PendingTx> {
        self.send("registerMyself", H256::from(*hash.as_bytes()))
            .await
    }

    async fn vote(&self, index: u64) -> Result<PendingTx> {
        self.send("vote", U256::from(index)).await
    }

    async fn start_election(&self) -> Result<PendingTx> {
        self.send("startElection", ()).await
    }

    async fn finalize_election(&self) -> Result<PendingTx> {
        self.send("finalizeElection", ()).await
    }
}
