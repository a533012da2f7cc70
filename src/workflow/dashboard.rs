//! One connected session: the wallet account, the workflows bound to it, and
//! the notice shown after the last action.

use log::{debug, info, warn};
use serde::Serialize;

use super::{AdminWorkflow, Precondition, Result, Results, VoterWorkflow};
use crate::contract::{Connector, VotingContract};
use crate::hasher::IdentityHasher;
use crate::model::{Address, ElectionPhase};

/// Changes reported by the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletEvent {
    /// The selected account changed. `None` means the wallet disconnected.
    AccountsChanged(Option<Address>),
    ChainChanged(u64),
}

/// Everything a user can ask the dashboard to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Wallet(WalletEvent),
    Refresh,
    Register(String),
    Vote(Option<u64>),
    AddCandidate(String),
    RegisterVoter { voter: Address, identity: String },
    StartElection,
    FinalizeElection,
    DismissNotice,
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Self::Wallet(WalletEvent::AccountsChanged(_)) => "accounts changed",
            Self::Wallet(WalletEvent::ChainChanged(_)) => "chain changed",
            Self::Refresh => "refresh",
            Self::Register(_) => "register",
            Self::Vote(_) => "vote",
            Self::AddCandidate(_) => "add candidate",
            Self::RegisterVoter { .. } => "register voter",
            Self::StartElection => "start election",
            Self::FinalizeElection => "finalize election",
            Self::DismissNotice => "dismiss notice",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeKind {
    Info,
    Error,
}

/// Feedback for the last action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    fn info(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }
}

/// Who is connected. Rebuilt from scratch whenever the wallet changes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Session {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    /// Whether `account` is the contract owner. `false` if that could not be read.
    pub is_admin: bool,
}

/// Workflows for the connected account.
struct Connected<C, H> {
    contract: C,
    voter: VoterWorkflow<C, H>,
    admin: AdminWorkflow<C>,
}

/// Front door for a client: every user action goes through [`Dashboard::dispatch`],
/// one at a time.
pub struct Dashboard<K: Connector, H> {
    connector: K,
    hasher: H,
    session: Session,
    connected: Option<Connected<K::Contract, H>>,
    results: Option<Results>,
    notice: Option<Notice>,
}

impl<K, H> Dashboard<K, H>
where
    K: Connector,
    H: IdentityHasher + Clone,
{
    /// A dashboard with no wallet connected yet.
    pub fn new(connector: K, hasher: H) -> Self {
        Self {
            connector,
            hasher,
            session: Session::default(),
            connected: None,
            results: None,
            notice: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn voter(&self) -> Option<&VoterWorkflow<K::Contract, H>> {
        self.connected.as_ref().map(|c| &c.voter)
    }

    pub fn admin(&self) -> Option<&AdminWorkflow<K::Contract>> {
        self.connected.as_ref().map(|c| &c.admin)
    }

    pub fn results(&self) -> Option<&Results> {
        self.results.as_ref()
    }

    /// Lifecycle phase as of the last successful read.
    pub fn phase(&self) -> Option<ElectionPhase> {
        self.admin().and_then(|a| a.phase())
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Perform one action and record a notice for it.
    ///
    /// The error is returned as well so callers can react to it, but the
    /// dashboard stays usable either way.
    pub async fn dispatch(&mut self, action: Action) -> Result<()> {
        debug!("Dispatching {}", action.label());
        let outcome = match action {
            Action::DismissNotice => {
                self.notice = None;
                return Ok(());
            }
            Action::Wallet(WalletEvent::AccountsChanged(account)) => {
                let chain_id = self.session.chain_id;
                self.reset(account, chain_id).await
            }
            Action::Wallet(WalletEvent::ChainChanged(chain_id)) => {
                let account = self.session.account;
                self.reset(account, Some(chain_id)).await
            }
            Action::Refresh => self.reload().await.map(|()| None),
            Action::Register(identity) => self.register(&identity).await,
            Action::Vote(selected) => self.vote(selected).await,
            Action::AddCandidate(name) => self.add_candidate(&name).await,
            Action::RegisterVoter { voter, identity } => {
                self.register_voter(voter, &identity).await
            }
            Action::StartElection => self.start_election().await,
            Action::FinalizeElection => self.finalize_election().await,
        };

        match outcome {
            Ok(Some(text)) => {
                self.notice = Some(Notice::info(text));
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                warn!("Action failed: {e}");
                self.notice = Some(Notice::error(format!("Error: {e}")));
                Err(e)
            }
        }
    }

    /// Drop everything tied to the previous account and start over.
    async fn reset(
        &mut self,
        account: Option<Address>,
        chain_id: Option<u64>,
    ) -> Result<Option<String>> {
        self.session = Session {
            account,
            chain_id,
            is_admin: false,
        };
        self.connected = None;
        self.results = None;
        self.notice = None;

        let Some(account) = account else {
            info!("Wallet disconnected");
            return Ok(None);
        };
        info!("Connected as {account:#x}");

        let contract = self.connector.connect(account);
        let is_admin = match contract.owner().await {
            Ok(owner) => owner == account,
            Err(e) => {
                warn!("Could not read the contract owner: {e}");
                false
            }
        };
        self.session.is_admin = is_admin;
        self.connected = Some(Connected {
            voter: VoterWorkflow::new(contract.clone(), self.hasher.clone()),
            admin: AdminWorkflow::new(contract.clone(), is_admin),
            contract,
        });

        self.reload().await?;
        Ok(None)
    }

    /// Re-read everything shown for the connected account.
    async fn reload(&mut self) -> Result<()> {
        let connected = self.connected()?;
        connected.admin.refresh().await?;
        connected.voter.refresh().await?;
        let results = Results::load(&connected.contract).await?;
        self.results = Some(results);
        Ok(())
    }

    /// Reload after a confirmed write. The write stands even if this fails.
    async fn reload_after_write(&mut self) {
        if let Err(e) = self.reload().await {
            warn!("Could not refresh after a confirmed transaction: {e}");
        }
    }

    async fn register(&mut self, identity: &str) -> Result<Option<String>> {
        self.connected()?
            .voter
            .submit_registration(identity)
            .await?;
        self.reload_after_write().await;
        Ok(Some("Registration successful! You may now vote.".to_string()))
    }

    async fn vote(&mut self, selected: Option<u64>) -> Result<Option<String>> {
        self.connected()?.voter.submit_vote(selected).await?;
        self.reload_after_write().await;
        Ok(Some("Vote cast successfully!".to_string()))
    }

    async fn add_candidate(&mut self, name: &str) -> Result<Option<String>> {
        self.connected()?.admin.add_candidate(name).await?;
        self.reload_after_write().await;
        Ok(Some(format!("Candidate \"{name}\" added successfully!")))
    }

    async fn register_voter(&mut self, voter: Address, identity: &str) -> Result<Option<String>> {
        self.connected()?
            .admin
            .register_voter(voter, identity)
            .await?;
        Ok(Some(format!("Voter {voter:#x} registered successfully!")))
    }

    async fn start_election(&mut self) -> Result<Option<String>> {
        self.connected()?.admin.start_election().await?;
        self.reload_after_write().await;
        Ok(Some("Election started successfully!".to_string()))
    }

    async fn finalize_election(&mut self) -> Result<Option<String>> {
        self.connected()?.admin.finalize_election().await?;
        self.reload_after_write().await;
        Ok(Some("Election finalized successfully!".to_string()))
    }

    fn connected(&mut self) -> Result<&mut Connected<K::Contract, H>> {
        self.connected
            .as_mut()
            .ok_or_else(|| Precondition::NotConnected.into())
    }
}
