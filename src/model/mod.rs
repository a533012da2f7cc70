pub mod chain;
pub mod election;
pub mod identity;

pub use chain::{Address, ParseHexError, TxHash, TxReceipt};
pub use election::{Candidate, ElectionPhase, ElectionStatus, VoterStatus, Winner};
pub use identity::IdentityHash;
