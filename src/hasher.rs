//! Ways of turning an identity number into the [`IdentityHash`] the contract expects.

use log::warn;
use rocket::http::Status;
use thiserror::Error;

use crate::api::relay::{HashRequest, HashResponse};
use crate::error::ErrorBody;
use crate::model::IdentityHash;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HasherError {
    #[error("Identity is required.")]
    EmptyIdentity,
    #[error("Could not reach the hashing relay: {0}")]
    Unavailable(String),
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("Unexpected response from the hashing relay: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for HasherError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Computes identity hashes.
#[rocket::async_trait]
pub trait IdentityHasher: Send + Sync {
    async fn hash(&self, identity: &str) -> Result<IdentityHash, HasherError>;
}

/// Hashes in-process with [`IdentityHash::of`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalHasher;

#[rocket::async_trait]
impl IdentityHasher for LocalHasher {
    async fn hash(&self, identity: &str) -> Result<IdentityHash, HasherError> {
        if identity.is_empty() {
            return Err(HasherError::EmptyIdentity);
        }
        Ok(IdentityHash::of(identity))
    }
}

/// Asks a hashing relay to compute the hash, so the identity never has to be
/// hashed by the caller itself.
#[derive(Debug, Clone)]
pub struct RelayHasher {
    client: reqwest::Client,
    endpoint: String,
}

impl RelayHasher {
    /// `base_url` is the relay root, e.g. `http://localhost:5000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/hash", base_url.trim_end_matches('/')),
        }
    }
}

impl RelayHasher {
    async fn request(&self, body: &HashRequest) -> Result<IdentityHash, HasherError> {
        let response = self.client.post(&self.endpoint).json(body).send().await?;

        let status = response.status().as_u16();
        if status == Status::Ok.code {
            let body: HashResponse = response
                .json()
                .await
                .map_err(|e| HasherError::Malformed(e.to_string()))?;
            Ok(body.hash)
        } else {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => "Failed to get hash from server.".to_string(),
            };
            warn!("Hashing relay refused request with {status}: {message}");
            Err(HasherError::Rejected { status, message })
        }
    }
}

#[rocket::async_trait]
impl IdentityHasher for RelayHasher {
    async fn hash(&self, identity: &str) -> Result<IdentityHash, HasherError> {
        if identity.is_empty() {
            return Err(HasherError::EmptyIdentity);
        }
        self.request(&HashRequest::new(identity)).await
    }
}
