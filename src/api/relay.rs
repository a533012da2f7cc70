use log::debug;
use rocket::{get, http::Status, options, post, routes, serde::json::Json, Route};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    logging::RequestId,
    model::IdentityHash,
};

pub fn routes() -> Vec<Route> {
    routes![health, hash_identity, preflight]
}

/// Body of `POST /hash`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Older clients send the identity as `aadhaarNumber`.
    #[serde(
        default,
        rename = "aadhaarNumber",
        skip_serializing_if = "Option::is_none"
    )]
    pub legacy_identity: Option<String>,
}

impl HashRequest {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            legacy_identity: None,
        }
    }

    /// The identity to hash. `identity` wins over `aadhaarNumber` unless it is empty.
    pub fn into_identity(self) -> Option<String> {
        self.identity
            .filter(|identity| !identity.is_empty())
            .or(self.legacy_identity)
            .filter(|identity| !identity.is_empty())
    }
}

/// Successful reply to `POST /hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashResponse {
    pub hash: IdentityHash,
}

#[get("/")]
pub fn health() -> &'static str {
    "Relay server is running!"
}

#[post("/hash", data = "<request>")]
pub fn hash_identity(request: Json<HashRequest>, id: &RequestId) -> Result<Json<HashResponse>> {
    let identity = request
        .into_inner()
        .into_identity()
        .ok_or_else(|| Error::BadRequest("Identity is required.".to_string()))?;

    // The identity itself must never reach the logs.
    let hash = IdentityHash::of(&identity);
    debug!("req{id} produced {hash}");

    Ok(Json(HashResponse { hash }))
}

/// CORS preflight for any path; the headers come from `CorsFairing`.
#[options("/<_..>")]
pub fn preflight() -> Status {
    Status::NoContent
}
