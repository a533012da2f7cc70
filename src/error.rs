use log::{error, warn};
use rocket::{
    catch, catchers,
    http::Status,
    response::{status::Custom, Responder},
    serde::json::Json,
    Catcher, Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

const INTERNAL_MESSAGE: &str = "An internal server error occurred.";

/// The JSON payload of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Errors raised by the relay's own handlers.
#[derive(Debug, Error)]
pub enum Error {
    /// The message is returned to the client verbatim.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Self::BadRequest(_) => Status::BadRequest,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let body = match self {
            Self::BadRequest(msg) => {
                warn!("{status} for {}: {msg}", req.uri());
                ErrorBody::new(msg)
            }
        };
        Custom(status, Json(body)).respond_to(req)
    }
}

/// Turns every error Rocket raises itself (unknown routes, unparseable
/// bodies, panics) into an [`ErrorBody`].
#[catch(default)]
fn json_catcher(status: Status, req: &Request) -> Custom<Json<ErrorBody>> {
    let message = if status.code >= 500 {
        // Details stay in the log.
        error!("{status} while handling {}", req.uri());
        INTERNAL_MESSAGE.to_string()
    } else {
        status.reason_lossy().to_string()
    };
    Custom(status, Json(ErrorBody::new(message)))
}

pub fn catchers() -> Vec<Catcher> {
    catchers![json_catcher]
}
