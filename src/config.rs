use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::Header,
    Build, Request, Response, Rocket,
};
use serde::Deserialize;

/// Relay configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_allowed_origin")]
    allowed_origin: String,
}

fn default_allowed_origin() -> String {
    "*".to_string()
}

impl Config {
    /// The origin browsers may call the relay from.
    /// Set with `allowed_origin` in `Rocket.toml` or the `ROCKET_ALLOWED_ORIGIN`
    /// environment variable; defaults to any origin.
    pub fn allowed_origin(&self) -> &str {
        &self.allowed_origin
    }
}

/// A fairing that loads the relay config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load relay config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Accepting requests from origin {}", config.allowed_origin());

        Ok(rocket.manage(config))
    }
}

/// A fairing that lets browser dashboards on another origin call the relay.
pub struct CorsFairing;

#[rocket::async_trait]
impl Fairing for CorsFairing {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let origin = req
            .rocket()
            .state::<Config>()
            .map(|config| config.allowed_origin().to_string())
            .unwrap_or_else(default_allowed_origin);
        res.set_header(Header::new("Access-Control-Allow-Origin", origin));
        res.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, OPTIONS",
        ));
        res.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type"));
    }
}
