// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `127.0.0.1` |
//! | `PORT` | Server bind port | `8080` |
//! | `WEBAUTHN_RP_ID` | Relying party ID (the domain passkeys bind to) | `localhost` |
//! | `WEBAUTHN_ORIGIN` | Expected origin for ceremony verification | `http://localhost:8080` |
//! | `RP_NAME` | Human-readable service name shown during passkey creation | `QuickCall` |
//! | `SESSION_SECRET` | HS256 secret for session/ceremony cookies | Required per-request |
//! | `LIVEKIT_API_KEY` | LiveKit API key (token `iss`) | Required per-request |
//! | `LIVEKIT_API_SECRET` | LiveKit signing secret | Required per-request |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! The secrets are checked where they are used, not at boot: a missing
//! secret turns the affected endpoints into 500s while the rest of the
//! service keeps working. An unparseable `WEBAUTHN_ORIGIN` fails startup
//! because the verifier is built once.

use std::env;

use thiserror::Error;
use url::Url;
use webauthn_rs::prelude::WebauthnError;
use webauthn_rs::{Webauthn, WebauthnBuilder};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid WEBAUTHN_ORIGIN: {0}")]
    InvalidOrigin(#[from] url::ParseError),
    #[error("invalid relying party configuration: {0}")]
    RelyingParty(#[from] WebauthnError),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// WebAuthn relying party ID, e.g. `localhost` or `example.com`.
    pub rp_id: String,
    /// Full origin the browser performs ceremonies from.
    pub rp_origin: Url,
    pub rp_name: String,
    pub session_secret: Option<String>,
    pub livekit_api_key: Option<String>,
    pub livekit_api_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let rp_origin = env::var("WEBAUTHN_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            rp_id: env::var("WEBAUTHN_RP_ID").unwrap_or_else(|_| "localhost".to_string()),
            rp_origin: Url::parse(&rp_origin)?,
            rp_name: env::var("RP_NAME").unwrap_or_else(|_| "QuickCall".to_string()),
            session_secret: env::var("SESSION_SECRET").ok(),
            livekit_api_key: non_empty(env::var("LIVEKIT_API_KEY").ok()),
            livekit_api_secret: non_empty(env::var("LIVEKIT_API_SECRET").ok()),
        })
    }

    /// Build the WebAuthn verifier bound to this relying party.
    pub fn build_webauthn(&self) -> Result<Webauthn, ConfigError> {
        let webauthn = WebauthnBuilder::new(&self.rp_id, &self.rp_origin)?
            .rp_name(&self.rp_name)
            .build()?;
        Ok(webauthn)
    }

    /// Whether session cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.rp_origin.scheme() == "https"
    }
}

/// Treat whitespace-only env values as unset, matching how operators tend to
/// leave placeholders in `.env` files.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
