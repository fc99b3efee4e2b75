// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use tokio::sync::RwLock;
use webauthn_rs::Webauthn;

use crate::config::{Config, ConfigError};
use crate::livekit::LiveKitKeys;
use crate::session::Sessions;
use crate::store::InMemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<InMemoryStore>>,
    /// WebAuthn verifier bound to the configured relying party.
    pub webauthn: Arc<Webauthn>,
    pub sessions: Sessions,
    pub livekit: LiveKitKeys,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            store: Arc::new(RwLock::new(InMemoryStore::new())),
            webauthn: Arc::new(config.build_webauthn()?),
            sessions: Sessions::new(config.session_secret.clone(), config.secure_cookies()),
            livekit: LiveKitKeys::new(
                config.livekit_api_key.clone(),
                config.livekit_api_secret.clone(),
            ),
        })
    }
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 8080,
        rp_id: "localhost".into(),
        rp_origin: url::Url::parse("http://localhost:8080").unwrap(),
        rp_name: "QuickCall".into(),
        session_secret: Some("test-secret".into()),
        livekit_api_key: Some("devkey".into()),
        livekit_api_secret: Some("devsecret".into()),
    }
}

#[cfg(test)]
impl Default for AppState {
    fn default() -> Self {
        Self::new(&test_config()).expect("test state builds")
    }
}
