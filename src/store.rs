// SPDX-License-Identifier: AGPL-3.0-or-later

//! # In-Memory Repository
//!
//! Durable store of users and their passkey credentials. Kept behind
//! `Arc<RwLock<_>>` in [`crate::state::AppState`]; counter advancement is a
//! conditional write performed under the write lock, so two concurrent
//! logins replaying the same assertion cannot both commit.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;
use webauthn_rs_proto::AuthenticatorTransport;

use crate::error::ApiError;
use crate::models::{CredentialRecord, User};

#[derive(Default)]
pub struct InMemoryStore {
    users: HashMap<String, User>,
    /// Keyed by `credential_id` (base64url), which is globally unique.
    credentials: HashMap<String, CredentialRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_user(&mut self, name: impl Into<String>) -> User {
        let id = Uuid::new_v4().to_string();
        let user = User {
            id: id.clone(),
            name: Some(name.into()),
            created_at: Utc::now(),
        };
        self.users.insert(id, user.clone());
        user
    }

    pub fn user(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).cloned()
    }

    #[cfg(test)]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Persist a freshly verified credential. The owning user must already
    /// exist; credential identifiers are unique across all users.
    pub fn insert_credential(
        &mut self,
        user_id: &str,
        credential_id: impl Into<String>,
        public_key: Vec<u8>,
        counter: u32,
        transports: Vec<AuthenticatorTransport>,
    ) -> Result<CredentialRecord, ApiError> {
        if !self.users.contains_key(user_id) {
            return Err(ApiError::not_found("User not found"));
        }
        let credential_id = credential_id.into();
        if self.credentials.contains_key(&credential_id) {
            return Err(ApiError::conflict("Credential already registered"));
        }

        let record = CredentialRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            credential_id: credential_id.clone(),
            public_key,
            counter,
            transports,
            created_at: Utc::now(),
        };
        self.credentials.insert(credential_id, record.clone());
        Ok(record)
    }

    pub fn credential(&self, credential_id: &str) -> Option<CredentialRecord> {
        self.credentials.get(credential_id).cloned()
    }

    #[cfg(test)]
    pub fn credential_count(&self) -> usize {
        self.credentials.len()
    }

    /// Commit a successful authentication: advance the signature counter and
    /// replace the passkey blob (whose embedded counter also moved).
    ///
    /// The write is conditional. A counter that fails to advance means the
    /// assertion was replayed or the authenticator was cloned, so nothing is
    /// written. Authenticators without a counter report 0 forever; 0 -> 0 is
    /// the one permitted non-advance.
    pub fn record_authentication(
        &mut self,
        credential_id: &str,
        new_counter: u32,
        public_key: Vec<u8>,
    ) -> Result<String, ApiError> {
        let record = self
            .credentials
            .get_mut(credential_id)
            .ok_or_else(|| ApiError::not_found("Credential not found"))?;

        let counter_ok = new_counter > record.counter || (new_counter == 0 && record.counter == 0);
        if !counter_ok {
            return Err(ApiError::unauthorized(
                "signature counter did not advance",
            ));
        }

        record.counter = new_counter;
        record.public_key = public_key;
        Ok(record.user_id.clone())
    }
}
