// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Data Models
//!
//! Durable records owned by the repository ([`User`], [`CredentialRecord`])
//! and the JSON response shapes of the REST API. Response types derive
//! `ToSchema` for the OpenAPI document; records stay out of the schema since
//! they never cross the wire whole.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use webauthn_rs_proto::AuthenticatorTransport;

// =============================================================================
// Repository Records
// =============================================================================

/// A host identity. Created ad hoc when a registration ceremony starts;
/// there is no separate signup flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A registered passkey credential, owned by exactly one user.
///
/// `credential_id` is the base64url (unpadded) encoding of the authenticator
/// credential ID and is unique across all records. `public_key` is the
/// serialized `webauthn_rs` passkey; it is opaque to everything except the
/// login-finish verification step. `counter` only ever advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: String,
    pub user_id: String,
    pub credential_id: String,
    pub public_key: Vec<u8>,
    pub counter: u32,
    pub transports: Vec<AuthenticatorTransport>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// API Responses
// =============================================================================

/// Generic success acknowledgement for ceremony and session endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn new() -> Self {
        Self { ok: true }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Who the current session belongs to. `userId` is null for anonymous
/// callers; the endpoint never fails.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: Option<String>,
}

/// A minted guest join token for a call room.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CallTokenResponse {
    pub ok: bool,
    /// Opaque bearer token for the media server.
    pub token: String,
    /// Process-unique participant identity the token was minted for.
    pub identity: String,
    pub room: String,
}
