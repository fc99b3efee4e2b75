// SPDX-License-Identifier: AGPL-3.0-or-later

//! # LiveKit Access Tokens
//!
//! Guest join tokens are HS256 JWTs signed with the LiveKit API secret,
//! using the claim layout of `livekit-server-sdk`: `iss` is the API key,
//! `sub` the participant identity, and the `video` claim carries the
//! room-scoped grants. No authentication is required to mint one; a room is
//! whoever knows its name.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Fixed validity window for guest tokens.
const GUEST_TOKEN_TTL_HOURS: i64 = 2;

/// Room-scoped capability grant embedded in the token.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_subscribe: bool,
    /// Chat runs over the data channel.
    pub can_publish_data: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessTokenClaims {
    iss: String,
    sub: String,
    name: String,
    nbf: i64,
    exp: i64,
    video: VideoGrant,
}

/// LiveKit signing credentials, both optional until configured.
#[derive(Clone)]
pub struct LiveKitKeys {
    api_key: Option<String>,
    api_secret: Option<String>,
}

impl LiveKitKeys {
    pub fn new(api_key: Option<String>, api_secret: Option<String>) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    fn keys(&self) -> Result<(&str, &str), ApiError> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) => Ok((key, secret)),
            _ => Err(ApiError::config(
                "LIVEKIT_API_KEY / LIVEKIT_API_SECRET is not set",
            )),
        }
    }

    /// Mint a 2-hour join token for `room`, returning `(token, identity)`.
    ///
    /// The identity gets a random suffix so two guests picking the same
    /// display name do not collide; the media server would otherwise kick
    /// the first participant when the second one joins.
    pub fn issue_guest_token(&self, room: &str, name: &str) -> Result<(String, String), ApiError> {
        if room.is_empty() || name.is_empty() {
            return Err(ApiError::bad_request("missing room or name"));
        }
        let (api_key, api_secret) = self.keys()?;

        let suffix: String = Uuid::new_v4().simple().to_string()[..8].to_string();
        let identity = format!("guest:{name}:{suffix}");

        let now = Utc::now();
        let claims = AccessTokenClaims {
            iss: api_key.to_string(),
            sub: identity.clone(),
            name: name.to_string(),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(GUEST_TOKEN_TTL_HOURS)).timestamp(),
            video: VideoGrant {
                room: room.to_string(),
                room_join: true,
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
            },
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(api_secret.as_bytes()),
        )
        .map_err(ApiError::internal)?;

        Ok((token, identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn keys() -> LiveKitKeys {
        LiveKitKeys::new(Some("devkey".into()), Some("devsecret".into()))
    }

    #[test]
    fn token_carries_room_grant_and_window() {
        let (token, identity) = keys().issue_guest_token("room1", "Alice").unwrap();

        let data = decode::<AccessTokenClaims>(
            &token,
            &DecodingKey::from_secret(b"devsecret"),
            &Validation::new(Algorithm::HS256),
        )
        .expect("token verifies with the API secret");

        let claims = data.claims;
        assert_eq!(claims.iss, "devkey");
        assert_eq!(claims.sub, identity);
        assert_eq!(claims.name, "Alice");
        assert_eq!(claims.exp - claims.nbf, 2 * 60 * 60);
        assert_eq!(
            claims.video,
            VideoGrant {
                room: "room1".into(),
                room_join: true,
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
            }
        );
    }

    #[test]
    fn identical_names_get_distinct_identities() {
        let issuer = keys();
        let (_, first) = issuer.issue_guest_token("room1", "Alice").unwrap();
        let (_, second) = issuer.issue_guest_token("room1", "Alice").unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("guest:Alice:"));
        assert!(second.starts_with("guest:Alice:"));
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let issuer = keys();
        for (room, name) in [("", "Alice"), ("room1", "")] {
            let err = issuer.issue_guest_token(room, name).unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn missing_credentials_are_a_config_error() {
        let issuer = LiveKitKeys::new(Some("devkey".into()), None);
        let err = issuer.issue_guest_token("room1", "Alice").unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("LIVEKIT_API"));
    }
}
