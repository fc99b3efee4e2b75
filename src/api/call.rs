// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Guest Call Tokens
//!
//! Guests need no account: anyone with a room name and a display name can
//! mint a join token. Host-side abuse controls belong to the media server,
//! not this endpoint.

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{error::ApiError, models::CallTokenResponse, state::AppState};

const ROOM_MIN_LEN: usize = 3;
const ROOM_MAX_LEN: usize = 80;
const NAME_MAX_LEN: usize = 30;

#[derive(Debug, Deserialize, IntoParams)]
pub struct CallTokenQuery {
    /// Room to join.
    pub room: String,
    /// Display name shown to other participants.
    pub name: String,
}

fn validate_room(room: &str) -> Result<(), ApiError> {
    if room.is_empty() {
        return Err(ApiError::bad_request("missing room or name"));
    }
    let charset_ok = room
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if room.len() < ROOM_MIN_LEN || room.len() > ROOM_MAX_LEN || !charset_ok {
        return Err(ApiError::bad_request(
            "room must be 3-80 characters of letters, digits, '_' or '-'",
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("missing room or name"));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(ApiError::bad_request("name must be at most 30 characters"));
    }
    Ok(())
}

/// Mint a room-scoped guest join token.
#[utoipa::path(
    get,
    path = "/call/token",
    params(CallTokenQuery),
    tag = "Call",
    responses(
        (status = 200, description = "Join token minted", body = CallTokenResponse),
        (status = 400, description = "Missing or invalid room/name"),
        (status = 500, description = "LiveKit credentials not configured")
    )
)]
pub async fn issue_call_token(
    State(state): State<AppState>,
    WithRejection(Query(params), _): WithRejection<Query<CallTokenQuery>, ApiError>,
) -> Result<Json<CallTokenResponse>, ApiError> {
    let room = params.room.trim();
    let name = params.name.trim();
    validate_room(room)?;
    validate_name(name)?;

    let (token, identity) = state.livekit.issue_guest_token(room, name)?;
    tracing::debug!(%room, %identity, "guest token issued");

    Ok(Json(CallTokenResponse {
        ok: true,
        token,
        identity,
        room: room.to_string(),
    }))
}
