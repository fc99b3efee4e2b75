// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Passkey Ceremonies & Sessions
//!
//! Both ceremonies are split into `start` (mint a challenge, park it in a
//! signed cookie) and `finish` (verify the client's proof against the parked
//! challenge). The cryptographic ceremony itself runs in the browser between
//! the two calls, gated on a user gesture, so an arbitrarily long gap - up
//! to the 10-minute state expiry - must be tolerated. Abandoned ceremonies
//! need no cleanup; their cookies simply expire.
//!
//! Ordering on the success paths matters:
//! - registration: user lookup precedes the credential write, so a crash can
//!   orphan a pending cookie (harmless) but never a credential without an
//!   owner;
//! - login: the advanced signature counter is persisted before the response
//!   is produced - that write is the replay defense.

use axum::{extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::extract::WithRejection;
use base64::prelude::*;
use uuid::Uuid;
use webauthn_rs::prelude::{
    CreationChallengeResponse, DiscoverableKey, Passkey, PublicKeyCredential,
    RegisterPublicKeyCredential, RequestChallengeResponse,
};

use crate::{
    error::ApiError,
    models::{MeResponse, OkResponse},
    state::AppState,
};

/// Begin a registration ceremony.
///
/// Every call creates a fresh host identity; this starter has no signup
/// flow or deduplication.
#[utoipa::path(
    post,
    path = "/auth/passkey/register/start",
    tag = "Auth",
    responses(
        (status = 200, description = "WebAuthn creation options; pending state set in a cookie"),
        (status = 500, description = "Session secret not configured")
    )
)]
pub async fn register_start(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<CreationChallengeResponse>), ApiError> {
    let user = state.store.write().await.create_user("host");
    let user_uuid = Uuid::parse_str(&user.id).map_err(ApiError::internal)?;
    let user_name = user.name.clone().unwrap_or_else(|| user.id.clone());

    let (options, ceremony) = state
        .webauthn
        .start_passkey_registration(user_uuid, &user_name, &user_name, None)
        .map_err(ApiError::internal)?;

    let jar = state.sessions.begin_registration(jar, &user.id, ceremony)?;
    tracing::debug!(user_id = %user.id, "registration ceremony started");
    Ok((jar, Json(options)))
}

/// Finish a registration ceremony: verify the attestation against the parked
/// challenge, persist the credential, and log the new user in.
#[utoipa::path(
    post,
    path = "/auth/passkey/register/finish",
    tag = "Auth",
    request_body(content = Object, description = "WebAuthn attestation response"),
    responses(
        (status = 200, description = "Credential stored, session established", body = OkResponse),
        (status = 400, description = "No pending registration, or verification failed"),
        (status = 404, description = "Pending user no longer exists")
    )
)]
pub async fn register_finish(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(attestation), _): WithRejection<Json<RegisterPublicKeyCredential>, ApiError>,
) -> Result<(CookieJar, Json<OkResponse>), ApiError> {
    let Some(pending) = state.sessions.registration_state(&jar) else {
        return Err(ApiError::bad_request("no pending registration"));
    };

    let user = state
        .store
        .read()
        .await
        .user(&pending.user_id)
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let passkey = state
        .webauthn
        .finish_passkey_registration(&attestation, &pending.ceremony)
        .map_err(|err| {
            tracing::debug!(user_id = %user.id, "registration verification failed: {err}");
            ApiError::bad_request("registration verification failed")
        })?;

    let credential_id = BASE64_URL_SAFE_NO_PAD.encode(passkey.cred_id());
    let public_key = serde_json::to_vec(&passkey).map_err(ApiError::internal)?;
    let transports = attestation.response.transports.clone().unwrap_or_default();

    // The counter column starts at 0 and converges with the first login;
    // until then the serialized passkey holds the authoritative counter and
    // verification checks regressions against it.
    state.store.write().await.insert_credential(
        &user.id,
        credential_id,
        public_key,
        0,
        transports,
    )?;

    let jar = state.sessions.establish(jar, &user.id)?;
    let jar = state.sessions.end_registration(jar);
    tracing::info!(user_id = %user.id, "passkey registered");
    Ok((jar, Json(OkResponse::new())))
}

/// Begin a login ceremony (usernameless; the authenticator discovers the
/// credential).
#[utoipa::path(
    post,
    path = "/auth/passkey/login/start",
    tag = "Auth",
    responses(
        (status = 200, description = "WebAuthn request options; pending state set in a cookie"),
        (status = 500, description = "Session secret not configured")
    )
)]
pub async fn login_start(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RequestChallengeResponse>), ApiError> {
    let (options, ceremony) = state
        .webauthn
        .start_discoverable_authentication()
        .map_err(ApiError::internal)?;

    let jar = state.sessions.begin_login(jar, ceremony)?;
    Ok((jar, Json(options)))
}

/// Finish a login ceremony: verify the assertion, commit the advanced
/// signature counter, and establish the session.
#[utoipa::path(
    post,
    path = "/auth/passkey/login/finish",
    tag = "Auth",
    request_body(content = Object, description = "WebAuthn assertion response"),
    responses(
        (status = 200, description = "Session established", body = OkResponse),
        (status = 400, description = "No pending login"),
        (status = 401, description = "Assertion verification failed, or counter did not advance"),
        (status = 404, description = "Credential not registered here")
    )
)]
pub async fn login_finish(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(assertion), _): WithRejection<Json<PublicKeyCredential>, ApiError>,
) -> Result<(CookieJar, Json<OkResponse>), ApiError> {
    let Some(pending) = state.sessions.login_state(&jar) else {
        return Err(ApiError::bad_request("no pending login"));
    };

    // The proof names the credential that signed it (base64url of the raw
    // credential ID, which is exactly how records are keyed).
    let credential_id = assertion.id.clone();
    let credential = state
        .store
        .read()
        .await
        .credential(&credential_id)
        .ok_or_else(|| ApiError::not_found("Credential not found"))?;

    let mut passkey: Passkey =
        serde_json::from_slice(&credential.public_key).map_err(ApiError::internal)?;

    let result = state
        .webauthn
        .finish_discoverable_authentication(
            &assertion,
            pending.ceremony,
            &[DiscoverableKey::from(&passkey)],
        )
        .map_err(|err| {
            tracing::debug!(%credential_id, "login verification failed: {err}");
            ApiError::unauthorized("passkey verification failed")
        })?;

    // Conditional write under the store lock: the replay defense.
    passkey.update_credential(&result);
    let public_key = serde_json::to_vec(&passkey).map_err(ApiError::internal)?;
    let user_id = state.store.write().await.record_authentication(
        &credential_id,
        result.counter(),
        public_key,
    )?;

    let jar = state.sessions.end_login(jar);
    let jar = state.sessions.establish(jar, &user_id)?;
    tracing::info!(%user_id, "passkey login succeeded");
    Ok((jar, Json(OkResponse::new())))
}

/// Drop the session cookie. Nothing server-side to revoke.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, body = OkResponse))
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<OkResponse>) {
    (state.sessions.terminate(jar), Json(OkResponse::new()))
}

/// Report the current session's user, or null for anonymous callers.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, body = MeResponse))
)]
pub async fn me(State(state): State<AppState>, jar: CookieJar) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: state.sessions.current_user_id(&jar),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{LOGIN_COOKIE, REGISTRATION_COOKIE, SESSION_COOKIE};
    use axum::http::StatusCode;
    use serde_json::json;

    fn body<T>(value: T) -> WithRejection<Json<T>, ApiError> {
        WithRejection(Json(value), std::marker::PhantomData)
    }

    /// Syntactically valid attestation body that cannot pass verification.
    fn bogus_attestation() -> RegisterPublicKeyCredential {
        serde_json::from_value(json!({
            "id": "AAAA",
            "rawId": "AAAA",
            "type": "public-key",
            "response": {
                "attestationObject": "AAAA",
                "clientDataJSON": "AAAA"
            },
            "extensions": {}
        }))
        .expect("attestation shape deserializes")
    }

    /// Syntactically valid assertion body that names an unknown credential.
    fn bogus_assertion() -> PublicKeyCredential {
        serde_json::from_value(json!({
            "id": "AAAA",
            "rawId": "AAAA",
            "type": "public-key",
            "response": {
                "authenticatorData": "AAAA",
                "clientDataJSON": "AAAA",
                "signature": "AAAA"
            },
            "extensions": {}
        }))
        .expect("assertion shape deserializes")
    }

    #[tokio::test]
    async fn me_without_session_is_null() {
        let state = AppState::default();
        let Json(body) = me(State(state), CookieJar::new()).await;
        assert_eq!(body, MeResponse { user_id: None });
    }

    #[tokio::test]
    async fn me_with_garbage_cookie_is_null() {
        let state = AppState::default();
        let jar = CookieJar::new().add(axum_extra::extract::cookie::Cookie::new(
            SESSION_COOKIE,
            "garbage",
        ));
        let Json(body) = me(State(state), jar).await;
        assert_eq!(body, MeResponse { user_id: None });
    }

    #[tokio::test]
    async fn logout_clears_the_session() {
        let state = AppState::default();
        let jar = state
            .sessions
            .establish(CookieJar::new(), "user-1")
            .unwrap();
        assert_eq!(state.sessions.current_user_id(&jar), Some("user-1".into()));

        let (jar, Json(body)) = logout(State(state.clone()), jar).await;
        assert!(body.ok);
        assert_eq!(state.sessions.current_user_id(&jar), None);
    }

    #[tokio::test]
    async fn register_start_creates_user_and_parks_challenge() {
        let state = AppState::default();
        let (jar, Json(options)) = register_start(State(state.clone()), CookieJar::new())
            .await
            .expect("registration start succeeds");

        assert!(jar.get(REGISTRATION_COOKIE).is_some());
        assert_eq!(options.public_key.rp.id, "localhost");

        let pending = state
            .sessions
            .registration_state(&jar)
            .expect("pending state readable");
        let store = state.store.read().await;
        assert!(store.user(&pending.user_id).is_some());
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn each_registration_start_is_a_fresh_identity() {
        let state = AppState::default();
        let _ = register_start(State(state.clone()), CookieJar::new())
            .await
            .unwrap();
        let _ = register_start(State(state.clone()), CookieJar::new())
            .await
            .unwrap();
        assert_eq!(state.store.read().await.user_count(), 2);
    }

    #[tokio::test]
    async fn register_start_without_secret_is_500() {
        let mut config = crate::state::test_config();
        config.session_secret = None;
        let state = AppState::new(&config).unwrap();

        let err = register_start(State(state), CookieJar::new())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn register_finish_without_state_is_400() {
        let state = AppState::default();
        let err = register_finish(
            State(state.clone()),
            CookieJar::new(),
            body(bogus_attestation()),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(state.store.read().await.credential_count(), 0);
    }

    #[tokio::test]
    async fn register_finish_with_invalid_attestation_creates_nothing() {
        let state = AppState::default();
        let (jar, _) = register_start(State(state.clone()), CookieJar::new())
            .await
            .unwrap();

        let err = register_finish(State(state.clone()), jar, body(bogus_attestation()))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        let store = state.store.read().await;
        assert_eq!(store.credential_count(), 0);
    }

    #[tokio::test]
    async fn register_finish_with_vanished_user_is_404() {
        let state = AppState::default();
        // Park pending state pointing at a user that was never created.
        let (_, ceremony) = state
            .webauthn
            .start_passkey_registration(
                Uuid::new_v4(),
                "ghost",
                "ghost",
                None,
            )
            .unwrap();
        let jar = state
            .sessions
            .begin_registration(CookieJar::new(), "no-such-user", ceremony)
            .unwrap();

        let err = register_finish(State(state), jar, body(bogus_attestation()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn login_start_parks_challenge() {
        let state = AppState::default();
        let (jar, Json(_options)) = login_start(State(state.clone()), CookieJar::new())
            .await
            .expect("login start succeeds");

        assert!(jar.get(LOGIN_COOKIE).is_some());
        assert!(state.sessions.login_state(&jar).is_some());
    }

    #[tokio::test]
    async fn login_finish_without_state_is_400() {
        let state = AppState::default();
        let err = login_finish(State(state), CookieJar::new(), body(bogus_assertion()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_body_becomes_a_json_error() {
        use axum::extract::FromRequest;
        use axum::response::IntoResponse;

        let request = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("not json"))
            .unwrap();
        let rejection = Json::<PublicKeyCredential>::from_request(request, &())
            .await
            .unwrap_err();

        let response = ApiError::from(rejection).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let content_type = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .unwrap();
        assert!(content_type.to_str().unwrap().starts_with("application/json"));
    }

    #[tokio::test]
    async fn login_finish_with_unknown_credential_is_404() {
        let state = AppState::default();
        let (jar, _) = login_start(State(state.clone()), CookieJar::new())
            .await
            .unwrap();

        let err = login_finish(State(state), jar, body(bogus_assertion()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
