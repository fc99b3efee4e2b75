// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Session & Ceremony State
//!
//! All client state lives in server-signed HS256 JWT cookies rather than a
//! server-side session table, so request handling stays stateless. Three
//! independent cookie slots exist:
//!
//! - `qc_session`: long-lived login session (`{userId}`, 14 days)
//! - `qc_pk_reg`: pending registration ceremony (10 minutes, single-use)
//! - `qc_pk_login`: pending login ceremony (10 minutes, single-use)
//!
//! A slot holds at most one value; starting a new ceremony overwrites the
//! previous one, and a ceremony that never finishes simply lapses at expiry.
//! Reading is total: a missing, garbage, tampered, or expired cookie reads
//! as absent, never as an error.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use webauthn_rs::prelude::{DiscoverableAuthentication, PasskeyRegistration};

use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "qc_session";
pub const REGISTRATION_COOKIE: &str = "qc_pk_reg";
pub const LOGIN_COOKIE: &str = "qc_pk_login";

const SESSION_TTL_DAYS: i64 = 14;
const PENDING_TTL_MINUTES: i64 = 10;

/// Payload of the long-lived session cookie.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct SessionClaims {
    #[serde(rename = "userId")]
    user_id: String,
}

/// Pending registration ceremony: the user being enrolled plus the
/// challenge-bearing verification state.
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingRegistration {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub ceremony: PasskeyRegistration,
}

/// Pending login ceremony (usernameless, so no user binding yet).
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingLogin {
    pub ceremony: DiscoverableAuthentication,
}

/// Timestamped wrapper the codec puts around every payload.
#[derive(Serialize, Deserialize)]
struct Claims<T> {
    iat: i64,
    exp: i64,
    #[serde(flatten)]
    payload: T,
}

/// Signs and verifies the cookie slots. Cheap to clone; lives in `AppState`.
#[derive(Clone)]
pub struct Sessions {
    secret: Option<String>,
    secure: bool,
}

impl Sessions {
    pub fn new(secret: Option<String>, secure: bool) -> Self {
        Self { secret, secure }
    }

    // -------------------------------------------------------------------------
    // Token codec
    // -------------------------------------------------------------------------

    fn sign<T: Serialize>(&self, payload: T, ttl: Duration) -> Result<String, ApiError> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| ApiError::config("SESSION_SECRET is not set"))?;

        let now = Utc::now();
        let claims = Claims {
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            payload,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(ApiError::internal)
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        let secret = self.secret.as_deref()?;
        let mut validation = Validation::new(Algorithm::HS256);
        // Cookie TTLs are exact; no clock leeway.
        validation.leeway = 0;
        decode::<Claims<T>>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .ok()
        .map(|data| data.claims.payload)
    }

    // -------------------------------------------------------------------------
    // Cookie slots
    // -------------------------------------------------------------------------

    fn put(&self, jar: CookieJar, name: &'static str, token: String) -> CookieJar {
        let cookie = Cookie::build((name, token))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .path("/")
            .build();
        jar.add(cookie)
    }

    fn clear(&self, jar: CookieJar, name: &'static str) -> CookieJar {
        jar.remove(Cookie::build(name).path("/").build())
    }

    fn read<T: DeserializeOwned>(&self, jar: &CookieJar, name: &str) -> Option<T> {
        jar.get(name).and_then(|cookie| self.verify(cookie.value()))
    }

    // -------------------------------------------------------------------------
    // Session slot
    // -------------------------------------------------------------------------

    /// Sign a fresh 14-day session for `user_id`, overwriting any prior one.
    pub fn establish(&self, jar: CookieJar, user_id: &str) -> Result<CookieJar, ApiError> {
        let token = self.sign(
            SessionClaims {
                user_id: user_id.to_string(),
            },
            Duration::days(SESSION_TTL_DAYS),
        )?;
        Ok(self.put(jar, SESSION_COOKIE, token))
    }

    pub fn terminate(&self, jar: CookieJar) -> CookieJar {
        self.clear(jar, SESSION_COOKIE)
    }

    /// `None` means anonymous; this never fails.
    pub fn current_user_id(&self, jar: &CookieJar) -> Option<String> {
        self.read::<SessionClaims>(jar, SESSION_COOKIE)
            .map(|claims| claims.user_id)
    }

    // -------------------------------------------------------------------------
    // Pending registration slot
    // -------------------------------------------------------------------------

    pub fn begin_registration(
        &self,
        jar: CookieJar,
        user_id: &str,
        ceremony: PasskeyRegistration,
    ) -> Result<CookieJar, ApiError> {
        let token = self.sign(
            PendingRegistration {
                user_id: user_id.to_string(),
                ceremony,
            },
            Duration::minutes(PENDING_TTL_MINUTES),
        )?;
        Ok(self.put(jar, REGISTRATION_COOKIE, token))
    }

    pub fn registration_state(&self, jar: &CookieJar) -> Option<PendingRegistration> {
        self.read(jar, REGISTRATION_COOKIE)
    }

    pub fn end_registration(&self, jar: CookieJar) -> CookieJar {
        self.clear(jar, REGISTRATION_COOKIE)
    }

    // -------------------------------------------------------------------------
    // Pending login slot
    // -------------------------------------------------------------------------

    pub fn begin_login(
        &self,
        jar: CookieJar,
        ceremony: DiscoverableAuthentication,
    ) -> Result<CookieJar, ApiError> {
        let token = self.sign(
            PendingLogin { ceremony },
            Duration::minutes(PENDING_TTL_MINUTES),
        )?;
        Ok(self.put(jar, LOGIN_COOKIE, token))
    }

    pub fn login_state(&self, jar: &CookieJar) -> Option<PendingLogin> {
        self.read(jar, LOGIN_COOKIE)
    }

    pub fn end_login(&self, jar: CookieJar) -> CookieJar {
        self.clear(jar, LOGIN_COOKIE)
    }
}
