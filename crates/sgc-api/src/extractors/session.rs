//! Signed browser session
//!
//! The whole session lives in one signed cookie, `sgc_session`: the signed-in
//! account, the MFA-pending bucket between the password and code steps, and
//! a one-shot flash message. Handlers mutate a [`Session`] and return it as
//! part of the response so the cookie is rewritten.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
    response::{IntoResponseParts, ResponseParts},
};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sgc_core::AccountId;
use sgc_service::{MfaChallenge, MfaStage};
use std::convert::Infallible;

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sgc_session";

/// Lifetime of the MFA-pending bucket
pub const MFA_BUCKET_TTL_SECS: i64 = 300;

const REMEMBER_DAYS: i64 = 30;

/// Severity of a flash message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Info,
    Warning,
    Error,
}

impl FlashKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

/// Cookie payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<AccountId>,
    /// Sign-in time in epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub remember: bool,
    #[serde(rename = "2fa_uid", default, skip_serializing_if = "Option::is_none")]
    pub mfa_uid: Option<AccountId>,
    #[serde(rename = "2fa_stage", default, skip_serializing_if = "Option::is_none")]
    pub mfa_stage: Option<MfaStage>,
    #[serde(rename = "2fa_next", default, skip_serializing_if = "Option::is_none")]
    pub mfa_next: Option<String>,
    #[serde(rename = "2fa_remember", default, skip_serializing_if = "std::ops::Not::not")]
    pub mfa_remember: bool,
    #[serde(rename = "2fa_force_change", default, skip_serializing_if = "std::ops::Not::not")]
    pub mfa_force_change: bool,
    #[serde(rename = "2fa_secret", default, skip_serializing_if = "Option::is_none")]
    pub mfa_secret: Option<String>,
    #[serde(rename = "2fa_ts", default, skip_serializing_if = "Option::is_none")]
    pub mfa_ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash: Option<Flash>,
}

impl SessionData {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Decode the cookie value; anything malformed is an empty session
    fn decode(value: &str) -> Self {
        hex::decode(value)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    fn encode(&self) -> String {
        hex::encode(serde_json::to_vec(self).unwrap_or_default())
    }

    fn clear_mfa(&mut self) {
        self.mfa_uid = None;
        self.mfa_stage = None;
        self.mfa_next = None;
        self.mfa_remember = false;
        self.mfa_force_change = false;
        self.mfa_secret = None;
        self.mfa_ts = None;
    }
}

/// Signed-in account of a session cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPrincipal {
    pub user_id: AccountId,
    /// Sign-in time in epoch milliseconds
    pub issued_at: i64,
}

/// Principal signed into the session carried by `headers`
///
/// Cookies without a sign-in time are treated as anonymous.
pub fn session_principal(headers: &HeaderMap, key: &Key) -> Option<SessionPrincipal> {
    let jar = SignedCookieJar::from_headers(headers, key.clone());
    let data = SessionData::decode(jar.get(SESSION_COOKIE)?.value());
    Some(SessionPrincipal {
        user_id: data.uid?,
        issued_at: data.iat?,
    })
}

/// Browser session extractor and response part
#[derive(Debug, Clone)]
pub struct Session {
    jar: SignedCookieJar,
    data: SessionData,
    secure: bool,
    dirty: bool,
}

impl Session {
    pub fn from_headers(headers: &HeaderMap, key: Key, secure: bool) -> Self {
        let jar = SignedCookieJar::from_headers(headers, key);
        let data = jar
            .get(SESSION_COOKIE)
            .map(|cookie| SessionData::decode(cookie.value()))
            .unwrap_or_default();
        Self {
            jar,
            data,
            secure,
            dirty: false,
        }
    }

    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn user_id(&self) -> Option<AccountId> {
        self.data.uid
    }

    /// Signed-in account with its sign-in time
    pub fn principal(&self) -> Option<SessionPrincipal> {
        Some(SessionPrincipal {
            user_id: self.data.uid?,
            issued_at: self.data.iat?,
        })
    }

    /// Re-issue the sign-in of the current account with a fresh time
    pub fn renew(&mut self) {
        if let Some(user_id) = self.data.uid {
            self.sign_in(user_id, self.data.remember);
        }
    }

    /// Replace any previous session with a signed-in one
    pub fn sign_in(&mut self, user_id: AccountId, remember: bool) {
        let flash = self.data.flash.take();
        self.data = SessionData {
            uid: Some(user_id),
            iat: Some(Utc::now().timestamp_millis()),
            remember,
            flash,
            ..SessionData::default()
        };
        self.dirty = true;
    }

    /// Drop everything but a pending flash
    pub fn clear(&mut self) {
        let flash = self.data.flash.take();
        self.data = SessionData {
            flash,
            ..SessionData::default()
        };
        self.dirty = true;
    }

    /// Open the MFA-pending bucket after a correct password
    pub fn begin_mfa(&mut self, challenge: &MfaChallenge) {
        self.data.uid = None;
        self.data.iat = None;
        self.data.remember = false;
        self.data.mfa_uid = Some(challenge.user_id);
        self.data.mfa_stage = Some(challenge.stage);
        self.data.mfa_next.clone_from(&challenge.next);
        self.data.mfa_remember = challenge.remember;
        self.data.mfa_force_change = challenge.force_change;
        self.data.mfa_secret = None;
        self.data.mfa_ts = Some(Utc::now().timestamp());
        self.dirty = true;
    }

    /// The live MFA challenge; an expired or stageless bucket is discarded
    pub fn mfa_challenge(&mut self) -> Option<MfaChallenge> {
        let user_id = self.data.mfa_uid?;
        let fresh = self
            .data
            .mfa_ts
            .is_some_and(|ts| Utc::now().timestamp() - ts <= MFA_BUCKET_TTL_SECS);
        let stage = self.data.mfa_stage.filter(|_| fresh);
        let Some(stage) = stage else {
            self.data.clear_mfa();
            self.dirty = true;
            return None;
        };
        Some(MfaChallenge {
            user_id,
            stage,
            next: self.data.mfa_next.clone(),
            remember: self.data.mfa_remember,
            force_change: self.data.mfa_force_change,
        })
    }

    pub fn pending_secret(&self) -> Option<&str> {
        self.data.mfa_secret.as_deref()
    }

    pub fn set_pending_secret(&mut self, secret: &str) {
        if self.data.mfa_secret.as_deref() != Some(secret) {
            self.data.mfa_secret = Some(secret.to_string());
            self.dirty = true;
        }
    }

    pub fn flash(&mut self, kind: FlashKind, message: impl Into<String>) {
        self.data.flash = Some(Flash {
            kind,
            message: message.into(),
        });
        self.dirty = true;
    }

    /// Read-once flash message
    pub fn take_flash(&mut self) -> Option<Flash> {
        let flash = self.data.flash.take();
        if flash.is_some() {
            self.dirty = true;
        }
        flash
    }

    fn into_jar(self) -> SignedCookieJar {
        if !self.dirty {
            return self.jar;
        }
        if self.data.is_empty() {
            return self
                .jar
                .remove(Cookie::build(SESSION_COOKIE).path("/"));
        }

        let mut cookie = Cookie::build((SESSION_COOKIE, self.data.encode()))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.secure);
        if self.data.remember && self.data.uid.is_some() {
            cookie = cookie.max_age(time::Duration::days(REMEMBER_DAYS));
        }
        self.jar.add(cookie)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(
            &parts.headers,
            state.cookie_key().clone(),
            state.secure_cookies(),
        ))
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        self.into_jar().into_response_parts(res)
    }
}
