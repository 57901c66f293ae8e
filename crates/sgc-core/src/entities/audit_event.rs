//! Audit event - append-only record of a security-relevant action

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::account::AccountId;
use crate::error::DomainError;

/// Event tag, serialized as `type` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    LoginSuccess,
    LoginFail,
    LoginLockout,
    Logout,
    LogoutAllOk,
    PasswordChange,
    ResetIssued,
    ResetCompleted,
    RefreshOk,
    RefreshRevokedOrExpired,
    ApproveUser,
    RejectUser,
    MfaFail,
    MfaEnrolled,
    Signup,
    InviteCreated,
    InviteRevoked,
    ForceChangeSet,
    SessionsRevoked,
    ResetLinkGenerated,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LoginSuccess => "login_success",
            Self::LoginFail => "login_fail",
            Self::LoginLockout => "login_lockout",
            Self::Logout => "logout",
            Self::LogoutAllOk => "logout_all_ok",
            Self::PasswordChange => "password_change",
            Self::ResetIssued => "reset_issued",
            Self::ResetCompleted => "reset_completed",
            Self::RefreshOk => "refresh_ok",
            Self::RefreshRevokedOrExpired => "refresh_revoked_or_expired",
            Self::ApproveUser => "approve_user",
            Self::RejectUser => "reject_user",
            Self::MfaFail => "mfa_fail",
            Self::MfaEnrolled => "mfa_enrolled",
            Self::Signup => "signup",
            Self::InviteCreated => "invite_created",
            Self::InviteRevoked => "invite_revoked",
            Self::ForceChangeSet => "force_change_set",
            Self::SessionsRevoked => "sessions_revoked",
            Self::ResetLinkGenerated => "reset_link_generated",
        }
    }

    const ALL: [AuditEventType; 20] = [
        Self::LoginSuccess,
        Self::LoginFail,
        Self::LoginLockout,
        Self::Logout,
        Self::LogoutAllOk,
        Self::PasswordChange,
        Self::ResetIssued,
        Self::ResetCompleted,
        Self::RefreshOk,
        Self::RefreshRevokedOrExpired,
        Self::ApproveUser,
        Self::RejectUser,
        Self::MfaFail,
        Self::MfaEnrolled,
        Self::Signup,
        Self::InviteCreated,
        Self::InviteRevoked,
        Self::ForceChangeSet,
        Self::SessionsRevoked,
        Self::ResetLinkGenerated,
    ];
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::ValidationError(format!("unknown audit event type: {s}")))
    }
}

/// Stored audit event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub id: i64,
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub user_id: Option<AccountId>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub meta: Map<String, Value>,
}

/// Event about to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEvent {
    pub event_type: AuditEventType,
    pub user_id: Option<AccountId>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub meta: Map<String, Value>,
}

impl NewAuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            user_id: None,
            ip: None,
            user_agent: None,
            meta: Map::new(),
        }
    }

    pub fn user(mut self, user_id: AccountId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn into_event(self, id: i64, ts: DateTime<Utc>) -> AuditEvent {
        AuditEvent {
            id,
            ts,
            event_type: self.event_type,
            user_id: self.user_id,
            ip: self.ip,
            user_agent: self.user_agent,
            meta: self.meta,
        }
    }
}
