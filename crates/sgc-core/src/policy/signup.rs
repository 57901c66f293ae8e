//! Signup admission rules

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::entities::Invite;
use crate::error::DomainError;
use crate::value_objects::{email_domain, normalize_email};

/// Who may create an account through the signup form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignupMode {
    Closed,
    #[default]
    Invite,
    Open,
}

impl SignupMode {
    /// `SIGNUP_MODE` wins when set; otherwise `ALLOW_SELF_SIGNUP` selects open,
    /// and the fallback is invite-only.
    pub fn resolve(explicit: Option<&str>, allow_self_signup: bool) -> Result<Self, DomainError> {
        match explicit.map(str::trim).filter(|s| !s.is_empty()) {
            Some(value) => value.parse(),
            None if allow_self_signup => Ok(Self::Open),
            None => Ok(Self::Invite),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Invite => "invite",
            Self::Open => "open",
        }
    }
}

impl fmt::Display for SignupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignupMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "closed" => Ok(Self::Closed),
            "invite" => Ok(Self::Invite),
            "open" => Ok(Self::Open),
            other => Err(DomainError::ValidationError(format!(
                "unknown signup mode: {other}"
            ))),
        }
    }
}

/// Email domains accepted at open signup; empty accepts every domain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainAllowlist {
    domains: Vec<String>,
}

impl DomainAllowlist {
    /// Parse a comma separated list, e.g. `"sgc.cl, Example.com"`
    pub fn parse(raw: &str) -> Self {
        let domains = raw
            .split(',')
            .map(|d| d.trim().trim_start_matches('@').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self { domains }
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn allows(&self, email: &str) -> bool {
        if self.domains.is_empty() {
            return true;
        }
        let Some(email) = normalize_email(email) else {
            return false;
        };
        email_domain(&email).is_some_and(|domain| self.domains.iter().any(|d| d == domain))
    }
}

/// Signup mode plus allowlist
#[derive(Debug, Clone, Default)]
pub struct SignupPolicy {
    pub mode: SignupMode,
    pub allowlist: DomainAllowlist,
}

impl SignupPolicy {
    pub fn new(mode: SignupMode, allowlist: DomainAllowlist) -> Self {
        Self { mode, allowlist }
    }

    pub fn is_closed(&self) -> bool {
        self.mode == SignupMode::Closed
    }

    pub fn requires_invite(&self) -> bool {
        self.mode == SignupMode::Invite
    }

    /// Admission check for an email, with the invite when the mode needs one.
    ///
    /// The invite must be active at `now` and, when bound, match the email.
    pub fn admit(
        &self,
        email: &str,
        invite: Option<&Invite>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        match self.mode {
            SignupMode::Closed => Err(DomainError::SignupClosed),
            SignupMode::Invite => {
                let invite = invite.ok_or(DomainError::InviteNotFound)?;
                if !invite.is_active(now) {
                    return Err(DomainError::InviteInactive);
                }
                if !invite.accepts_email(email) {
                    return Err(DomainError::InviteEmailMismatch);
                }
                Ok(())
            }
            SignupMode::Open => {
                if self.allowlist.allows(email) {
                    Ok(())
                } else {
                    Err(DomainError::DomainNotAllowed)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::Role;

    #[test]
    fn test_mode_resolution() {
        assert_eq!(SignupMode::resolve(Some("closed"), true).unwrap(), SignupMode::Closed);
        assert_eq!(SignupMode::resolve(None, true).unwrap(), SignupMode::Open);
        assert_eq!(SignupMode::resolve(Some("  "), false).unwrap(), SignupMode::Invite);
        assert!(SignupMode::resolve(Some("anyone"), false).is_err());
    }

    #[test]
    fn test_allowlist() {
        let list = DomainAllowlist::parse("sgc.cl, @Example.com,");
        assert!(list.allows("juan@SGC.cl"));
        assert!(list.allows("ana@example.com"));
        assert!(!list.allows("x@other.com"));
        assert!(!list.allows("broken"));
        assert!(DomainAllowlist::parse("").allows("x@anything.org"));
    }

    #[test]
    fn test_closed_rejects_everyone() {
        let policy = SignupPolicy::new(SignupMode::Closed, DomainAllowlist::default());
        assert!(matches!(
            policy.admit("a@x.com", None, Utc::now()),
            Err(DomainError::SignupClosed)
        ));
    }

    #[test]
    fn test_invite_mode() {
        let policy = SignupPolicy::new(SignupMode::Invite, DomainAllowlist::default());
        let now = Utc::now();
        let invite = Invite::new("t".into(), Role::Viewer, None).with_email("new@x.com");

        assert!(policy.admit("NEW@x.com", Some(&invite), now).is_ok());
        assert!(matches!(
            policy.admit("other@x.com", Some(&invite), now),
            Err(DomainError::InviteEmailMismatch)
        ));
        assert!(matches!(
            policy.admit("new@x.com", None, now),
            Err(DomainError::InviteNotFound)
        ));

        let mut used = invite.clone();
        used.used_count = 1;
        assert!(matches!(
            policy.admit("new@x.com", Some(&used), now),
            Err(DomainError::InviteInactive)
        ));
    }

    #[test]
    fn test_open_mode_uses_allowlist() {
        let policy = SignupPolicy::new(SignupMode::Open, DomainAllowlist::parse("sgc.cl"));
        assert!(policy.admit("a@sgc.cl", None, Utc::now()).is_ok());
        assert!(matches!(
            policy.admit("a@gmail.com", None, Utc::now()),
            Err(DomainError::DomainNotAllowed)
        ));
    }
}
