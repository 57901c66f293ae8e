//! Account roles and approval status

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Role granted to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Supervisor,
    Editor,
    #[default]
    Viewer,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Supervisor, Role::Editor, Role::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Supervisor => "supervisor",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    /// Roles that must pass a second factor before a browser session is issued
    pub fn requires_mfa(&self) -> bool {
        matches!(self, Self::Admin | Self::Supervisor)
    }

    /// Where a freshly signed-in browser user lands
    pub fn default_landing(&self) -> &'static str {
        match self {
            Self::Admin => "/admin",
            Self::Supervisor => "/dashboard",
            Self::Editor => "/partes",
            Self::Viewer => "/",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "supervisor" => Ok(Self::Supervisor),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            other => Err(DomainError::InvalidRole(other.to_string())),
        }
    }
}

/// True when the caller holds at least one of the allowed roles.
///
/// Callers may carry a single role or several; membership is a plain set
/// intersection.
pub fn roles_intersect<'a, I>(held: I, allowed: &[Role]) -> bool
where
    I: IntoIterator<Item = &'a Role>,
{
    let held: HashSet<&Role> = held.into_iter().collect();
    allowed.iter().any(|role| held.contains(role))
}

/// Approval state of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::ValidationError(format!(
                "unknown account status: {other}"
            ))),
        }
    }
}
