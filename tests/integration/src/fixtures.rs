//! Test fixtures and wire types
//!
//! Request and response shapes as a client sees them, plus helpers for
//! pulling tokens and secrets out of mail and pages.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sgc_common::TotpService;

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique suffix for test data
pub fn unique_suffix() -> String {
    let count = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}{}", Utc::now().timestamp_millis() % 100_000, count)
}

pub const ADMIN_EMAIL: &str = "admin@admin.com";
pub const ADMIN_PASSWORD: &str = "admin123";
pub const STRONG_PASSWORD: &str = "Abcdefgh1234";

/// JSON login body
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl RefreshRequest {
    pub fn new(token: &str) -> Self {
        Self {
            refresh_token: token.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Default)]
pub struct CreateInviteRequest {
    pub email: Option<String>,
    pub role: Option<String>,
    pub max_uses: Option<i32>,
}

/// Token pair returned by login and refresh
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct MeResponse {
    pub id: i64,
    pub email: Option<String>,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub role: String,
    pub status: String,
    pub is_active: bool,
    pub is_approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct AccountPage {
    pub items: Vec<AccountResponse>,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct InviteResponse {
    pub token: String,
    pub url: String,
    pub email: Option<String>,
    pub max_uses: i32,
    pub used_count: i32,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct AuditEventResponse {
    pub id: i64,
    pub user_id: Option<i64>,
    #[serde(rename = "type")]
    pub event_type: String,
}

/// JSON error envelope
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub detail: String,
    pub path: Option<String>,
}

/// Path and query of an absolute link, e.g. from a mail body
pub fn link_path(url: &str) -> &str {
    url.find("://")
        .and_then(|scheme| url[scheme + 3..].find('/').map(|i| &url[scheme + 3 + i..]))
        .unwrap_or(url)
}

/// Value of `?token=` in an invite link
pub fn invite_token(url: &str) -> Option<&str> {
    url.split_once("token=").map(|(_, rest)| rest.split('&').next().unwrap_or(rest))
}

/// Secret printed on the enrollment page
pub fn scrape_totp_secret(page: &str) -> Option<String> {
    let start = page.find(r#"<code id="totp-secret">"#)? + r#"<code id="totp-secret">"#.len();
    let end = page[start..].find("</code>")?;
    Some(page[start..start + end].trim().to_string())
}

/// Code an authenticator app would show right now
pub fn current_totp(secret: &str) -> String {
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
    TotpService::new("SGC")
        .code_at(secret, now)
        .unwrap_or_default()
}

/// A six digit code that is not the current one
pub fn wrong_totp(secret: &str) -> String {
    current_totp(secret)
        .chars()
        .map(|c| {
            c.to_digit(10)
                .and_then(|d| char::from_digit((d + 5) % 10, 10))
                .unwrap_or('0')
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_path() {
        assert_eq!(
            link_path("http://sgc.test/auth/reset-password/abc.def"),
            "/auth/reset-password/abc.def"
        );
        assert_eq!(link_path("/already/relative"), "/already/relative");
    }

    #[test]
    fn test_invite_token() {
        assert_eq!(invite_token("http://sgc.test/auth/register?token=tok"), Some("tok"));
        assert_eq!(invite_token("http://sgc.test/auth/register"), None);
    }

    #[test]
    fn test_scrape_totp_secret() {
        let page = r#"<p>Secret: <code id="totp-secret">JBSWY3DPEHPK3PXP</code></p>"#;
        assert_eq!(scrape_totp_secret(page).as_deref(), Some("JBSWY3DPEHPK3PXP"));
    }
}
