//! Time-scoped signed payloads for password reset and invite links
//!
//! Tokens are compact HS256 JWS strings. Each purpose signs with its own key,
//! derived from the server secret and password salt, so a token minted for
//! one purpose never verifies under another.

use std::collections::HashSet;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Signing namespaces
pub mod purpose {
    pub const PASSWORD_RESET: &str = "password-reset";
    pub const INVITE: &str = "invite";
}

/// Future `iat` tolerated for clock drift between nodes
const MAX_CLOCK_SKEW_SECS: i64 = 30;

#[derive(Debug, Serialize, Deserialize)]
struct SignedClaims {
    data: String,
    pur: String,
    iat: i64,
}

/// Issues and parses purpose-scoped signed tokens
#[derive(Clone)]
pub struct SignedTokenService {
    secret: String,
    salt: String,
}

impl SignedTokenService {
    #[must_use]
    pub fn new(secret: &str, salt: &str) -> Self {
        Self {
            secret: secret.to_string(),
            salt: salt.to_string(),
        }
    }

    fn key_material(&self, purpose: &str) -> Vec<u8> {
        Sha256::new()
            .chain_update(self.secret.as_bytes())
            .chain_update([0u8])
            .chain_update(self.salt.as_bytes())
            .chain_update([0u8])
            .chain_update(purpose.as_bytes())
            .finalize()
            .to_vec()
    }

    /// Sign `payload` for `purpose`, stamped with the current time
    ///
    /// # Errors
    /// Returns an error if encoding fails
    pub fn issue(&self, payload: &str, purpose: &str) -> Result<String, AppError> {
        self.issue_at(payload, purpose, Utc::now().timestamp())
    }

    /// Sign with an explicit issue time
    ///
    /// # Errors
    /// Returns an error if encoding fails
    pub fn issue_at(&self, payload: &str, purpose: &str, iat: i64) -> Result<String, AppError> {
        let claims = SignedClaims {
            data: payload.to_string(),
            pur: purpose.to_string(),
            iat,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.key_material(purpose)),
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign token: {e}")))
    }

    /// Payload when the signature, purpose and age all check out
    #[must_use]
    pub fn parse(&self, token: &str, purpose: &str, max_age_secs: i64) -> Option<String> {
        self.parse_at(token, purpose, max_age_secs, Utc::now().timestamp())
    }

    /// [`Self::parse`] against an explicit clock
    #[must_use]
    pub fn parse_at(&self, token: &str, purpose: &str, max_age_secs: i64, now: i64) -> Option<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();
        validation.leeway = 0;

        let data = decode::<SignedClaims>(
            token,
            &DecodingKey::from_secret(&self.key_material(purpose)),
            &validation,
        )
        .ok()?
        .claims;

        if data.pur != purpose {
            return None;
        }
        let age = now - data.iat;
        if age > max_age_secs || age < -MAX_CLOCK_SKEW_SECS {
            return None;
        }
        Some(data.data)
    }
}

impl std::fmt::Debug for SignedTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedTokenService").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SignedTokenService {
        SignedTokenService::new("test-secret-key-that-is-long-enough", "salt")
    }

    #[test]
    fn test_issue_and_parse() {
        let svc = service();
        let token = svc.issue("user@x.com", purpose::PASSWORD_RESET).unwrap();
        assert_eq!(
            svc.parse(&token, purpose::PASSWORD_RESET, 1800).as_deref(),
            Some("user@x.com")
        );
        assert!(token.len() < 200);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')));
    }

    #[test]
    fn test_expired_token() {
        let svc = service();
        let now = Utc::now().timestamp();
        let token = svc.issue_at("user@x.com", purpose::PASSWORD_RESET, now - 1801).unwrap();
        assert!(svc.parse_at(&token, purpose::PASSWORD_RESET, 1800, now).is_none());
        assert!(svc.parse_at(&token, purpose::PASSWORD_RESET, 1900, now).is_some());
    }

    #[test]
    fn test_tampered_token() {
        let svc = service();
        let token = svc.issue("user@x.com", purpose::PASSWORD_RESET).unwrap();

        let mut bytes = token.into_bytes();
        let idx = bytes.len() - 3;
        bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(svc.parse(&tampered, purpose::PASSWORD_RESET, 1800).is_none());
    }

    #[test]
    fn test_purposes_are_independent() {
        let svc = service();
        let token = svc.issue("user@x.com", purpose::INVITE).unwrap();
        assert!(svc.parse(&token, purpose::PASSWORD_RESET, 1800).is_none());
        assert!(svc.parse(&token, purpose::INVITE, 1800).is_some());
    }

    #[test]
    fn test_different_salt_rejects() {
        let token = service().issue("user@x.com", purpose::PASSWORD_RESET).unwrap();
        let other = SignedTokenService::new("test-secret-key-that-is-long-enough", "pepper");
        assert!(other.parse(&token, purpose::PASSWORD_RESET, 1800).is_none());
    }

    #[test]
    fn test_garbage() {
        assert!(service().parse("not-a-token", purpose::INVITE, 60).is_none());
    }
}
