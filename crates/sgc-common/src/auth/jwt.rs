//! JWT utilities for API authentication
//!
//! Access and refresh tokens share one HS256 key. Refresh tokens carry a
//! `jti` that the server-side registry tracks for revocation and rotation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sgc_core::{Account, AccountId, Role};
use uuid::Uuid;

use crate::error::AppError;

/// Token type claim (`typ`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (stringified account id)
    pub sub: String,
    pub email: Option<String>,
    pub role: Role,
    /// Present on refresh tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Missing `typ` is rejected at verification
    #[serde(default)]
    pub typ: Option<TokenType>,
}

impl Claims {
    /// Account id parsed from `sub`
    #[must_use]
    pub fn user_id(&self) -> Option<AccountId> {
        self.sub.parse().ok()
    }

    #[must_use]
    pub fn is_access_token(&self) -> bool {
        self.typ == Some(TokenType::Access)
    }

    #[must_use]
    pub fn is_refresh_token(&self) -> bool {
        self.typ == Some(TokenType::Refresh)
    }
}

/// Identity embedded in minted tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: AccountId,
    pub email: Option<String>,
    pub role: Role,
}

impl From<&Account> for TokenSubject {
    fn from(account: &Account) -> Self {
        Self {
            user_id: account.id,
            email: account.email.clone(),
            role: account.role,
        }
    }
}

/// Token pair returned to API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// A freshly minted pair plus what the refresh registry must record
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub pair: TokenPair,
    pub jti: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// JWT service for encoding and decoding tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

impl JwtService {
    /// Create a new JWT service with the given secret and expiry times
    #[must_use]
    pub fn new(secret: &str, access_token_expiry: i64, refresh_token_expiry: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expiry,
            refresh_token_expiry,
        }
    }

    #[must_use]
    pub fn refresh_token_expiry(&self) -> i64 {
        self.refresh_token_expiry
    }

    /// Mint an access + refresh pair with a fresh `jti`
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn generate_token_pair(&self, subject: &TokenSubject) -> Result<IssuedTokens, AppError> {
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();
        let refresh_expires_at = now + Duration::seconds(self.refresh_token_expiry);

        let access_token = self.encode_claims(&Claims {
            sub: subject.user_id.to_string(),
            email: subject.email.clone(),
            role: subject.role,
            jti: None,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            typ: Some(TokenType::Access),
        })?;
        let refresh_token = self.encode_claims(&Claims {
            sub: subject.user_id.to_string(),
            email: subject.email.clone(),
            role: subject.role,
            jti: Some(jti.clone()),
            iat: now.timestamp(),
            exp: refresh_expires_at.timestamp(),
            typ: Some(TokenType::Refresh),
        })?;

        Ok(IssuedTokens {
            pair: TokenPair {
                access_token,
                refresh_token,
                token_type: "bearer".to_string(),
                expires_in: self.access_token_expiry,
            },
            jti,
            refresh_expires_at,
        })
    }

    /// Encode arbitrary claims with the service key
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn encode_claims(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to encode JWT")))
    }

    /// Signature and `exp` check only; `None` on any failure
    #[must_use]
    pub fn decode_token(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Signature check only; expired tokens still decode
    #[must_use]
    pub fn decode_ignoring_expiry(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &self.decoding_key, &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Claims of a valid access token
    #[must_use]
    pub fn verify_access(&self, token: &str) -> Option<Claims> {
        self.decode_token(token)
            .filter(|claims| claims.is_access_token() && claims.user_id().is_some())
    }

    /// Claims of a valid refresh token carrying a `jti`
    #[must_use]
    pub fn verify_refresh(&self, token: &str) -> Option<Claims> {
        self.decode_token(token).filter(|claims| {
            claims.is_refresh_token()
                && claims.user_id().is_some()
                && claims.jti.as_deref().is_some_and(|jti| !jti.is_empty())
        })
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .finish_non_exhaustive()
    }
}
