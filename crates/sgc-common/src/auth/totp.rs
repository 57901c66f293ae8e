//! TOTP second factor (RFC 6238: SHA-1, 6 digits, 30 second step)

use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::AppError;

const DIGITS: usize = 6;
const STEP_SECS: u64 = 30;

/// Steps tolerated either side of the current one
pub const DEFAULT_WINDOW: u8 = 1;

/// TOTP helper bound to an issuer name
#[derive(Debug, Clone)]
pub struct TotpService {
    issuer: String,
}

impl TotpService {
    #[must_use]
    pub fn new(issuer: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Fresh 160-bit secret, base32 encoded
    ///
    /// # Errors
    /// Returns an error if the random secret cannot be encoded
    pub fn generate_secret(&self) -> Result<String, AppError> {
        match Secret::generate_secret().to_encoded() {
            Secret::Encoded(encoded) => Ok(encoded),
            Secret::Raw(_) => Err(AppError::Internal(anyhow::anyhow!(
                "TOTP secret could not be base32 encoded"
            ))),
        }
    }

    fn build(&self, secret_b32: &str, identifier: &str, window: u8) -> Option<TOTP> {
        let normalized: String = secret_b32
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        let bytes = Secret::Encoded(normalized).to_bytes().ok()?;
        if bytes.is_empty() {
            return None;
        }
        Some(TOTP::new_unchecked(
            Algorithm::SHA1,
            DIGITS,
            window,
            STEP_SECS,
            bytes,
            Some(self.issuer.clone()),
            identifier.to_string(),
        ))
    }

    /// `otpauth://totp/...` URI for authenticator apps
    ///
    /// # Errors
    /// Returns a validation error for a secret that is not valid base32
    pub fn provisioning_uri(&self, secret_b32: &str, identifier: &str) -> Result<String, AppError> {
        self.build(secret_b32, identifier, DEFAULT_WINDOW)
            .map(|totp| totp.get_url())
            .ok_or_else(|| AppError::validation("invalid TOTP secret"))
    }

    /// Check a code at the current time
    #[must_use]
    pub fn verify(&self, secret_b32: &str, code: &str, window: u8) -> bool {
        let Ok(now) = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) else {
            return false;
        };
        self.verify_at(secret_b32, code, window, now.as_secs())
    }

    /// Check a code at an explicit Unix time
    #[must_use]
    pub fn verify_at(&self, secret_b32: &str, code: &str, window: u8, unix_time: u64) -> bool {
        let code: String = code.chars().filter(|c| !c.is_whitespace()).collect();
        if code.len() != DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        self.build(secret_b32, "", window)
            .is_some_and(|totp| totp.check(&code, unix_time))
    }

    /// Code valid at `unix_time` (used by the CLI and tests)
    #[must_use]
    pub fn code_at(&self, secret_b32: &str, unix_time: u64) -> Option<String> {
        self.build(secret_b32, "", 0).map(|totp| totp.generate(unix_time))
    }
}
