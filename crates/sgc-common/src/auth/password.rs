//! Password hashing and verification utilities
//!
//! New hashes are Argon2id PHC strings. Verification also accepts hashes
//! written by earlier deployments (bcrypt, `pbkdf2:sha256` and `scrypt`
//! digests), detected by prefix. Verification never errors: anything
//! malformed simply fails to match.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AppError;

/// Default iteration count for `pbkdf2:sha256` hashes that omit it
const PBKDF2_DEFAULT_ITERATIONS: u32 = 260_000;

/// Hash schemes recognised by [`verify_password`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashScheme {
    Argon2,
    Bcrypt,
    Pbkdf2Sha256,
    Scrypt,
    Unknown,
}

impl HashScheme {
    /// Detect the scheme from the stored hash prefix
    #[must_use]
    pub fn detect(stored: &str) -> Self {
        if stored.starts_with("$argon2") {
            Self::Argon2
        } else if stored.starts_with("$2a$") || stored.starts_with("$2b$") || stored.starts_with("$2y$") {
            Self::Bcrypt
        } else if stored.starts_with("pbkdf2:sha256") {
            Self::Pbkdf2Sha256
        } else if stored.starts_with("scrypt:") {
            Self::Scrypt
        } else {
            Self::Unknown
        }
    }
}

/// Hash a password using Argon2id
///
/// # Errors
/// Returns an error if hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {e}")))
}

/// Verify a plaintext password against a stored hash of any supported scheme
#[must_use]
pub fn verify_password(stored: &str, plaintext: &str) -> bool {
    if stored.is_empty() || plaintext.is_empty() {
        return false;
    }

    match HashScheme::detect(stored) {
        HashScheme::Argon2 => PasswordHash::new(stored).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok()
        }),
        HashScheme::Bcrypt => bcrypt::verify(plaintext, stored).unwrap_or(false),
        HashScheme::Pbkdf2Sha256 => verify_pbkdf2(stored, plaintext).unwrap_or(false),
        HashScheme::Scrypt => verify_scrypt(stored, plaintext).unwrap_or(false),
        HashScheme::Unknown => false,
    }
}

/// Anything other than Argon2 gets replaced after the next successful login
#[must_use]
pub fn needs_rehash(stored: &str) -> bool {
    HashScheme::detect(stored) != HashScheme::Argon2
}

/// Split `<method>$<salt>$<hex digest>`
fn split_legacy(stored: &str) -> Option<(&str, &str, Vec<u8>)> {
    let (method, rest) = stored.split_once('$')?;
    let (salt, digest) = rest.split_once('$')?;
    let expected = hex::decode(digest).ok()?;
    if expected.is_empty() {
        return None;
    }
    Some((method, salt, expected))
}

// pbkdf2:sha256:<iterations>$<salt>$<hex>
fn verify_pbkdf2(stored: &str, plaintext: &str) -> Option<bool> {
    let (method, salt, expected) = split_legacy(stored)?;
    let mut parts = method.split(':');
    if parts.next()? != "pbkdf2" || parts.next()? != "sha256" {
        return None;
    }
    let iterations = match parts.next() {
        Some(raw) => raw.parse::<u32>().ok().filter(|n| *n > 0)?,
        None => PBKDF2_DEFAULT_ITERATIONS,
    };

    let mut derived = vec![0u8; expected.len()];
    pbkdf2::pbkdf2_hmac::<Sha256>(plaintext.as_bytes(), salt.as_bytes(), iterations, &mut derived);
    Some(derived.ct_eq(&expected).into())
}

// scrypt:<N>:<r>:<p>$<salt>$<hex>
fn verify_scrypt(stored: &str, plaintext: &str) -> Option<bool> {
    let (method, salt, expected) = split_legacy(stored)?;
    let mut parts = method.split(':');
    if parts.next()? != "scrypt" {
        return None;
    }
    let n: u64 = parts.next()?.parse().ok()?;
    let r: u32 = parts.next()?.parse().ok()?;
    let p: u32 = parts.next()?.parse().ok()?;
    if n < 2 || !n.is_power_of_two() {
        return None;
    }

    let log_n = u8::try_from(n.trailing_zeros()).ok()?;
    let params = scrypt::Params::new(log_n, r, p, expected.len()).ok()?;
    let mut derived = vec![0u8; expected.len()];
    scrypt::scrypt(plaintext.as_bytes(), salt.as_bytes(), &params, &mut derived).ok()?;
    Some(derived.ct_eq(&expected).into())
}

/// Password service for dependency injection
///
/// The async variants run the KDF on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct PasswordService;

impl PasswordService {
    /// Create a new password service
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Hash a password
    ///
    /// # Errors
    /// Returns an error if hashing fails
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        hash_password(password)
    }

    #[must_use]
    pub fn verify(&self, stored: &str, plaintext: &str) -> bool {
        verify_password(stored, plaintext)
    }

    /// Hash on the blocking pool
    ///
    /// # Errors
    /// Returns an error if hashing fails or the blocking task is cancelled
    pub async fn hash_async(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(AppError::internal)?
    }

    /// Verify on the blocking pool; a cancelled task counts as a mismatch
    pub async fn verify_async(&self, stored: &str, plaintext: &str) -> bool {
        let stored = stored.to_owned();
        let plaintext = plaintext.to_owned();
        tokio::task::spawn_blocking(move || verify_password(&stored, &plaintext))
            .await
            .unwrap_or(false)
    }
}

/// Hex characters of SHA-256 kept by [`password_fingerprint`]
const FINGERPRINT_LEN: usize = 16;

/// Short digest of a stored hash; changes whenever the password does
#[must_use]
pub fn password_fingerprint(stored: &str) -> String {
    let mut digest = hex::encode(Sha256::digest(stored.as_bytes()));
    digest.truncate(FINGERPRINT_LEN);
    digest
}
