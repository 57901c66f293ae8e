//! Credentials and tokens

mod jwt;
mod password;
mod signed_token;
mod totp;

pub use jwt::{Claims, IssuedTokens, JwtService, TokenPair, TokenSubject, TokenType};
pub use password::{
    hash_password, needs_rehash, password_fingerprint, verify_password, HashScheme, PasswordService,
};
pub use signed_token::{purpose, SignedTokenService};
pub use totp::{TotpService, DEFAULT_WINDOW};
