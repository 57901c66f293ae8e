//! Data transfer objects for API requests and responses
//!
//! This module provides:
//! - Request DTOs with validation for API and form inputs
//! - Response DTOs for serializing API outputs
//! - Mappers for converting domain entities to DTOs

pub mod mappers;
pub mod requests;
pub mod responses;

pub use requests::{
    ApproveAccountRequest, AuditListQuery, BrowserLoginRequest, ChangePasswordRequest,
    CreateInviteRequest, ForcePasswordChangeRequest, ForgotPasswordRequest, ListAccountsQuery,
    LoginRequest, LogoutRequest, RefreshTokenRequest, RegisterRequest, ResetPasswordRequest,
    TotpCodeRequest,
};

pub use responses::{
    AccountResponse, HealthChecks, HealthResponse, InviteResponse, LogoutAllResponse, MeResponse,
    MessageResponse, ReadinessResponse, ResetLinkResponse, RevokeSessionsResponse, TokenPair,
};
