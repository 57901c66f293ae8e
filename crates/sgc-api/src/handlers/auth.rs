//! JSON authentication handlers
//!
//! Token login, refresh rotation, logout and the current principal.

use axum::{extract::State, http::HeaderMap, Json};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use sgc_service::dto::{
    LoginRequest, LogoutAllResponse, LogoutRequest, MeResponse, MessageResponse,
    RefreshTokenRequest, TokenPair,
};
use sgc_service::{AuthService, ServiceError};

use crate::extractors::{AuthUser, ClientMeta, ValidatedJson};
use crate::response::ApiResult;
use crate::state::AppState;

/// Token from the body, else from `Authorization: Bearer`
fn body_or_bearer(body: Option<String>, headers: &HeaderMap) -> Option<String> {
    body.map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            headers
                .typed_get::<Authorization<Bearer>>()
                .map(|Authorization(bearer)| bearer.token().to_string())
        })
}

/// Login with email (or username) and password
///
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    let service = AuthService::new(state.service_context());
    let pair = service.api_login(request, &client).await?;
    Ok(Json(pair))
}

/// Current principal
///
/// GET /api/v1/auth/me
pub async fn me(auth: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: auth.user_id,
        email: auth.email,
        role: auth.role,
    })
}

/// Rotate a refresh token
///
/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    headers: HeaderMap,
    body: Option<Json<RefreshTokenRequest>>,
) -> ApiResult<Json<TokenPair>> {
    let token = body_or_bearer(body.and_then(|Json(b)| b.refresh_token), &headers)
        .ok_or_else(|| ServiceError::validation("refresh_token is required"))?;

    let service = AuthService::new(state.service_context());
    let pair = service.refresh(&token, &client).await?;
    Ok(Json(pair))
}

/// Revoke one refresh token
///
/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> ApiResult<Json<MessageResponse>> {
    let token = body_or_bearer(body.and_then(|Json(b)| b.refresh_token), &headers);

    let service = AuthService::new(state.service_context());
    service.logout(token.as_deref(), &client).await?;
    Ok(Json(MessageResponse::new("logged out")))
}

/// Revoke every refresh token of the caller
///
/// POST /api/v1/auth/logout_all
pub async fn logout_all(
    State(state): State<AppState>,
    ClientMeta(client): ClientMeta,
    auth: AuthUser,
) -> ApiResult<Json<LogoutAllResponse>> {
    let service = AuthService::new(state.service_context());
    let revoked = service.logout_all(auth.user_id, &client).await?;
    Ok(Json(LogoutAllResponse { revoked }))
}
