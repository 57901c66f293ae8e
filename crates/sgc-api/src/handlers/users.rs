//! Account administration handlers
//!
//! Listing, CSV export, approval and credential actions. Admin only.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use sgc_core::{AccountId, Page};
use sgc_service::dto::{
    AccountResponse, ApproveAccountRequest, ForcePasswordChangeRequest, ListAccountsQuery,
    ResetLinkResponse, RevokeSessionsResponse,
};
use sgc_service::AdminService;

use crate::extractors::{
    AdminOnly, ClientMeta, OptionalValidatedJson, RequireRole, ValidPath, ValidatedJson,
};
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

const EXPORT_FILENAME: &str = "users.csv";

fn list_query(query: Result<Query<ListAccountsQuery>, QueryRejection>) -> Result<ListAccountsQuery, ApiError> {
    query
        .map(|Query(q)| q)
        .map_err(|e| ApiError::invalid_query(e.body_text()))
}

/// Paginated account listing
///
/// GET /api/v1/users?status=&q=&page=&per_page=
pub async fn list_users(
    State(state): State<AppState>,
    _admin: RequireRole<AdminOnly>,
    query: Result<Query<ListAccountsQuery>, QueryRejection>,
) -> ApiResult<Json<Page<AccountResponse>>> {
    let service = AdminService::new(state.service_context());
    let page = service.list_accounts(list_query(query)?).await?;
    Ok(Json(page))
}

/// CSV export of the filtered accounts
///
/// GET /api/v1/users/export.csv?status=&q=
pub async fn export_users(
    State(state): State<AppState>,
    _admin: RequireRole<AdminOnly>,
    query: Result<Query<ListAccountsQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let service = AdminService::new(state.service_context());
    let csv = service.export_csv(list_query(query)?).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILENAME}\""),
            ),
        ],
        csv,
    )
        .into_response())
}

/// Approve a pending or rejected account
///
/// PATCH /api/v1/users/{id}/approve
pub async fn approve_user(
    State(state): State<AppState>,
    admin: RequireRole<AdminOnly>,
    ClientMeta(client): ClientMeta,
    ValidPath(id): ValidPath<AccountId>,
    OptionalValidatedJson(request): OptionalValidatedJson<ApproveAccountRequest>,
) -> ApiResult<Json<AccountResponse>> {
    let service = AdminService::new(state.service_context());
    let account = service
        .approve(id, request.unwrap_or_default(), admin.user().account_id(), &client)
        .await?;
    Ok(Json(account))
}

/// PATCH /api/v1/users/{id}/reject
pub async fn reject_user(
    State(state): State<AppState>,
    admin: RequireRole<AdminOnly>,
    ClientMeta(client): ClientMeta,
    ValidPath(id): ValidPath<AccountId>,
) -> ApiResult<Json<AccountResponse>> {
    let service = AdminService::new(state.service_context());
    let account = service.reject(id, admin.user().account_id(), &client).await?;
    Ok(Json(account))
}

/// PATCH /api/v1/users/{id}/force-password-change
pub async fn force_password_change(
    State(state): State<AppState>,
    admin: RequireRole<AdminOnly>,
    ClientMeta(client): ClientMeta,
    ValidPath(id): ValidPath<AccountId>,
    ValidatedJson(request): ValidatedJson<ForcePasswordChangeRequest>,
) -> ApiResult<Json<AccountResponse>> {
    let service = AdminService::new(state.service_context());
    let account = service
        .set_force_change(id, request.value, admin.user().account_id(), &client)
        .await?;
    Ok(Json(account))
}

/// Reset link returned to the admin instead of mailed
///
/// POST /api/v1/users/{id}/reset-link
pub async fn reset_link(
    State(state): State<AppState>,
    admin: RequireRole<AdminOnly>,
    ClientMeta(client): ClientMeta,
    ValidPath(id): ValidPath<AccountId>,
) -> ApiResult<Json<ResetLinkResponse>> {
    let service = AdminService::new(state.service_context());
    let link = service.reset_link(id, admin.user().account_id(), &client).await?;
    Ok(Json(link))
}

/// POST /api/v1/users/{id}/revoke-sessions
pub async fn revoke_sessions(
    State(state): State<AppState>,
    admin: RequireRole<AdminOnly>,
    ClientMeta(client): ClientMeta,
    ValidPath(id): ValidPath<AccountId>,
) -> ApiResult<Json<RevokeSessionsResponse>> {
    let service = AdminService::new(state.service_context());
    let revoked = service
        .revoke_sessions(id, admin.user().account_id(), &client)
        .await?;
    Ok(Json(RevokeSessionsResponse { revoked }))
}
