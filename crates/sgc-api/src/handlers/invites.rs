//! Invite handlers
//!
//! Admin-issued signup tokens.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use sgc_service::dto::{CreateInviteRequest, InviteResponse};
use sgc_service::InviteService;

use crate::extractors::{AdminOnly, ClientMeta, RequireRole, ValidPath, ValidatedJson};
use crate::response::{ApiError, ApiResult, Created, NoContent};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, Default)]
pub struct ListInvitesQuery {
    pub limit: Option<i64>,
}

/// Create an invite
///
/// POST /api/v1/invites
pub async fn create_invite(
    State(state): State<AppState>,
    admin: RequireRole<AdminOnly>,
    ClientMeta(client): ClientMeta,
    ValidatedJson(request): ValidatedJson<CreateInviteRequest>,
) -> ApiResult<Created<Json<InviteResponse>>> {
    let service = InviteService::new(state.service_context());
    let invite = service
        .create(admin.user().account_id(), request, &client)
        .await?;
    Ok(Created(Json(invite)))
}

/// Newest invites first
///
/// GET /api/v1/invites?limit=
pub async fn list_invites(
    State(state): State<AppState>,
    _admin: RequireRole<AdminOnly>,
    query: Result<Query<ListInvitesQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<InviteResponse>>> {
    let Query(query) = query.map_err(|e| ApiError::invalid_query(e.body_text()))?;

    let service = InviteService::new(state.service_context());
    let invites = service
        .list(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(invites))
}

/// DELETE /api/v1/invites/{token}
pub async fn revoke_invite(
    State(state): State<AppState>,
    admin: RequireRole<AdminOnly>,
    ClientMeta(client): ClientMeta,
    ValidPath(token): ValidPath<String>,
) -> ApiResult<NoContent> {
    let service = InviteService::new(state.service_context());
    service
        .revoke(&token, admin.user().account_id(), &client)
        .await?;
    Ok(NoContent)
}
