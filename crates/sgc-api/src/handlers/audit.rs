//! Audit log handler

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use sgc_core::AuditEvent;
use sgc_service::dto::AuditListQuery;
use sgc_service::AdminService;

use crate::extractors::{AdminOnly, RequireRole};
use crate::response::{ApiError, ApiResult};
use crate::state::AppState;

/// Recent events, newest first
///
/// GET /api/v1/audit?user_id=&type=&limit=
pub async fn list_events(
    State(state): State<AppState>,
    _admin: RequireRole<AdminOnly>,
    query: Result<Query<AuditListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<AuditEvent>>> {
    let Query(query) = query.map_err(|e| ApiError::invalid_query(e.body_text()))?;

    let service = AdminService::new(state.service_context());
    let events = service.audit_events(query).await?;
    Ok(Json(events))
}
