//! Authorization gate
//!
//! [`AuthUser`] accepts a bearer access token or the signed session cookie.
//! [`RequireRole`] additionally checks the caller's roles against a
//! [`RoleSet`]. With a dev override active both yield a synthetic admin.

use std::marker::PhantomData;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, OriginalUri},
    http::{header, request::Parts, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use sgc_core::{roles_intersect, AccountId, Role};
use sgc_service::AuthService;

use super::session::session_principal;
use crate::response::{found, ApiError};
use crate::state::AppState;

/// Id of the synthetic principal used while security is disabled
pub const DEV_PRINCIPAL_ID: AccountId = 0;

/// How the caller proved who they are
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    Bearer,
    Session,
    DevOverride,
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: AccountId,
    pub email: Option<String>,
    pub role: Role,
    pub source: AuthSource,
}

impl AuthUser {
    fn dev() -> Self {
        Self {
            user_id: DEV_PRINCIPAL_ID,
            email: None,
            role: Role::Admin,
            source: AuthSource::DevOverride,
        }
    }

    pub fn roles(&self) -> [Role; 1] {
        [self.role]
    }

    /// Account id usable as an audit actor; `None` for the dev principal
    pub fn account_id(&self) -> Option<AccountId> {
        (self.source != AuthSource::DevOverride).then_some(self.user_id)
    }
}

/// Why the gate refused the request
#[derive(Debug)]
pub enum AuthRejection {
    /// JSON error for API callers
    Api(ApiError),
    /// Browser callers go to the login page, then back to `next`
    Login { next: String },
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Api(err) => err.into_response(),
            Self::Login { next } => {
                found(&format!("/auth/login?next={}", urlencoding::encode(&next)))
            }
            Self::Forbidden => ApiError::forbidden().into_response(),
        }
    }
}

/// Request URI before any `nest` prefix was stripped
fn original_uri(parts: &Parts) -> &Uri {
    parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0)
}

/// API callers get JSON errors; everyone else is redirected
fn wants_json(parts: &Parts) -> bool {
    if original_uri(parts).path().starts_with("/api/")
        || parts.headers.contains_key(header::AUTHORIZATION)
    {
        return true;
    }
    parts
        .headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

fn unauthenticated(parts: &Parts, err: ApiError) -> AuthRejection {
    if wants_json(parts) {
        AuthRejection::Api(err)
    } else {
        let uri = original_uri(parts);
        let next = uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), ToString::to_string);
        AuthRejection::Login { next }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        if app_state.security_disabled() {
            return Ok(Self::dev());
        }

        // A bearer header is authoritative; no fallback to the cookie
        if parts.headers.contains_key(header::AUTHORIZATION) {
            let TypedHeader(Authorization(bearer)) =
                TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                    .await
                    .map_err(|_| {
                        AuthRejection::Api(ApiError::unauthorized(
                            "invalid authorization header",
                        ))
                    })?;

            let claims = app_state
                .jwt_service()
                .verify_access(bearer.token())
                .ok_or_else(|| {
                    tracing::warn!("Invalid or expired access token");
                    AuthRejection::Api(ApiError::unauthorized("invalid or expired token"))
                })?;
            let user_id = claims.user_id().ok_or_else(|| {
                AuthRejection::Api(ApiError::unauthorized("invalid or expired token"))
            })?;

            return Ok(Self {
                user_id,
                email: claims.email,
                role: claims.role,
                source: AuthSource::Bearer,
            });
        }

        let Some(principal) = session_principal(&parts.headers, app_state.cookie_key()) else {
            return Err(unauthenticated(
                parts,
                ApiError::from(sgc_common::AppError::MissingAuth),
            ));
        };

        let account = AuthService::new(app_state.service_context())
            .session_account(principal.user_id, principal.issued_at)
            .await
            .map_err(|e| AuthRejection::Api(e.into()))?
            .ok_or_else(|| unauthenticated(parts, ApiError::unauthorized("session expired")))?;

        Ok(Self {
            user_id: account.id,
            email: account.email,
            role: account.role,
            source: AuthSource::Session,
        })
    }
}

/// Roles allowed through a [`RequireRole`] gate
pub trait RoleSet: Send + Sync + 'static {
    const ALLOWED: &'static [Role];
}

pub struct AdminOnly;

impl RoleSet for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

/// Authenticated caller holding at least one role of `R`
pub struct RequireRole<R: RoleSet> {
    pub user: AuthUser,
    _roles: PhantomData<R>,
}

impl<R: RoleSet> RequireRole<R> {
    pub fn user(&self) -> &AuthUser {
        &self.user
    }
}

impl<R: RoleSet> std::fmt::Debug for RequireRole<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequireRole")
            .field("user", &self.user)
            .field("allowed", &R::ALLOWED)
            .finish()
    }
}

#[async_trait]
impl<S, R> FromRequestParts<S> for RequireRole<R>
where
    S: Send + Sync,
    AppState: FromRef<S>,
    R: RoleSet,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;

        if user.source != AuthSource::DevOverride && !roles_intersect(&user.roles(), R::ALLOWED) {
            tracing::warn!(user_id = user.user_id, role = %user.role, "Role check failed");
            return Err(AuthRejection::Forbidden);
        }

        Ok(Self {
            user,
            _roles: PhantomData,
        })
    }
}
