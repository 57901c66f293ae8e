//! Browser authentication handlers
//!
//! Form-driven flows on the signed session cookie. Failures never produce a
//! JSON body here: they become a flash message and a `302` back to a form.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use sgc_core::Account;
use sgc_service::dto::{
    BrowserLoginRequest, ChangePasswordRequest, ForgotPasswordRequest, RegisterRequest,
    ResetPasswordRequest, TotpCodeRequest,
};
use sgc_service::services::recovery::{INVALID_RESET_LINK, RESET_PATH};
use sgc_service::{
    safe_next, AuthService, ClientInfo, LoginOutcome, MfaChallenge, MfaService, MfaStage,
    RecoveryService, ServiceError, SignupService,
};
use tracing::{error, warn};

use super::pages;
use crate::extractors::session::Flash;
use crate::extractors::{AuthUser, ClientMeta, FlashKind, Session, Submitted, ValidPath};
use crate::response::found;
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/auth/login";
pub const TOTP_SETUP_PATH: &str = "/auth/totp/setup";
pub const TOTP_VERIFY_PATH: &str = "/auth/totp/verify";
const REGISTER_PATH: &str = "/auth/register";
const FORGOT_PATH: &str = "/auth/forgot-password";
const CHANGE_PASSWORD_PATH: &str = "/auth/change-password";

const PENDING_APPROVAL: &str = "Your account is pending approval";
const MFA_SESSION_EXPIRED: &str = "Your login session expired, please sign in again";
const FORGOT_SENT: &str = "If the account exists, we sent instructions";

type Redirect = (Session, Response);

#[derive(Debug, Deserialize, Default)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Login form; `email` and `username` are accepted for `identifier`
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default, alias = "email", alias = "username")]
    pub identifier: String,
    #[serde(default)]
    pub password: String,
    pub remember: Option<String>,
    pub next: Option<String>,
}

impl LoginForm {
    fn into_request(self) -> BrowserLoginRequest {
        let remember = self.remember.as_deref().is_some_and(is_checked);
        BrowserLoginRequest {
            identifier: self.identifier,
            password: self.password,
            remember,
            next: safe_next(self.next.as_deref()).map(str::to_string),
        }
    }
}

fn is_checked(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "1" | "true" | "yes"
    )
}

fn login_url(next: Option<&str>) -> String {
    safe_next(next).map_or_else(
        || LOGIN_PATH.to_string(),
        |next| format!("{LOGIN_PATH}?next={}", urlencoding::encode(next)),
    )
}

fn register_url(token: Option<&str>) -> String {
    token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map_or_else(
            || REGISTER_PATH.to_string(),
            |t| format!("{REGISTER_PATH}?token={}", urlencoding::encode(t)),
        )
}

fn reset_url(token: &str) -> String {
    format!("{RESET_PATH}/{}", urlencoding::encode(token))
}

/// Flash the error and log anything server-side
fn flash_failure(session: &mut Session, err: &ServiceError) {
    if err.status_code() >= 500 {
        error!(error = %err, "Browser flow failed");
    }
    session.flash(FlashKind::Error, err.user_message());
}

fn page_flash(session: &mut Session, inline: Option<Flash>) -> Option<Flash> {
    session.take_flash().or(inline)
}

// ============================================================================
// Login / logout
// ============================================================================

/// GET /auth/login
pub async fn login_page(
    State(state): State<AppState>,
    mut session: Session,
    Query(query): Query<NextQuery>,
) -> Response {
    if let Some(principal) = session.principal() {
        let service = AuthService::new(state.service_context());
        if let Ok(Some(account)) = service
            .session_account(principal.user_id, principal.issued_at)
            .await
        {
            let landing = safe_next(query.next.as_deref()).unwrap_or_else(|| account.role.default_landing());
            return (session, found(landing)).into_response();
        }
    }

    let flash = session.take_flash();
    let page = pages::login(flash.as_ref(), safe_next(query.next.as_deref()));
    (session, page).into_response()
}

/// Password step
///
/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    ClientMeta(client): ClientMeta,
    Submitted(form): Submitted<LoginForm>,
) -> Redirect {
    let request = form.into_request();
    let next = request.next.clone();

    let service = AuthService::new(state.service_context());
    match service.begin_browser_login(request, &client).await {
        Ok(LoginOutcome::Complete(done)) => {
            session.sign_in(done.account.id, done.remember);
            (session, found(&done.redirect_to))
        }
        Ok(LoginOutcome::MfaSetup(challenge)) => {
            session.begin_mfa(&challenge);
            (session, found(TOTP_SETUP_PATH))
        }
        Ok(LoginOutcome::MfaVerify(challenge)) => {
            session.begin_mfa(&challenge);
            (session, found(TOTP_VERIFY_PATH))
        }
        Err(e) if e.is_not_approved() => {
            session.clear();
            session.flash(FlashKind::Warning, PENDING_APPROVAL);
            (session, found(&login_url(next.as_deref())))
        }
        Err(e) => {
            session.clear();
            flash_failure(&mut session, &e);
            (session, found(&login_url(next.as_deref())))
        }
    }
}

/// GET /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    mut session: Session,
    ClientMeta(client): ClientMeta,
) -> Redirect {
    AuthService::new(state.service_context())
        .browser_logout(session.user_id(), &client)
        .await;
    session.clear();
    session.flash(FlashKind::Info, "You have been signed out");
    (session, found(LOGIN_PATH))
}

// ============================================================================
// Second factor
// ============================================================================

fn stage_path(stage: MfaStage) -> &'static str {
    match stage {
        MfaStage::Setup => TOTP_SETUP_PATH,
        MfaStage::Verify => TOTP_VERIFY_PATH,
    }
}

/// Live MFA challenge opened for `stage`, or where to send the browser
///
/// A challenge for the other stage goes back to its own page; no challenge
/// at all goes back to the login form.
fn require_challenge(session: &mut Session, stage: MfaStage) -> Result<MfaChallenge, &'static str> {
    match session.mfa_challenge() {
        Some(challenge) if challenge.stage == stage => Ok(challenge),
        Some(challenge) => {
            warn!(
                user_id = challenge.user_id,
                expected = ?stage,
                actual = ?challenge.stage,
                "MFA stage mismatch"
            );
            Err(stage_path(challenge.stage))
        }
        None => {
            session.flash(FlashKind::Warning, MFA_SESSION_EXPIRED);
            Err(LOGIN_PATH)
        }
    }
}

/// Finish a login after the second factor, or flash and return to `retry`
async fn finish_mfa_login(
    state: &AppState,
    mut session: Session,
    challenge: &MfaChallenge,
    verified: Result<Account, ServiceError>,
    method: &str,
    client: &ClientInfo,
    retry: &str,
) -> Redirect {
    let account = match verified {
        Ok(account) => account,
        Err(e) => {
            flash_failure(&mut session, &e);
            return (session, found(retry));
        }
    };

    let service = AuthService::new(state.service_context());
    match service
        .complete_login(&account, challenge.next.as_deref(), challenge.remember, method, client)
        .await
    {
        Ok(done) => {
            session.sign_in(done.account.id, done.remember);
            (session, found(&done.redirect_to))
        }
        Err(e) => {
            flash_failure(&mut session, &e);
            (session, found(retry))
        }
    }
}

/// Show the secret to enroll
///
/// GET /auth/totp/setup
pub async fn totp_setup_page(State(state): State<AppState>, mut session: Session) -> Response {
    let challenge = match require_challenge(&mut session, MfaStage::Setup) {
        Ok(challenge) => challenge,
        Err(to) => return (session, found(to)).into_response(),
    };

    let service = MfaService::new(state.service_context());
    match service
        .enrollment(challenge.user_id, session.pending_secret())
        .await
    {
        Ok(enrollment) => {
            session.set_pending_secret(&enrollment.secret);
            let flash = session.take_flash();
            let page = pages::totp_setup(flash.as_ref(), &enrollment.secret, &enrollment.provisioning_uri);
            (session, page).into_response()
        }
        Err(e) => {
            flash_failure(&mut session, &e);
            (session, found(LOGIN_PATH)).into_response()
        }
    }
}

/// Confirm the pending secret with a code, then sign in
///
/// POST /auth/totp/setup
pub async fn totp_setup(
    State(state): State<AppState>,
    mut session: Session,
    ClientMeta(client): ClientMeta,
    Submitted(form): Submitted<TotpCodeRequest>,
) -> Redirect {
    let challenge = match require_challenge(&mut session, MfaStage::Setup) {
        Ok(challenge) => challenge,
        Err(to) => return (session, found(to)),
    };
    let Some(secret) = session.pending_secret().map(str::to_string) else {
        warn!(user_id = challenge.user_id, "TOTP setup posted without a pending secret");
        return (session, found(TOTP_SETUP_PATH));
    };

    let verified = MfaService::new(state.service_context())
        .confirm_enrollment(challenge.user_id, &secret, form.code.trim(), &client)
        .await;
    finish_mfa_login(&state, session, &challenge, verified, "totp_enroll", &client, TOTP_SETUP_PATH).await
}

/// GET /auth/totp/verify
pub async fn totp_verify_page(mut session: Session) -> Response {
    if let Err(to) = require_challenge(&mut session, MfaStage::Verify) {
        return (session, found(to)).into_response();
    }
    let flash = session.take_flash();
    let page = pages::totp_verify(flash.as_ref());
    (session, page).into_response()
}

/// POST /auth/totp/verify
pub async fn totp_verify(
    State(state): State<AppState>,
    mut session: Session,
    ClientMeta(client): ClientMeta,
    Submitted(form): Submitted<TotpCodeRequest>,
) -> Redirect {
    let challenge = match require_challenge(&mut session, MfaStage::Verify) {
        Ok(challenge) => challenge,
        Err(to) => return (session, found(to)),
    };

    let verified = MfaService::new(state.service_context())
        .verify(challenge.user_id, form.code.trim(), &client)
        .await;
    finish_mfa_login(&state, session, &challenge, verified, "totp", &client, TOTP_VERIFY_PATH).await
}

// ============================================================================
// Signup
// ============================================================================

/// GET /auth/register[?token=]
pub async fn register_page(
    State(state): State<AppState>,
    mut session: Session,
    Query(query): Query<TokenQuery>,
) -> Response {
    let ctx = state.service_context();
    if ctx.settings().signup.is_closed() {
        session.flash(FlashKind::Warning, "Signup is closed");
        return (session, found(LOGIN_PATH)).into_response();
    }

    let token = query.token.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let mut inline = None;
    let mut email = None;
    if let Some(token) = token {
        match SignupService::new(ctx).invite_for_token(token).await {
            Ok(Some(invite)) => email = invite.email,
            Ok(None) => {
                inline = Some(Flash {
                    kind: FlashKind::Error,
                    message: "invalid or expired invite".to_string(),
                });
            }
            Err(e) => error!(error = %e, "Invite lookup failed"),
        }
    }

    let flash = page_flash(&mut session, inline);
    let page = pages::register(flash.as_ref(), token, email.as_deref());
    (session, page).into_response()
}

/// POST /auth/register[?token=]
pub async fn register(
    State(state): State<AppState>,
    mut session: Session,
    ClientMeta(client): ClientMeta,
    Query(query): Query<TokenQuery>,
    Submitted(mut request): Submitted<RegisterRequest>,
) -> Redirect {
    let ctx = state.service_context();
    if ctx.settings().signup.is_closed() {
        session.flash(FlashKind::Warning, "Signup is closed");
        return (session, found(LOGIN_PATH));
    }

    let has_form_token = request.token.as_deref().is_some_and(|t| !t.trim().is_empty());
    if !has_form_token {
        request.token = query.token;
    }
    let retry = register_url(request.token.as_deref());

    match SignupService::new(ctx).register(request, &client).await {
        Ok(_) => {
            session.flash(
                FlashKind::Success,
                "Registration received. An administrator must approve your account before you can sign in",
            );
            (session, found(LOGIN_PATH))
        }
        Err(e) => {
            flash_failure(&mut session, &e);
            (session, found(&retry))
        }
    }
}

// ============================================================================
// Recovery
// ============================================================================

/// GET /auth/forgot-password
pub async fn forgot_password_page(mut session: Session) -> Response {
    let flash = session.take_flash();
    let page = pages::forgot_password(flash.as_ref());
    (session, page).into_response()
}

/// Always answers with the same neutral message
///
/// POST /auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    mut session: Session,
    ClientMeta(client): ClientMeta,
    Submitted(request): Submitted<ForgotPasswordRequest>,
) -> Redirect {
    if let Err(e) = RecoveryService::new(state.service_context())
        .forgot_password(request, &client)
        .await
    {
        warn!(error = %e, "Forgot-password request failed");
    }
    session.flash(FlashKind::Info, FORGOT_SENT);
    (session, found(LOGIN_PATH))
}

async fn usable_reset_link(state: &AppState, token: &str) -> bool {
    match RecoveryService::new(state.service_context()).reset_account(token).await {
        Ok(account) => account.is_some(),
        Err(e) => {
            error!(error = %e, "Reset link lookup failed");
            false
        }
    }
}

/// GET /auth/reset-password/{token}
pub async fn reset_password_page(
    State(state): State<AppState>,
    mut session: Session,
    ValidPath(token): ValidPath<String>,
) -> Response {
    if !usable_reset_link(&state, &token).await {
        session.flash(FlashKind::Error, INVALID_RESET_LINK);
        return (session, found(FORGOT_PATH)).into_response();
    }

    let flash = session.take_flash();
    let page = pages::reset_password(flash.as_ref(), &token);
    (session, page).into_response()
}

/// POST /auth/reset-password/{token}
pub async fn reset_password(
    State(state): State<AppState>,
    mut session: Session,
    ClientMeta(client): ClientMeta,
    ValidPath(token): ValidPath<String>,
    Submitted(request): Submitted<ResetPasswordRequest>,
) -> Redirect {
    if !usable_reset_link(&state, &token).await {
        session.flash(FlashKind::Error, INVALID_RESET_LINK);
        return (session, found(FORGOT_PATH));
    }

    let service = RecoveryService::new(state.service_context());
    match service.reset_password(&token, request, &client).await {
        Ok(_) => {
            session.clear();
            session.flash(FlashKind::Success, "Your password was updated, please sign in");
            (session, found(LOGIN_PATH))
        }
        Err(e) => {
            flash_failure(&mut session, &e);
            (session, found(&reset_url(&token)))
        }
    }
}

// ============================================================================
// Change password
// ============================================================================

/// GET /auth/change-password
pub async fn change_password_page(_auth: AuthUser, mut session: Session) -> Response {
    let flash = session.take_flash();
    let page = pages::change_password(flash.as_ref());
    (session, page).into_response()
}

/// POST /auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    mut session: Session,
    ClientMeta(client): ClientMeta,
    Submitted(request): Submitted<ChangePasswordRequest>,
) -> Redirect {
    let service = AuthService::new(state.service_context());
    match service.change_password(auth.user_id, request, &client).await {
        Ok(()) => {
            // Older sessions were just voided; keep this one
            session.renew();
            session.flash(FlashKind::Success, "Your password was changed");
            (session, found(auth.role.default_landing()))
        }
        Err(e) => {
            flash_failure(&mut session, &e);
            (session, found(CHANGE_PASSWORD_PATH))
        }
    }
}
