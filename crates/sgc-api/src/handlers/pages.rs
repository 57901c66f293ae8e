//! Minimal HTML for the browser auth routes
//!
//! Pages are plain forms; every dynamic value goes through [`escape`].

use axum::response::Html;

use crate::extractors::session::Flash;

/// Escape text for HTML bodies and attribute values
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

fn layout(title: &str, flash: Option<&Flash>, body: &str) -> Html<String> {
    let flash = flash.map_or_else(String::new, |f| {
        format!(
            r#"<p class="flash flash-{}" role="alert">{}</p>"#,
            f.kind.as_str(),
            escape(&f.message)
        )
    });
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head><meta charset="utf-8"><title>{title} - SGC</title></head>
<body>
<main>
<h1>{title}</h1>
{flash}
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    ))
}

fn hidden(name: &str, value: Option<&str>) -> String {
    value.map_or_else(String::new, |v| {
        format!(r#"<input type="hidden" name="{name}" value="{}">"#, escape(v))
    })
}

pub fn login(flash: Option<&Flash>, next: Option<&str>) -> Html<String> {
    let body = format!(
        r#"<form method="post" action="/auth/login">
<label>Email or username <input name="identifier" autocomplete="username" required></label>
<label>Password <input type="password" name="password" autocomplete="current-password" required></label>
<label><input type="checkbox" name="remember" value="on"> Remember me</label>
{next}
<button type="submit">Sign in</button>
</form>
<p><a href="/auth/forgot-password">Forgot your password?</a> <a href="/auth/register">Create an account</a></p>"#,
        next = hidden("next", next),
    );
    layout("Sign in", flash, &body)
}

pub fn register(flash: Option<&Flash>, token: Option<&str>, email: Option<&str>) -> Html<String> {
    let action = token.map_or_else(
        || "/auth/register".to_string(),
        |t| format!("/auth/register?token={}", urlencoding::encode(t)),
    );
    let body = format!(
        r#"<form method="post" action="{action}">
<label>Username <input name="username" required></label>
<label>Email <input type="email" name="email" value="{email}" required></label>
<label>Password <input type="password" name="password" autocomplete="new-password" required></label>
<label>Confirm password <input type="password" name="confirm" autocomplete="new-password" required></label>
{token}
<button type="submit">Register</button>
</form>"#,
        action = escape(&action),
        email = escape(email.unwrap_or_default()),
        token = hidden("token", token),
    );
    layout("Create an account", flash, &body)
}

pub fn forgot_password(flash: Option<&Flash>) -> Html<String> {
    let body = r#"<form method="post" action="/auth/forgot-password">
<label>Email <input type="email" name="email" required></label>
<button type="submit">Send reset link</button>
</form>"#;
    layout("Reset your password", flash, body)
}

pub fn reset_password(flash: Option<&Flash>, token: &str) -> Html<String> {
    let body = format!(
        r#"<form method="post" action="/auth/reset-password/{token}">
<label>New password <input type="password" name="new" autocomplete="new-password" required></label>
<label>Confirm password <input type="password" name="confirm" autocomplete="new-password" required></label>
<button type="submit">Set password</button>
</form>"#,
        token = escape(&urlencoding::encode(token)),
    );
    layout("Choose a new password", flash, &body)
}

pub fn change_password(flash: Option<&Flash>) -> Html<String> {
    let body = r#"<form method="post" action="/auth/change-password">
<label>Current password <input type="password" name="current" autocomplete="current-password" required></label>
<label>New password <input type="password" name="new" autocomplete="new-password" required></label>
<label>Confirm password <input type="password" name="confirm" autocomplete="new-password" required></label>
<button type="submit">Change password</button>
</form>"#;
    layout("Change password", flash, body)
}

pub fn totp_setup(flash: Option<&Flash>, secret: &str, provisioning_uri: &str) -> Html<String> {
    let body = format!(
        r#"<p>Add this key to your authenticator app, then enter the 6-digit code it shows.</p>
<p>Key: <code id="totp-secret">{secret}</code></p>
<p><a id="totp-uri" href="{uri}">{uri}</a></p>
<form method="post" action="/auth/totp/setup">
<label>Code <input name="code" inputmode="numeric" autocomplete="one-time-code" required></label>
<button type="submit">Verify</button>
</form>"#,
        secret = escape(secret),
        uri = escape(provisioning_uri),
    );
    layout("Set up two-factor authentication", flash, &body)
}

pub fn totp_verify(flash: Option<&Flash>) -> Html<String> {
    let body = r#"<form method="post" action="/auth/totp/verify">
<label>Code <input name="code" inputmode="numeric" autocomplete="one-time-code" required></label>
<button type="submit">Verify</button>
</form>"#;
    layout("Two-factor authentication", flash, body)
}
