use axum::http::{header, HeaderMap};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::AppConfig;
use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the admin session signature.
pub const SESSION_COOKIE: &str = "admin_session";

/// Session lifetime (8 hours).
pub const SESSION_MAX_AGE_SECS: u64 = 8 * 60 * 60;

/// Signature stored in the session cookie: HMAC-SHA256 over
/// `"{email}|{password}"` keyed with the deployment secret, hex-encoded.
pub fn session_signature(email: &str, password: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(email.as_bytes());
    mac.update(b"|");
    mac.update(password.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// `Set-Cookie` value establishing an admin session.
pub fn session_cookie(signature: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, signature, SESSION_MAX_AGE_SECS
    )
}

/// `Set-Cookie` value clearing the session.
pub fn expired_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

/// Pull a cookie value out of the `Cookie` header.
fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}

/// Authorization gate consulted before every administrative action.
///
/// With the admin identity unconfigured, nothing validates: every admin
/// request is rejected rather than falling open.
pub fn require_admin(headers: &HeaderMap, config: &AppConfig) -> Result<(), AppError> {
    let (email, password, secret) = match (
        &config.admin_email,
        &config.admin_password,
        &config.admin_secret,
    ) {
        (Some(e), Some(p), Some(s)) => (e, p, s),
        _ => return Err(AppError::Unauthorized),
    };

    let expected = session_signature(email, password, secret);
    match cookie_value(headers, SESSION_COOKIE) {
        Some(cookie) if cookie == expected => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}
