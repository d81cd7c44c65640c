/*
 * Responsibility
 * - GET /api/v1/authorize (forward-auth subrequest from the reverse proxy)
 * - Forwarded headers / cookies -> AuthorizeCommand
 * - AuthEvent -> HTTP response (307 + nonce cookie / 200 + user-info headers / 403 / 500)
 */
use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::error::AppError;
use crate::services::authorize::{AuthEvent, AuthorizeCommand};
use crate::state::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "ACCESS_TOKEN";
pub const ID_TOKEN_COOKIE: &str = "JWT_ID_TOKEN";
pub const NONCE_COOKIE: &str = "AUTH_NONCE";

pub const USERINFO_HEADER_PREFIX: &str = "x-forwardauth-";

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const FORWARDED_HOST: &str = "x-forwarded-host";
const FORWARDED_URI: &str = "x-forwarded-uri";
const FORWARDED_METHOD: &str = "x-forwarded-method";

pub async fn authorize(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let command = build_command(&headers, &jar)?;

    let principal = state.resolver.resolve(&command);
    let event = state.authorize.handle(&principal, &command);

    respond(event, &command, jar)
}

fn build_command(headers: &HeaderMap, jar: &CookieJar) -> Result<AuthorizeCommand, AppError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token);

    let is_api = bearer.is_some() || accepts_json(headers) || is_xhr(headers);

    let access_token = bearer.or_else(|| cookie_value(jar, ACCESS_TOKEN_COOKIE));
    let id_token = cookie_value(jar, ID_TOKEN_COOKIE);

    Ok(AuthorizeCommand {
        access_token,
        id_token,
        protocol: forwarded(headers, FORWARDED_PROTO)?,
        host: forwarded(headers, FORWARDED_HOST)?,
        uri: forwarded(headers, FORWARDED_URI)?,
        method: forwarded(headers, FORWARDED_METHOD)?,
        is_api,
    })
}

// Auth scheme is case-insensitive (RFC 7235).
fn bearer_token(value: &str) -> Option<String> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn forwarded(headers: &HeaderMap, name: &'static str) -> Result<String, AppError> {
    let value = headers
        .get(name)
        .ok_or_else(|| AppError::bad_request("MISSING_FORWARDED_HEADER", format!("missing {}", name)))?;

    value
        .to_str()
        .map(str::to_string)
        .map_err(|_| AppError::bad_request("INVALID_FORWARDED_HEADER", format!("invalid {}", name)))
}

fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

fn is_xhr(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

fn respond(event: AuthEvent, command: &AuthorizeCommand, jar: CookieJar) -> Result<Response, AppError> {
    match event {
        AuthEvent::NeedRedirect {
            authorize_url,
            nonce,
            cookie_domain,
        } => {
            let cookie = Cookie::build((NONCE_COOKIE, nonce.value().to_string()))
                .domain(cookie_domain)
                .path("/")
                .http_only(true)
                .secure(command.protocol.eq_ignore_ascii_case("https"))
                .same_site(SameSite::Lax);

            Ok((
                StatusCode::TEMPORARY_REDIRECT,
                [(header::LOCATION, authorize_url.to_string())],
                jar.add(cookie),
            )
                .into_response())
        }
        AuthEvent::AccessGranted { userinfo } => {
            let mut headers = HeaderMap::new();
            for (claim, value) in userinfo {
                match (userinfo_header_name(&claim), HeaderValue::from_str(&value)) {
                    (Ok(name), Ok(value)) => {
                        headers.insert(name, value);
                    }
                    _ => tracing::warn!(claim = %claim, "claim value not representable as header"),
                }
            }
            Ok((StatusCode::OK, headers).into_response())
        }
        AuthEvent::AccessDenied => Err(AppError::AccessDenied),
        AuthEvent::Error { reason } => {
            tracing::error!(reason = %reason, host = %command.host, "authorization failed");
            Err(AppError::Internal)
        }
    }
}

/// `x-forwardauth-<claim>`, lowercased; bytes outside the header token set
/// become `-` (`https://example.com/roles` -> `x-forwardauth-https---example.com-roles`).
fn userinfo_header_name(claim: &str) -> Result<HeaderName, axum::http::header::InvalidHeaderName> {
    let sanitized: String = claim
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9') => c,
            c @ ('!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~') => c,
            _ => '-',
        })
        .collect();
    HeaderName::from_bytes(format!("{}{}", USERINFO_HEADER_PREFIX, sanitized).as_bytes())
}
