//! Session gate for the grammar endpoints.
//!
//! Session tokens are handed to users as base64 strings. Only the SHA-512 of the decoded
//! token is kept in the configuration, so the config file never holds a usable token.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header::AUTHORIZATION, header::COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use base64::{Engine, prelude::BASE64_STANDARD};
use chrono::{DateTime, Utc};
use cookie::Cookie;
use rand::Rng;
use sha2::{Digest, Sha512};
use tracing::debug;

use crate::{
    AppState,
    config::{AuthConfig, SessionEntry},
    model::session::IssuedSession,
};

pub const SESSION_COOKIE: &str = "session";

/// The user behind an authenticated request, available to handlers as an extension
#[derive(Debug, Clone)]
pub struct SessionUser(pub String);

/// Base64 SHA-512 of a base64 session token, or `None` if the token is not valid base64
pub fn hash_token(token: impl AsRef<[u8]>) -> Option<String> {
    let session_id = BASE64_STANDARD.decode(token).ok()?;
    Some(BASE64_STANDARD.encode(Sha512::digest(session_id)))
}

/// Creates a new random session token along with the hash to store in the configuration
pub fn issue_session() -> IssuedSession {
    let mut token = [0u8; 16];
    rand::rng().fill(&mut token);

    IssuedSession {
        session_token: BASE64_STANDARD.encode(token),
        token_hash: BASE64_STANDARD.encode(Sha512::digest(token)),
    }
}

/// Finds the configured session matching `token`, provided it has not expired at `now`
pub fn authenticate<'a>(
    auth: &'a AuthConfig,
    token: &str,
    now: DateTime<Utc>,
) -> Option<&'a SessionEntry> {
    let hash = hash_token(token.trim())?;

    auth.sessions
        .iter()
        .find(|s| hashes_match(&s.token_hash, &hash))
        .filter(|s| s.expires.is_none_or(|expiration| now <= expiration))
}

/// Compares two hashes without stopping at the first differing byte
fn hashes_match(configured: &str, presented: &str) -> bool {
    configured.len() == presented.len()
        && configured
            .bytes()
            .zip(presented.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

/// Reads the session token from the `Authorization` header, or failing that the session cookie
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.strip_prefix("Bearer ").unwrap_or(h).trim().to_owned())
        .filter(|t| !t.is_empty());

    from_header.or_else(|| {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|h| h.to_str().ok())
            .flat_map(|raw| Cookie::split_parse(raw).filter_map(Result::ok))
            .find(|c| c.name() == SESSION_COOKIE)
            .map(|c| c.value().to_owned())
    })
}

/// Lets requests with a live session through; everyone else is redirected to the login page.
pub async fn handle_session_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let session = session_token(request.headers())
        .and_then(|token| authenticate(&state.auth, &token, Utc::now()));

    let Some(session) = session else {
        debug!("Unauthenticated request to {}", request.uri().path());
        return Redirect::to(&state.auth.login_url).into_response();
    };

    request
        .extensions_mut()
        .insert(SessionUser(session.user.clone()));
    next.run(request).await
}
