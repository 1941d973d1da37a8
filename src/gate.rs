//! Auth Gate
//!
//! Every request passes through `require_session`. Public paths go through
//! untouched; anything else needs a live session cookie or is redirected to
//! the login page. The decision itself is the pure `route_access`.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::debug;

use crate::server::AppState;

pub const SESSION_COOKIE: &str = "portal_session";
pub const LOGIN_PATH: &str = "/login";

const PUBLIC_PATHS: [&str; 5] = ["/login", "/register", "/404", "/500", "/health"];
const PUBLIC_PREFIXES: [&str; 1] = ["/auth/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    RedirectToLogin,
}

pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Public paths are always reachable (an authenticated user may still open
/// `/login`); everything else requires a session.
pub fn route_access(path: &str, authenticated: bool) -> Access {
    if authenticated || is_public(path) {
        Access::Allow
    } else {
        Access::RedirectToLogin
    }
}

/// Value of the session cookie, if the request carries one.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_set_cookie(session_id: &str, ttl: Duration) -> HeaderValue {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        session_id,
        ttl.as_secs()
    );
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| session_clear_cookie())
}

pub fn session_clear_cookie() -> HeaderValue {
    HeaderValue::from_static("portal_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

pub async fn require_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let session = match session_cookie(request.headers()) {
        Some(id) => state.sessions.get(&id).await,
        None => None,
    };

    let path = request.uri().path().to_string();
    match route_access(&path, session.is_some()) {
        Access::Allow => {
            if let Some(session) = session {
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        Access::RedirectToLogin => {
            debug!("No session for {}, redirecting to login", path);
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}
