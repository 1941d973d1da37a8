//! Authentication endpoints
//!
//! Sign-in opens a server-side session (cookie `portal_session`) and seeds its
//! customer context from the account lookup. Unverified addresses are refused.

use axum::extract::{Json, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{PortalError, PortalResult};
use crate::gate::{session_clear_cookie, session_cookie, session_set_cookie, LOGIN_PATH};
use crate::render::initials;
use crate::server::AppState;
use crate::session::{CustomerContext, Session};

const LOGIN_FAILED: &str = "Chyba přihlášení. Prosím, zkontrolujte email a heslo.";
const REGISTER_FAILED: &str = "Chyba při vytváření účtu. Zkontrolujte zadané údaje.";
const VERIFICATION_FAILED: &str = "Chyba při odesílání ověřovacího e-mailu. Zkuste to znovu.";

lazy_static::lazy_static! {
    static ref EMAIL_PATTERN: Regex = Regex::new(r"\S+@\S+\.\S+").expect("valid e-mail pattern");
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// What the browser learns about its own session.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub email: String,
    pub display_name: Option<String>,
    pub initials: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub context: CustomerContext,
}

impl SessionInfo {
    pub async fn of(session: &Session) -> Self {
        Self {
            email: session.identity.email.clone(),
            display_name: session.identity.display_name.clone(),
            initials: initials(session.identity.display_name.as_deref(), Some(&session.identity.email)),
            expires_at: session.expires_at,
            context: session.context().await,
        }
    }
}

fn message(text: &str) -> Json<serde_json::Value> {
    Json(json!({ "message": text }))
}

/// Make the first account of the lookup the active customer. A failed or
/// empty lookup leaves the context without a customer.
pub async fn adopt_first_account(state: &AppState, session: &Session) {
    match state.api.customers(&session.identity.email).await {
        Ok(accounts) => match accounts.first() {
            Some(account) => {
                session.update_context(|ctx| ctx.select_account(account)).await;
            }
            None => warn!("No customer account for {}", session.identity.email),
        },
        Err(e) => warn!("Customer lookup for {} failed: {:#}", session.identity.email, e),
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(form): Json<Credentials>,
) -> PortalResult<impl IntoResponse> {
    let email = form.email.trim().to_string();
    if !state.login_limiter.check(&email).await {
        warn!("Login rate limit hit for {}", email);
        return Err(PortalError::RateLimited);
    }

    let identity = state.identity.sign_in(&email, &form.password).await.map_err(|e| {
        warn!("Sign-in for {} failed: {:#}", email, e);
        PortalError::Unauthorized(LOGIN_FAILED)
    })?;

    if !identity.email_verified {
        info!("Refusing unverified address {}", email);
        return Err(PortalError::EmailNotVerified);
    }

    state.login_limiter.reset(&email).await;
    let session = state.sessions.create(identity).await;
    adopt_first_account(&state, &session).await;

    let cookie = session_set_cookie(&session.id, state.config.session_ttl);
    Ok(([(header::SET_COOKIE, cookie)], Json(SessionInfo::of(&session).await)))
}

pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<Registration>,
) -> PortalResult<impl IntoResponse> {
    let email = form.email.trim();
    if !is_valid_email(email) {
        return Err(PortalError::Validation("Zadejte platný e-mail!"));
    }
    if form.password != form.confirm_password {
        return Err(PortalError::Validation("Hesla se neshodují!"));
    }

    let display_name = form.display_name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let identity = state
        .identity
        .sign_up(email, &form.password, display_name)
        .await
        .map_err(|e| {
            warn!("Sign-up for {} failed: {:#}", email, e);
            PortalError::Validation(REGISTER_FAILED)
        })?;

    state
        .identity
        .send_email_verification(&identity.id_token)
        .await
        .map_err(|e| {
            warn!("Verification mail for {} failed: {:#}", email, e);
            PortalError::Validation(REGISTER_FAILED)
        })?;

    info!("Account created for {}", email);
    Ok((
        StatusCode::CREATED,
        message("Byl vám odeslán ověřovací e-mail. Před přihlášením jej potvrďte."),
    ))
}

/// Re-send the verification mail. Needs the password again because no
/// session exists for an unverified address.
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(form): Json<Credentials>,
) -> PortalResult<impl IntoResponse> {
    let email = form.email.trim().to_string();
    if !state.login_limiter.check(&email).await {
        return Err(PortalError::RateLimited);
    }

    let identity = state.identity.sign_in(&email, &form.password).await.map_err(|e| {
        warn!("Sign-in for verification of {} failed: {:#}", email, e);
        PortalError::Unauthorized(LOGIN_FAILED)
    })?;

    state
        .identity
        .send_email_verification(&identity.id_token)
        .await
        .map_err(|e| {
            warn!("Verification mail for {} failed: {:#}", email, e);
            PortalError::Upstream(VERIFICATION_FAILED)
        })?;

    Ok(message("Ověřovací e-mail byl znovu odeslán."))
}

pub async fn password_reset(
    State(state): State<AppState>,
    Json(form): Json<ResetRequest>,
) -> PortalResult<impl IntoResponse> {
    let email = form.email.trim();
    if !is_valid_email(email) {
        return Err(PortalError::Validation("Zadejte platný e-mail!"));
    }

    state.identity.send_password_reset(email).await.map_err(|e| {
        warn!("Password reset for {} failed: {:#}", email, e);
        PortalError::Upstream("Chyba při odesílání e-mailu pro obnovení hesla.")
    })?;

    Ok(message("E-mail pro obnovení hesla byl odeslán."))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(id) = session_cookie(&headers) {
        if let Some(session) = state.sessions.remove(&id).await {
            if let Err(e) = state.identity.sign_out(&session.identity).await {
                warn!("Provider sign-out failed: {:#}", e);
            }
            info!("Session closed for {}", session.identity.email);
        }
    }
    ([(header::SET_COOKIE, session_clear_cookie())], Redirect::to(LOGIN_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_pattern_matches_the_form_rule() {
        assert!(is_valid_email("jana@firma.cz"));
        assert!(is_valid_email("a@b.c"));
        assert!(!is_valid_email("jana@firma"));
        assert!(!is_valid_email("jana firma.cz"));
        assert!(!is_valid_email(""));
    }
}
