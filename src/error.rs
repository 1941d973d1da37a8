//! Portal errors
//!
//! Every failure a browser can see collapses into one flat, localized message.
//! Internal detail stays in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum PortalError {
    /// Upstream call failed; carries the user-facing message for that view
    #[error("{0}")]
    Upstream(&'static str),

    #[error("Neplatný požadavek: {0}")]
    BadRequest(String),

    /// Input rejected with a message meant for the form
    #[error("{0}")]
    Validation(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    /// Signed in, but the e-mail address is not verified yet
    #[error("Váš e-mail není ověřen! Zkontrolujte svou e-mailovou schránku.")]
    EmailNotVerified,

    /// Resource outside what the active customer may touch
    #[error("K tomuto souboru nemáte přístup.")]
    Forbidden,

    #[error("Příliš mnoho pokusů o přihlášení. Zkuste to prosím později.")]
    RateLimited,

    #[error("ZakaznikId není dostupné.")]
    MissingContext,

    #[error("Interní chyba serveru.")]
    Internal(#[from] anyhow::Error),
}

impl PortalError {
    pub fn status(&self) -> StatusCode {
        match self {
            PortalError::Upstream(_) => StatusCode::BAD_GATEWAY,
            PortalError::BadRequest(_) | PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            PortalError::EmailNotVerified | PortalError::Forbidden => StatusCode::FORBIDDEN,
            PortalError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            PortalError::MissingContext => StatusCode::CONFLICT,
            PortalError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        if let PortalError::Internal(ref e) = self {
            error!("Internal portal error: {:#}", e);
        }

        let mut body = serde_json::json!({ "error": self.to_string() });
        if matches!(self, PortalError::EmailNotVerified) {
            body["verification_required"] = serde_json::Value::Bool(true);
        }

        (self.status(), Json(body)).into_response()
    }
}

pub type PortalResult<T> = Result<T, PortalError>;
