//! HTML shells
//!
//! The portal UI is a browser application; the server only hands out the
//! page shells it mounts into, plus the two error pages.

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json};
use serde_json::json;

use crate::render::initials;
use crate::server::AppState;
use crate::session::Session;

fn shell(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="cs">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title} | Derator portál</title>
</head>
<body>
{body}
</body>
</html>"#,
        title = html_escape::encode_text(title),
        body = body
    ))
}

pub async fn login_page() -> Html<String> {
    shell("Přihlášení", r#"    <main id="app" data-page="login"></main>"#)
}

pub async fn register_page() -> Html<String> {
    shell("Registrace", r#"    <main id="app" data-page="register"></main>"#)
}

pub async fn not_found_page() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        shell("404", "    <main><h1>404</h1><p>Stránka nebyla nalezena.</p></main>"),
    )
}

pub async fn server_error_page() -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        shell("500", "    <main><h1>500</h1><p>Na serveru došlo k chybě.</p></main>"),
    )
}

/// Landing page of a signed-in user.
pub async fn index(Extension(session): Extension<Arc<Session>>) -> Html<String> {
    let ctx = session.context().await;
    let email = session.identity.email.as_str();
    let body = format!(
        r#"    <header>
        <span class="customer">{customer}</span>
        <span class="avatar" title="{email}">{initials}</span>
    </header>
    <main id="app" data-page="dashboard"></main>"#,
        customer = html_escape::encode_text(ctx.customer_name.as_deref().unwrap_or("")),
        email = html_escape::encode_double_quoted_attribute(email),
        initials = html_escape::encode_text(&initials(session.identity.display_name.as_deref(), Some(email))),
    );
    shell("Přehled", &body)
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.sessions.len().await,
    }))
}
