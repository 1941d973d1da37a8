//! Portal HTTP server
//!
//! Wires the collaborators into shared state, mounts every route behind the
//! auth gate and serves until Ctrl+C / SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::PortalConfig;
use crate::gate;
use crate::services::{auth, context, documents, nonconformity, pages, records};
use crate::session::{FirebaseIdentity, IdentityProvider, SessionStore};
use crate::upstream::{InvoiceSource, InvoicingClient, PortalApi, RestClient};
use crate::utils::RateLimiter;
use crate::views::Sources;

/// Remediation photos straight from a phone camera.
const UPLOAD_LIMIT_BYTES: usize = 16 * 1024 * 1024;
const PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PortalConfig>,
    pub api: Arc<dyn PortalApi>,
    pub identity: Arc<dyn IdentityProvider>,
    pub invoices: Arc<dyn InvoiceSource>,
    pub sessions: Arc<SessionStore>,
    pub login_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: PortalConfig,
        api: Arc<dyn PortalApi>,
        identity: Arc<dyn IdentityProvider>,
        invoices: Arc<dyn InvoiceSource>,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new(config.session_ttl)),
            login_limiter: Arc::new(RateLimiter::for_logins()),
            config: Arc::new(config),
            api,
            identity,
            invoices,
        }
    }

    /// State backed by the real upstream clients.
    pub fn from_config(config: PortalConfig) -> Result<Self> {
        let api = Arc::new(RestClient::new(&config)?);
        let identity = Arc::new(FirebaseIdentity::new(&config)?);
        let invoices = Arc::new(InvoicingClient::new(&config)?);
        Ok(Self::new(config, api, identity, invoices))
    }

    pub fn sources(&self) -> Sources {
        Sources {
            api: self.api.clone(),
            invoices: self.invoices.clone(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // public
        .route("/login", get(pages::login_page))
        .route("/register", get(pages::register_page))
        .route("/404", get(pages::not_found_page))
        .route("/500", get(pages::server_error_page))
        .route("/health", get(pages::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/password-reset", post(auth::password_reset))
        .route("/auth/verification", post(auth::resend_verification))
        .route("/auth/logout", post(auth::logout))
        // session required
        .route("/", get(pages::index))
        .route("/api/session", get(context::session_info))
        .route("/api/session/customer", post(context::switch_customer))
        .route("/api/customers", get(context::customers))
        .route("/api/views/{view}", get(records::view))
        .route("/api/checkpoints/{id}/evaluations", get(records::checkpoint_evaluations))
        .route(
            "/api/nonconformities/{id}/photos",
            get(nonconformity::photos)
                .post(nonconformity::upload_photo)
                .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/api/nonconformities/{id}/remediation", post(nonconformity::save_remediation))
        .route("/api/photos", delete(nonconformity::delete_photo))
        .route("/api/documents/view", get(documents::view_url))
        .route("/api/documents/download", get(documents::download))
        .fallback(pages::not_found_page)
        .layer(middleware::from_fn_with_state(state.clone(), gate::require_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: AppState) -> Result<()> {
    println!("🏛️  Initializing Derator customer portal...\n");

    let sessions = state.sessions.clone();
    let login_limiter = state.login_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = sessions.purge_expired().await;
            if purged > 0 {
                debug!("Purged {} expired sessions", purged);
            }
            let forgotten = login_limiter.purge().await;
            if forgotten > 0 {
                debug!("Forgot {} refilled login buckets", forgotten);
            }
        }
    });

    let addr = format!("0.0.0.0:{}", state.config.port);
    let app = router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    println!("🚀 Portal ready: http://{}", addr);
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("👋 Portal shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
