//! Session and customer-context endpoints.

use std::sync::Arc;

use axum::extract::{Extension, Json, State};
use serde::Deserialize;
use tracing::{info, warn};

use super::auth::SessionInfo;
use crate::error::{PortalError, PortalResult};
use crate::server::AppState;
use crate::session::Session;
use crate::upstream::{CustomerAccount, RecordId};

#[derive(Debug, Deserialize)]
pub struct SwitchCustomer {
    pub customer_id: RecordId,
}

pub async fn session_info(Extension(session): Extension<Arc<Session>>) -> Json<SessionInfo> {
    Json(SessionInfo::of(&session).await)
}

/// Accounts the signed-in e-mail may switch between.
pub async fn customers(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
) -> PortalResult<Json<Vec<CustomerAccount>>> {
    let accounts = state.api.customers(&session.identity.email).await.map_err(|e| {
        warn!("Customer lookup for {} failed: {:#}", session.identity.email, e);
        PortalError::Upstream("Nepodařilo se načíst zákazníky.")
    })?;
    Ok(Json(accounts))
}

/// Switch the active customer. Only accounts from the lookup are accepted;
/// views already open are reloaded for the new customer.
pub async fn switch_customer(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    Json(form): Json<SwitchCustomer>,
) -> PortalResult<Json<SessionInfo>> {
    let accounts = state.api.customers(&session.identity.email).await.map_err(|e| {
        warn!("Customer lookup for {} failed: {:#}", session.identity.email, e);
        PortalError::Upstream("Nepodařilo se načíst zákazníky.")
    })?;

    let account = accounts
        .iter()
        .find(|account| account.customer_id == form.customer_id)
        .ok_or_else(|| PortalError::BadRequest(format!("zákazník {} není dostupný", form.customer_id)))?;

    let (changed, ctx) = session.update_context(|ctx| ctx.select_account(account)).await;
    if changed {
        info!("{} switched to customer {}", session.identity.email, form.customer_id);
        session.views.rescope(&ctx, &state.sources()).await;
    }

    Ok(Json(SessionInfo::of(&session).await))
}
