//! View endpoints
//!
//! `GET /api/views/{view}` answers with the fetch state of the view for the
//! active customer: `idle` before a customer is known, `error` with the
//! view's message, or `ready` with the rendered data.

use std::sync::Arc;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Extension, Json, Path, Query, State};
use chrono::Local;
use serde_json::Value;
use tracing::warn;

use crate::error::{PortalError, PortalResult};
use crate::fetcher::FetchState;
use crate::server::AppState;
use crate::session::Session;
use crate::upstream::Endpoint;
use crate::views::{RenderedView, View, ViewQuery};

pub async fn view(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    view: Result<Path<View>, PathRejection>,
    query: Result<Query<ViewQuery>, QueryRejection>,
) -> PortalResult<Json<FetchState<RenderedView>>> {
    let Path(view) = view.map_err(|_| PortalError::BadRequest("neznámý pohled".into()))?;
    let Query(query) = query.map_err(|e| PortalError::BadRequest(e.body_text()))?;

    let ctx = session.context().await;
    let fetched = session.views.show(view, &ctx, &state.sources()).await;

    let today = Local::now().date_naive();
    Ok(Json(fetched.map(|data| data.render(&query, today))))
}

/// Measurement history of one bait station.
pub async fn checkpoint_evaluations(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    Path(checkpoint_id): Path<String>,
) -> PortalResult<Json<Value>> {
    if session.context().await.scope().is_none() {
        return Err(PortalError::MissingContext);
    }

    let body = state
        .api
        .get_json(Endpoint::CheckpointEvaluations, &checkpoint_id)
        .await
        .map_err(|e| {
            warn!("Evaluations for checkpoint {} failed: {:#}", checkpoint_id, e);
            PortalError::Upstream("Nepodařilo se načíst data trendu.")
        })?;
    Ok(Json(body))
}
