//! Document endpoints: signed view URL and attachment download.

use axum::extract::{Json, Query, State};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::PortalResult;
use crate::relay::{BlobRef, Download, DocumentRelay};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct BlobQuery {
    pub blob: String,
}

pub async fn view_url(State(state): State<AppState>, Query(query): Query<BlobQuery>) -> PortalResult<Json<Value>> {
    let blob = BlobRef::parse(&query.blob, &state.config.blob_container_url)?;
    let url = DocumentRelay::new(state.api.clone()).resolve_view_url(&blob).await?;
    Ok(Json(json!({ "url": url })))
}

pub async fn download(State(state): State<AppState>, Query(query): Query<BlobQuery>) -> PortalResult<Download> {
    let blob = BlobRef::parse(&query.blob, &state.config.blob_container_url)?;
    DocumentRelay::new(state.api.clone()).download(&blob).await
}
