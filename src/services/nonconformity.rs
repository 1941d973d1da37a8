//! Nonconformity ("neshody") endpoints: photos, remediation record, photo
//! upload and deletion.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Extension, Json, Multipart, Path, Query, State};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::documents::BlobQuery;
use crate::error::{PortalError, PortalResult};
use crate::relay::BlobRef;
use crate::render::dates::parse_date;
use crate::render::{group_photos, PhotoGroups, SignedPhoto};
use crate::server::AppState;
use crate::session::Session;
use crate::upstream::records::NonconformityPhoto;
use crate::upstream::{fetch_records, Endpoint, PhotoUpload, RecordId, RemediationUpdate};
use crate::views::View;

pub const REMEDIATION_STATES: [&str; 3] = ["Nová", "Probíhá", "Vyřešeno"];
const DEFAULT_STATE: &str = "Nová";

#[derive(Debug, Deserialize)]
pub struct RemediationForm {
    pub description: String,
    #[serde(default)]
    pub remediated_by: Option<String>,
    /// `YYYY-MM-DD` from a date input
    #[serde(default)]
    pub remediated_on: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Build the upstream remediation body. The remediating person defaults to
/// the signed-in e-mail and the status to `Nová`.
pub fn remediation_update(
    nonconformity_id: RecordId,
    form: RemediationForm,
    email: &str,
) -> Result<RemediationUpdate, PortalError> {
    let status = form
        .status
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_STATE.to_string());
    if !REMEDIATION_STATES.contains(&status.as_str()) {
        return Err(PortalError::Validation("Neplatný stav neshody."));
    }

    let remediated_on = match form.remediated_on.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        None => None,
        Some(raw) => {
            let day = parse_date(raw).ok_or(PortalError::Validation("Neplatné datum nápravy."))?;
            Some(format!("{}T00:00:00.000Z", day.format("%Y-%m-%d")))
        }
    };

    Ok(RemediationUpdate {
        nonconformity_id,
        description: form.description,
        remediated_by: form
            .remediated_by
            .filter(|who| !who.trim().is_empty())
            .unwrap_or_else(|| email.to_string()),
        remediated_on,
        status,
        photo_url: form.photo_url.unwrap_or_default(),
    })
}

/// Folder holding the remediation photos of one customer.
pub fn photo_folder(customer_id: &RecordId) -> String {
    format!("neshody/{}/", customer_id)
}

/// Keep only a plain file name from what the browser sent.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_control() || matches!(c, '?' | '#' | '%') { '_' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned)
    }
}

/// Finding and remediation photos, each with a signed URL.
pub async fn photos(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    Path(nonconformity_id): Path<String>,
) -> PortalResult<Json<PhotoGroups>> {
    if session.context().await.scope().is_none() {
        return Err(PortalError::MissingContext);
    }

    let photos: Vec<NonconformityPhoto> = fetch_records(state.api.as_ref(), Endpoint::NonconformityPhotos, &nonconformity_id)
        .await
        .map_err(|e| {
            warn!("Photos of nonconformity {} failed: {:#}", nonconformity_id, e);
            PortalError::Upstream("Nepodařilo se načíst fotografie.")
        })?;

    let container = state.config.blob_container_url.as_str();
    let signed = join_all(photos.into_iter().map(|photo| {
        let api = state.api.clone();
        async move {
            let signed_url = match BlobRef::parse(&photo.blob_url, container) {
                Ok(blob) => match api.signed_url(&blob).await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        warn!("Signed URL for photo '{}' failed: {:#}", blob.as_str(), e);
                        None
                    }
                },
                Err(_) => None,
            };
            SignedPhoto { photo, signed_url }
        }
    }))
    .await;

    Ok(Json(group_photos(signed)))
}

pub async fn save_remediation(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    Path(nonconformity_id): Path<String>,
    Json(form): Json<RemediationForm>,
) -> PortalResult<Json<Value>> {
    let ctx = session.context().await;
    if ctx.scope().is_none() {
        return Err(PortalError::MissingContext);
    }

    let update = remediation_update(RecordId::new(nonconformity_id), form, &session.identity.email)?;
    state.api.update_remediation(&update).await.map_err(|e| {
        warn!("Remediation of {} failed: {:#}", update.nonconformity_id, e);
        PortalError::Upstream("Chyba při ukládání nápravy.")
    })?;
    info!("Remediation of {} saved by {}", update.nonconformity_id, update.remediated_by);

    // list shows the new status on next read
    session.views.show(View::Nonconformities, &ctx, &state.sources()).await;

    Ok(Json(json!({ "message": "Záznam byl úspěšně aktualizován." })))
}

pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    Path(nonconformity_id): Path<String>,
    mut multipart: Multipart,
) -> PortalResult<Json<Value>> {
    let Some(scope) = session.context().await.scope() else {
        return Err(PortalError::MissingContext);
    };

    let mut file: Option<(String, Option<String>, Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PortalError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().and_then(sanitize_file_name);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| PortalError::BadRequest(e.body_text()))?;
        if let Some(file_name) = file_name {
            file = Some((file_name, content_type, bytes));
        }
        break;
    }

    let Some((file_name, content_type, bytes)) = file.filter(|(_, _, bytes)| !bytes.is_empty()) else {
        return Err(PortalError::Validation("Vyberte soubor k nahrání."));
    };

    let upload = PhotoUpload {
        blob_name: format!("{}{}", photo_folder(&scope.customer_id), file_name),
        nonconformity_id: RecordId::new(nonconformity_id),
        file_name,
        content_type,
        bytes,
    };
    let blob_name = upload.blob_name.clone();
    let url = state.api.upload_photo(upload).await.map_err(|e| {
        warn!("Upload of '{}' failed: {:#}", blob_name, e);
        PortalError::Upstream("Chyba při nahrávání fotografie.")
    })?;

    info!("Photo '{}' uploaded", blob_name);
    Ok(Json(json!({ "url": url, "message": "Fotografie byla úspěšně nahrána." })))
}

/// Delete a remediation photo. Only blobs in the active customer's photo
/// folder can be removed.
pub async fn delete_photo(
    State(state): State<AppState>,
    Extension(session): Extension<Arc<Session>>,
    Query(query): Query<BlobQuery>,
) -> PortalResult<Json<Value>> {
    let Some(scope) = session.context().await.scope() else {
        return Err(PortalError::MissingContext);
    };

    let blob = BlobRef::parse(&query.blob, &state.config.blob_container_url)?;
    if !blob.as_str().starts_with(&photo_folder(&scope.customer_id)) {
        warn!(
            "{} tried to delete '{}' outside customer {}",
            session.identity.email,
            blob.as_str(),
            scope.customer_id
        );
        return Err(PortalError::Forbidden);
    }
    state.api.delete_blob(&blob).await.map_err(|e| {
        warn!("Deleting '{}' failed: {:#}", blob.as_str(), e);
        PortalError::Upstream("Chyba při mazání fotografie.")
    })?;

    info!("Photo '{}' deleted", blob.as_str());
    Ok(Json(json!({ "message": "Fotografie byla úspěšně smazána." })))
}
