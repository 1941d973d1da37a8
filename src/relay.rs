//! Document Relay
//!
//! Stored documents are referenced either by their full blob URL or by the
//! container-relative blob name. The relay normalises both and asks the
//! portal API for a signed view URL or for the bytes. Nothing is cached.

use std::sync::Arc;

use anyhow::Result;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{error, info};

use crate::error::PortalError;
use crate::upstream::PortalApi;

/// Container-relative blob name, e.g. `certifikaty/7/osvedceni.pdf`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobRef(String);

impl BlobRef {
    /// Accepts a full blob URL under `container_url` or a bare blob name.
    /// SAS query strings are dropped and the name is percent-decoded once.
    pub fn parse(raw: &str, container_url: &str) -> Result<Self, PortalError> {
        let raw = raw.trim();
        let relative = raw.strip_prefix(container_url).unwrap_or(raw);
        let relative = relative.split(['?', '#']).next().unwrap_or_default();

        if relative.contains("://") {
            return Err(PortalError::BadRequest("dokument mimo úložiště".into()));
        }

        let decoded = urlencoding::decode(relative)
            .map_err(|_| PortalError::BadRequest("neplatný název dokumentu".into()))?;
        let name = decoded.trim_start_matches('/');

        if name.is_empty() || name.split('/').any(|segment| segment == "..") {
            return Err(PortalError::BadRequest("neplatný název dokumentu".into()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, used as the attachment name.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

/// Bytes on their way to the browser as an attachment.
#[derive(Debug)]
pub struct Download {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl IntoResponse for Download {
    fn into_response(self) -> Response {
        let disposition = format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            self.file_name.replace(['"', '\\'], "_").replace(|c: char| !c.is_ascii(), "_"),
            urlencoding::encode(&self.file_name)
        );

        let mut response = Response::new(Body::from(self.bytes));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(&self.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
        );
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}

pub struct DocumentRelay {
    api: Arc<dyn PortalApi>,
}

impl DocumentRelay {
    pub fn new(api: Arc<dyn PortalApi>) -> Self {
        Self { api }
    }

    pub async fn resolve_view_url(&self, blob: &BlobRef) -> Result<String, PortalError> {
        self.api.signed_url(blob).await.map_err(|e| {
            error!("Signed URL for '{}' failed: {:#}", blob.as_str(), e);
            PortalError::Upstream("Nepodařilo se načíst dokument.")
        })
    }

    pub async fn download(&self, blob: &BlobRef) -> Result<Download, PortalError> {
        let payload = self.api.blob_bytes(blob).await.map_err(|e| {
            error!("Download of '{}' failed: {:#}", blob.as_str(), e);
            PortalError::Upstream("Chyba při stahování souboru.")
        })?;

        info!("Relaying '{}' ({} bytes)", blob.as_str(), payload.bytes.len());
        Ok(Download {
            file_name: blob.file_name().to_string(),
            content_type: payload
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            bytes: payload.bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BLOB_CONTAINER_URL;

    #[test]
    fn test_full_url_is_stripped_to_blob_name() {
        let blob = BlobRef::parse(
            "https://deratorportal.blob.core.windows.net/zakaznici-soubory/kontroly/7/zprava%20leden.pdf?sv=2022&sig=abc",
            DEFAULT_BLOB_CONTAINER_URL,
        )
        .unwrap();
        assert_eq!(blob.as_str(), "kontroly/7/zprava leden.pdf");
        assert_eq!(blob.file_name(), "zprava leden.pdf");
    }

    #[test]
    fn test_bare_name_passes_through() {
        let blob = BlobRef::parse("certifikaty/7/a.pdf", DEFAULT_BLOB_CONTAINER_URL).unwrap();
        assert_eq!(blob.as_str(), "certifikaty/7/a.pdf");
    }

    #[test]
    fn test_decodes_only_once() {
        let blob = BlobRef::parse("mapy/a%2520b.pdf", DEFAULT_BLOB_CONTAINER_URL).unwrap();
        assert_eq!(blob.as_str(), "mapy/a%20b.pdf");
    }

    #[test]
    fn test_rejects_foreign_urls_and_traversal() {
        assert!(BlobRef::parse("https://evil.example.com/x.pdf", DEFAULT_BLOB_CONTAINER_URL).is_err());
        assert!(BlobRef::parse("kontroly/../../etc", DEFAULT_BLOB_CONTAINER_URL).is_err());
        assert!(BlobRef::parse("  ", DEFAULT_BLOB_CONTAINER_URL).is_err());
    }

    #[test]
    fn test_download_response_is_an_attachment() {
        let response = Download {
            file_name: "zpráva.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: Bytes::from_static(b"%PDF"),
        }
        .into_response();

        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"zpr_va.pdf\""));
        assert!(disposition.contains("UTF-8''zpr%C3%A1va.pdf"));
    }
}
